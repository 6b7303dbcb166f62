use serde::{Deserialize, Serialize};

use crate::db_types::Deal;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyerJoinedEvent {
    pub deal: Deal,
}

impl BuyerJoinedEvent {
    pub fn new(deal: Deal) -> Self {
        Self { deal }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuarantorAssignedEvent {
    pub deal: Deal,
}

impl GuarantorAssignedEvent {
    pub fn new(deal: Deal) -> Self {
        Self { deal }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealCompletedEvent {
    pub deal: Deal,
    /// Who triggered the completion: the guarantor, or the administrator override.
    pub completed_by: i64,
}

impl DealCompletedEvent {
    pub fn new(deal: Deal, completed_by: i64) -> Self {
        Self { deal, completed_by }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealCancelledEvent {
    pub deal: Deal,
    pub cancelled_by: i64,
}

impl DealCancelledEvent {
    pub fn new(deal: Deal, cancelled_by: i64) -> Self {
        Self { deal, cancelled_by }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventType {
    BuyerJoined(BuyerJoinedEvent),
    GuarantorAssigned(GuarantorAssignedEvent),
    DealCompleted(DealCompletedEvent),
    DealCancelled(DealCancelledEvent),
}
