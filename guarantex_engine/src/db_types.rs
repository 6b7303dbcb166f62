use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use gtx_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

/// Sender id reserved for engine-generated thread messages.
pub const SYSTEM_SENDER: i64 = 0;

#[derive(Debug, Clone, Error)]
#[error("Invalid {kind}: {value}")]
pub struct ConversionError {
    pub kind: &'static str,
    pub value: String,
}

impl ConversionError {
    fn new(kind: &'static str, value: impl Display) -> Self {
        Self { kind, value: value.to_string() }
    }
}

//--------------------------------------     DealCode        ---------------------------------------------------------
/// The short human-shareable token a buyer uses to attach to a pending deal.
///
/// Codes are uppercase alphanumeric and unique across the lifetime of the system; a code is never
/// reissued, even after its deal has been reaped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct DealCode(pub String);

impl FromStr for DealCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().to_uppercase()))
    }
}

impl From<String> for DealCode {
    fn from(s: String) -> Self {
        Self(s.trim().to_uppercase())
    }
}

impl Display for DealCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl DealCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     DealStatus      ---------------------------------------------------------
/// The deal lifecycle state machine.
///
/// `waiting_buyer → waiting_guarantor → in_progress → {completed | cancelled}`, with
/// cancellation possible from any non-terminal state. Terminal states are final for everyone,
/// administrators included. The transition table lives here and only here; callers ask
/// [`DealStatus::can_transition_to`] instead of comparing strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    WaitingBuyer,
    WaitingGuarantor,
    InProgress,
    Completed,
    Cancelled,
}

impl DealStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DealStatus::Completed | DealStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: DealStatus) -> bool {
        use DealStatus::*;
        matches!(
            (self, next),
            (WaitingBuyer, WaitingGuarantor)
                | (WaitingGuarantor, InProgress)
                | (InProgress, Completed)
                | (WaitingBuyer, Cancelled)
                | (WaitingGuarantor, Cancelled)
                | (InProgress, Cancelled)
        )
    }

    /// The stored (and wire) form of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::WaitingBuyer => "waiting_buyer",
            DealStatus::WaitingGuarantor => "waiting_guarantor",
            DealStatus::InProgress => "in_progress",
            DealStatus::Completed => "completed",
            DealStatus::Cancelled => "cancelled",
        }
    }
}

impl Display for DealStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DealStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting_buyer" => Ok(Self::WaitingBuyer),
            "waiting_guarantor" => Ok(Self::WaitingGuarantor),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError::new("deal status", s)),
        }
    }
}

//--------------------------------------      Currency       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    Rub,
    Crypto,
    Stars,
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Currency::Rub => "rub",
            Currency::Crypto => "crypto",
            Currency::Stars => "stars",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Currency {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rub" => Ok(Self::Rub),
            "crypto" => Ok(Self::Crypto),
            "stars" => Ok(Self::Stars),
            s => Err(ConversionError::new("currency", s)),
        }
    }
}

//--------------------------------------     WalletType      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WalletType {
    Card,
    Btc,
    Usdt,
    Ton,
}

impl WalletType {
    /// Wallet types that can receive a payout in the given deal currency. Star deals settle
    /// through the chat platform itself, so any wallet will do there.
    pub fn compatible_with(&self, currency: Currency) -> bool {
        match currency {
            Currency::Rub => matches!(self, WalletType::Card),
            Currency::Crypto => matches!(self, WalletType::Btc | WalletType::Usdt | WalletType::Ton),
            Currency::Stars => true,
        }
    }
}

impl Display for WalletType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WalletType::Card => "card",
            WalletType::Btc => "btc",
            WalletType::Usdt => "usdt",
            WalletType::Ton => "ton",
        };
        write!(f, "{s}")
    }
}

impl FromStr for WalletType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(Self::Card),
            "btc" => Ok(Self::Btc),
            "usdt" => Ok(Self::Usdt),
            "ton" => Ok(Self::Ton),
            s => Err(ConversionError::new("wallet type", s)),
        }
    }
}

//--------------------------------------        User         ---------------------------------------------------------
/// A chat-platform identity. Created on first contact, never deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub rating: f64,
    pub total_deals: i64,
    pub completed_deals: i64,
    pub is_banned: bool,
    pub is_guarantor: bool,
    pub balance_stars: i64,
    pub balance_crypto: Money,
    pub balance_rub: Money,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Best display handle we have for the user: first name, then username, then the bare id.
    pub fn display_name(&self) -> String {
        self.first_name
            .clone()
            .or_else(|| self.username.clone())
            .unwrap_or_else(|| format!("ID{}", self.user_id))
    }
}

//--------------------------------------       Wallet        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub user_id: i64,
    pub wallet_type: WalletType,
    pub wallet_address: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWallet {
    pub user_id: i64,
    pub wallet_type: WalletType,
    pub wallet_address: String,
}

//--------------------------------------        Deal         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Deal {
    pub id: i64,
    pub deal_code: DealCode,
    pub seller_id: i64,
    pub buyer_id: Option<i64>,
    pub guarantor_id: Option<i64>,
    pub currency: Currency,
    pub amount: Money,
    pub description: String,
    pub status: DealStatus,
    pub commission_percent: f64,
    pub guarantor_called: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Deal {
    pub fn is_participant(&self, user_id: i64) -> bool {
        self.seller_id == user_id || self.buyer_id == Some(user_id) || self.guarantor_id == Some(user_id)
    }

    /// Seller, buyer and guarantor ids, in that order, skipping unfilled roles.
    pub fn participants(&self) -> Vec<i64> {
        [Some(self.seller_id), self.buyer_id, self.guarantor_id].into_iter().flatten().collect()
    }

    /// The counterparty of `user_id` in the seller/buyer pair, if both sides are known.
    pub fn counterparty_of(&self, user_id: i64) -> Option<i64> {
        let buyer = self.buyer_id?;
        if user_id == self.seller_id {
            Some(buyer)
        } else if user_id == buyer {
            Some(self.seller_id)
        } else {
            None
        }
    }
}

/// A deal as submitted by a seller, before it has a code, id or timestamps.
#[derive(Debug, Clone)]
pub struct NewDeal {
    pub seller_id: i64,
    pub currency: Currency,
    pub amount: Money,
    pub description: String,
    pub commission_percent: f64,
}

impl NewDeal {
    pub fn new(seller_id: i64, currency: Currency, amount: Money, description: impl Into<String>) -> Self {
        Self { seller_id, currency, amount, description: description.into(), commission_percent: 5.0 }
    }

    pub fn with_commission(mut self, percent: f64) -> Self {
        self.commission_percent = percent;
        self
    }
}

//--------------------------------------     DealMessage     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    System,
}

impl Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::User => write!(f, "user"),
            MessageKind::System => write!(f, "system"),
        }
    }
}

/// One entry in a deal's append-only message log. Immutable after insertion except for the
/// `read_by_partner` flag.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DealMessage {
    pub id: i64,
    pub deal_id: i64,
    pub sender_id: i64,
    pub message_text: String,
    pub kind: MessageKind,
    pub read_by_partner: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub deal_id: i64,
    pub sender_id: i64,
    pub message_text: String,
    pub kind: MessageKind,
}

impl NewMessage {
    pub fn from_user(deal_id: i64, sender_id: i64, text: impl Into<String>) -> Self {
        Self { deal_id, sender_id, message_text: text.into(), kind: MessageKind::User }
    }

    pub fn system(deal_id: i64, text: impl Into<String>) -> Self {
        Self { deal_id, sender_id: SYSTEM_SENDER, message_text: text.into(), kind: MessageKind::System }
    }
}

//--------------------------------------       Rating        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Rating {
    pub id: i64,
    pub deal_id: i64,
    pub rater_id: i64,
    pub ratee_id: i64,
    pub score: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRating {
    pub deal_id: i64,
    pub rater_id: i64,
    pub ratee_id: i64,
    pub score: i64,
    pub comment: Option<String>,
}

//--------------------------------------    ScammerRecord    ---------------------------------------------------------
/// A denylist entry. Consulted by the create/join flows; maintained by administrators.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScammerRecord {
    pub user_id: i64,
    pub reason: String,
    pub added_by: i64,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     AuditEntry      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub action: String,
    pub user_id: Option<i64>,
    pub deal_id: Option<i64>,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_round_trip() {
        for s in
            [DealStatus::WaitingBuyer, DealStatus::WaitingGuarantor, DealStatus::InProgress, DealStatus::Completed, DealStatus::Cancelled]
        {
            assert_eq!(s.to_string().parse::<DealStatus>().unwrap(), s);
        }
        assert!("paid".parse::<DealStatus>().is_err());
    }

    #[test]
    fn transition_table() {
        use DealStatus::*;
        assert!(WaitingBuyer.can_transition_to(WaitingGuarantor));
        assert!(WaitingGuarantor.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        for from in [WaitingBuyer, WaitingGuarantor, InProgress] {
            assert!(from.can_transition_to(Cancelled));
            assert!(!from.is_terminal());
        }
        for terminal in [Completed, Cancelled] {
            assert!(terminal.is_terminal());
            for to in [WaitingBuyer, WaitingGuarantor, InProgress, Completed, Cancelled] {
                assert!(!terminal.can_transition_to(to));
            }
        }
        assert!(!WaitingBuyer.can_transition_to(InProgress));
        assert!(!WaitingBuyer.can_transition_to(Completed));
        assert!(!WaitingGuarantor.can_transition_to(Completed));
    }

    #[test]
    fn wallet_compatibility() {
        assert!(WalletType::Card.compatible_with(Currency::Rub));
        assert!(!WalletType::Card.compatible_with(Currency::Crypto));
        for crypto in [WalletType::Btc, WalletType::Usdt, WalletType::Ton] {
            assert!(crypto.compatible_with(Currency::Crypto));
            assert!(!crypto.compatible_with(Currency::Rub));
            assert!(crypto.compatible_with(Currency::Stars));
        }
        assert!(WalletType::Card.compatible_with(Currency::Stars));
    }

    #[test]
    fn deal_participants() {
        let deal = Deal {
            id: 1,
            deal_code: DealCode::from("AB12CD".to_string()),
            seller_id: 10,
            buyer_id: Some(20),
            guarantor_id: None,
            currency: Currency::Rub,
            amount: Money::from_major(100),
            description: "laptop".to_string(),
            status: DealStatus::WaitingGuarantor,
            commission_percent: 5.0,
            guarantor_called: false,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        assert!(deal.is_participant(10));
        assert!(deal.is_participant(20));
        assert!(!deal.is_participant(30));
        assert_eq!(deal.participants(), vec![10, 20]);
        assert_eq!(deal.counterparty_of(10), Some(20));
        assert_eq!(deal.counterparty_of(20), Some(10));
        assert_eq!(deal.counterparty_of(30), None);
    }
}
