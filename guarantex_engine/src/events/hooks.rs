use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    BuyerJoinedEvent,
    DealCancelledEvent,
    DealCompletedEvent,
    EventHandler,
    EventProducer,
    GuarantorAssignedEvent,
    Handler,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub buyer_joined_producer: Vec<EventProducer<BuyerJoinedEvent>>,
    pub guarantor_assigned_producer: Vec<EventProducer<GuarantorAssignedEvent>>,
    pub deal_completed_producer: Vec<EventProducer<DealCompletedEvent>>,
    pub deal_cancelled_producer: Vec<EventProducer<DealCancelledEvent>>,
}

pub struct EventHandlers {
    pub on_buyer_joined: Option<EventHandler<BuyerJoinedEvent>>,
    pub on_guarantor_assigned: Option<EventHandler<GuarantorAssignedEvent>>,
    pub on_deal_completed: Option<EventHandler<DealCompletedEvent>>,
    pub on_deal_cancelled: Option<EventHandler<DealCancelledEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_buyer_joined = hooks.on_buyer_joined.map(|f| EventHandler::new(buffer_size, f));
        let on_guarantor_assigned = hooks.on_guarantor_assigned.map(|f| EventHandler::new(buffer_size, f));
        let on_deal_completed = hooks.on_deal_completed.map(|f| EventHandler::new(buffer_size, f));
        let on_deal_cancelled = hooks.on_deal_cancelled.map(|f| EventHandler::new(buffer_size, f));
        Self { on_buyer_joined, on_guarantor_assigned, on_deal_completed, on_deal_cancelled }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_buyer_joined {
            result.buyer_joined_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_guarantor_assigned {
            result.guarantor_assigned_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_deal_completed {
            result.deal_completed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_deal_cancelled {
            result.deal_cancelled_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_buyer_joined {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_guarantor_assigned {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_deal_completed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_deal_cancelled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_buyer_joined: Option<Handler<BuyerJoinedEvent>>,
    pub on_guarantor_assigned: Option<Handler<GuarantorAssignedEvent>>,
    pub on_deal_completed: Option<Handler<DealCompletedEvent>>,
    pub on_deal_cancelled: Option<Handler<DealCancelledEvent>>,
}

impl EventHooks {
    pub fn on_buyer_joined<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(BuyerJoinedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_buyer_joined = Some(Arc::new(f));
        self
    }

    pub fn on_guarantor_assigned<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(GuarantorAssignedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_guarantor_assigned = Some(Arc::new(f));
        self
    }

    pub fn on_deal_completed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DealCompletedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_deal_completed = Some(Arc::new(f));
        self
    }

    pub fn on_deal_cancelled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DealCancelledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_deal_cancelled = Some(Arc::new(f));
        self
    }
}
