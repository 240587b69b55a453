use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    LowBalanceEvent,
    OrderSettledEvent,
    OrderStatusChangedEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_settled_producer: Vec<EventProducer<OrderSettledEvent>>,
    pub low_balance_producer: Vec<EventProducer<LowBalanceEvent>>,
    pub status_changed_producer: Vec<EventProducer<OrderStatusChangedEvent>>,
}

pub struct EventHandlers {
    pub on_order_settled: Option<EventHandler<OrderSettledEvent>>,
    pub on_low_balance: Option<EventHandler<LowBalanceEvent>>,
    pub on_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_settled = hooks.on_order_settled.map(|f| EventHandler::new(buffer_size, f));
        let on_low_balance = hooks.on_low_balance.map(|f| EventHandler::new(buffer_size, f));
        let on_status_changed = hooks.on_status_changed.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_settled, on_low_balance, on_status_changed }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_settled {
            result.order_settled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_low_balance {
            result.low_balance_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_status_changed {
            result.status_changed_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_settled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_low_balance {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_status_changed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_settled: Option<Handler<OrderSettledEvent>>,
    pub on_low_balance: Option<Handler<LowBalanceEvent>>,
    pub on_status_changed: Option<Handler<OrderStatusChangedEvent>>,
}

impl EventHooks {
    pub fn on_order_settled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderSettledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_settled = Some(Arc::new(f));
        self
    }

    pub fn on_low_balance<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(LowBalanceEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_low_balance = Some(Arc::new(f));
        self
    }

    pub fn on_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_status_changed = Some(Arc::new(f));
        self
    }
}
