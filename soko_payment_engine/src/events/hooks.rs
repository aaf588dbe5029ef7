use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EscrowRefundedEvent,
    EscrowReleasedEvent,
    EventHandler,
    EventProducer,
    Handler,
    OrderRejectedEvent,
    PaymentCapturedEvent,
    WithdrawalSettledEvent,
};

/// The producer ends handed to the APIs. Cloneable; an empty set means events go nowhere.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub payment_captured_producer: Vec<EventProducer<PaymentCapturedEvent>>,
    pub escrow_released_producer: Vec<EventProducer<EscrowReleasedEvent>>,
    pub escrow_refunded_producer: Vec<EventProducer<EscrowRefundedEvent>>,
    pub order_rejected_producer: Vec<EventProducer<OrderRejectedEvent>>,
    pub withdrawal_settled_producer: Vec<EventProducer<WithdrawalSettledEvent>>,
}

pub struct EventHandlers {
    pub on_payment_captured: Option<EventHandler<PaymentCapturedEvent>>,
    pub on_escrow_released: Option<EventHandler<EscrowReleasedEvent>>,
    pub on_escrow_refunded: Option<EventHandler<EscrowRefundedEvent>>,
    pub on_order_rejected: Option<EventHandler<OrderRejectedEvent>>,
    pub on_withdrawal_settled: Option<EventHandler<WithdrawalSettledEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_payment_captured: hooks.on_payment_captured.map(|f| EventHandler::new(buffer_size, f)),
            on_escrow_released: hooks.on_escrow_released.map(|f| EventHandler::new(buffer_size, f)),
            on_escrow_refunded: hooks.on_escrow_refunded.map(|f| EventHandler::new(buffer_size, f)),
            on_order_rejected: hooks.on_order_rejected.map(|f| EventHandler::new(buffer_size, f)),
            on_withdrawal_settled: hooks.on_withdrawal_settled.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_payment_captured {
            result.payment_captured_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_escrow_released {
            result.escrow_released_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_escrow_refunded {
            result.escrow_refunded_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_rejected {
            result.order_rejected_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_withdrawal_settled {
            result.withdrawal_settled_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_payment_captured {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_escrow_released {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_escrow_refunded {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_rejected {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_withdrawal_settled {
            tokio::spawn(handler.start_handler());
        }
    }
}

/// Builder for wiring subscriber callbacks before the engine starts.
#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_payment_captured: Option<Handler<PaymentCapturedEvent>>,
    pub on_escrow_released: Option<Handler<EscrowReleasedEvent>>,
    pub on_escrow_refunded: Option<Handler<EscrowRefundedEvent>>,
    pub on_order_rejected: Option<Handler<OrderRejectedEvent>>,
    pub on_withdrawal_settled: Option<Handler<WithdrawalSettledEvent>>,
}

impl EventHooks {
    pub fn on_payment_captured<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentCapturedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_captured = Some(Arc::new(f));
        self
    }

    pub fn on_escrow_released<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(EscrowReleasedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_escrow_released = Some(Arc::new(f));
        self
    }

    pub fn on_escrow_refunded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(EscrowRefundedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_escrow_refunded = Some(Arc::new(f));
        self
    }

    pub fn on_order_rejected<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderRejectedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_rejected = Some(Arc::new(f));
        self
    }

    pub fn on_withdrawal_settled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(WithdrawalSettledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_withdrawal_settled = Some(Arc::new(f));
        self
    }
}
