use serde::{Deserialize, Serialize};

use crate::db_types::{Actor, Escrow, Order, StoreOrder, WithdrawalRequest};

/// Payment was captured and escrow locked for every store order on the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCapturedEvent {
    pub order: Order,
    pub store_orders: Vec<StoreOrder>,
}

impl PaymentCapturedEvent {
    pub fn new(order: Order, store_orders: Vec<StoreOrder>) -> Self {
        Self { order, store_orders }
    }
}

/// Escrow moved to `Released` and the seller wallet was credited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowReleasedEvent {
    pub escrow: Escrow,
    pub performed_by: Actor,
}

/// Escrow moved to `Refunded` and the buyer wallet was credited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowRefundedEvent {
    pub escrow: Escrow,
    pub performed_by: Actor,
}

/// A seller rejected a store order before payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRejectedEvent {
    pub store_order: StoreOrder,
}

/// The payout provider settled a withdrawal, one way or the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalSettledEvent {
    pub request: WithdrawalRequest,
}
