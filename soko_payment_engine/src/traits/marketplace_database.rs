use chrono::{DateTime, Utc};
use soko_common::Kobo;
use thiserror::Error;

use crate::{
    db_types::{Actor, Escrow, Order, OrderItem, OrderNo, OrderTracking, StoreOrder, StoreOrderStatus, WithdrawalRequest},
    traits::{
        data_objects::{AssembledOrder, BankDetails, CheckoutResult, EscrowSettlement, PaymentData, PaymentReceipt, SettlementOutcome},
        WalletApiError,
        WalletManagement,
    },
};

/// This trait defines the highest level of behaviour for backends supporting the Soko payment
/// engine.
///
/// This behaviour includes:
/// * Persisting assembled checkouts as Order / StoreOrder / OrderItem rows.
/// * Driving the per-store fulfillment state machine.
/// * Capturing payments into escrow, and settling escrow to the seller or back to the buyer.
/// * Reserving and settling withdrawals against the payout provider.
///
/// Every multi-step mutation below is atomic: it commits in full or not at all, even if the
/// process dies mid-flight.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase: Clone + WalletManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Persists an assembled checkout in a single transaction: the order, one store order per
    /// store with its item snapshots, and the initial `PendingAcceptance` tracking rows.
    async fn insert_checkout(&self, checkout: AssembledOrder) -> Result<CheckoutResult, MarketplaceError>;

    async fn fetch_order(&self, order_no: &OrderNo) -> Result<Option<Order>, MarketplaceError>;

    async fn fetch_store_order(&self, store_order_id: i64) -> Result<Option<StoreOrder>, MarketplaceError>;

    async fn fetch_store_orders_for_order(&self, order_id: i64) -> Result<Vec<StoreOrder>, MarketplaceError>;

    async fn fetch_order_items(&self, store_order_id: i64) -> Result<Vec<OrderItem>, MarketplaceError>;

    async fn fetch_tracking(&self, store_order_id: i64) -> Result<Vec<OrderTracking>, MarketplaceError>;

    /// Seller accepts a store order. Valid only from `PendingAcceptance`; stamps `accepted_at`,
    /// stores the optional delivery estimate and delivery code, and writes a tracking row.
    ///
    /// Fails with [`MarketplaceError::Unauthorized`] if `store_id` does not own the store order,
    /// and with [`MarketplaceError::InvalidStateTransition`] from any other state.
    async fn accept_store_order(
        &self,
        store_order_id: i64,
        store_id: i64,
        estimated_delivery_date: Option<DateTime<Utc>>,
        delivery_code: Option<String>,
    ) -> Result<StoreOrder, MarketplaceError>;

    /// Seller rejects a store order. Valid only from `PendingAcceptance`, requires a non-empty
    /// reason, and is terminal.
    async fn reject_store_order(
        &self,
        store_order_id: i64,
        store_id: i64,
        reason: &str,
    ) -> Result<StoreOrder, MarketplaceError>;

    /// Captures payment for an order in a single transaction.
    ///
    /// The payable amount is recomputed server-side from the accepted store orders'
    /// `subtotal_with_shipping`; a client-supplied total is never trusted. On the wallet path the
    /// buyer's shopping balance is debited through the ledger primitive; on the card path the
    /// gateway-referenced transaction is recorded. Then the order is marked paid, each store order
    /// moves `Accepted -> Paid` with a tracking row, and one `Locked` escrow row is created per
    /// store order.
    async fn capture_payment(
        &self,
        order_no: &OrderNo,
        buyer_id: i64,
        payment: PaymentData,
    ) -> Result<PaymentReceipt, MarketplaceError>;

    /// Seller moves a paid store order forward through `Processing`, `OutForDelivery`,
    /// `Delivered`. Strictly monotonic: backward moves are rejected with
    /// [`MarketplaceError::InvalidStateTransition`] and nothing is written.
    async fn update_fulfillment(
        &self,
        store_order_id: i64,
        store_id: i64,
        next: StoreOrderStatus,
        note: Option<String>,
    ) -> Result<StoreOrder, MarketplaceError>;

    /// Buyer confirms delivery. Valid when the store order is `OutForDelivery` or `Delivered`;
    /// marks it `Delivered` if the seller had not already done so. Escrow release is a separate
    /// step so that a release failure never un-confirms the delivery.
    async fn confirm_delivery(&self, store_order_id: i64, buyer_id: i64) -> Result<StoreOrder, MarketplaceError>;

    /// Releases the locked escrow for a store order to the seller's wallet.
    ///
    /// Looks up the `Locked` escrow by store order id, falling back to an order-level record
    /// (rows written before store-order granularity existed). `Ok(None)` means there was nothing
    /// to release; that is a valid outcome, not a failure. At most one concurrent caller can
    /// observe `Ok(Some(_))` for a given escrow.
    async fn release_escrow(
        &self,
        store_order_id: i64,
        performed_by: Actor,
        reason: &str,
    ) -> Result<Option<EscrowSettlement>, MarketplaceError>;

    /// Refunds the locked escrow for a store order to the buyer's wallet and moves the store
    /// order to `next_status` (`Cancelled` or `Refunded`). Mutually exclusive with release for
    /// any given escrow row.
    async fn refund_escrow(
        &self,
        store_order_id: i64,
        performed_by: Actor,
        reason: &str,
        next_status: StoreOrderStatus,
    ) -> Result<Option<EscrowSettlement>, MarketplaceError>;

    async fn fetch_escrows_for_store_order(&self, store_order_id: i64) -> Result<Vec<Escrow>, MarketplaceError>;

    /// Reserves `amount` from the user's shopping balance and records a `Pending` withdrawal
    /// request plus its `Pending` transaction, all in one unit. The external transfer happens
    /// later; the reservation guarantees concurrent requests cannot jointly overdraw the wallet.
    async fn request_withdrawal(
        &self,
        user_id: i64,
        amount: Kobo,
        bank: BankDetails,
    ) -> Result<WithdrawalRequest, MarketplaceError>;

    /// Applies the payout provider's verdict for `reference`. `Completed` finalises the
    /// transaction; `Failed` re-credits the reserved amount. Settling an already-terminal request
    /// fails with [`MarketplaceError::InvalidStateTransition`].
    async fn settle_withdrawal(
        &self,
        reference: &str,
        outcome: SettlementOutcome,
    ) -> Result<WithdrawalRequest, MarketplaceError>;

    async fn fetch_withdrawal(&self, reference: &str) -> Result<Option<WithdrawalRequest>, MarketplaceError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), MarketplaceError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum MarketplaceError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Insufficient funds")]
    InsufficientFunds,
    #[error("Illegal state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderNo),
    #[error("The requested store order {0} does not exist")]
    StoreOrderNotFound(i64),
    #[error("No wallet exists for user {0}")]
    WalletNotFound(i64),
    #[error("The requested withdrawal {0} does not exist")]
    WithdrawalNotFound(String),
    #[error("{0} is not permitted to act on this resource")]
    Unauthorized(Actor),
    #[error("Order {0} has already been paid")]
    OrderAlreadyPaid(OrderNo),
    #[error("A transaction with id {0} already exists")]
    DuplicateTransaction(String),
    #[error("External collaborator failure: {0}")]
    ExternalCollaborator(String),
}

impl MarketplaceError {
    pub fn bad_transition(from: impl ToString, to: impl ToString) -> Self {
        MarketplaceError::InvalidStateTransition { from: from.to_string(), to: to.to_string() }
    }
}

impl From<sqlx::Error> for MarketplaceError {
    fn from(e: sqlx::Error) -> Self {
        MarketplaceError::DatabaseError(e.to_string())
    }
}

impl From<WalletApiError> for MarketplaceError {
    fn from(e: WalletApiError) -> Self {
        match e {
            WalletApiError::InsufficientFunds { .. } => MarketplaceError::InsufficientFunds,
            WalletApiError::WalletNotFound(user_id) => MarketplaceError::WalletNotFound(user_id),
            WalletApiError::DuplicateTransaction(tx_id) => MarketplaceError::DuplicateTransaction(tx_id),
            WalletApiError::InvalidAmount(amount) => MarketplaceError::Validation(format!("invalid amount: {amount}")),
            WalletApiError::TransactionFinalised(tx_id) => {
                MarketplaceError::Validation(format!("transaction {tx_id} is already finalised"))
            },
            WalletApiError::DatabaseError(msg) => MarketplaceError::DatabaseError(msg),
        }
    }
}
