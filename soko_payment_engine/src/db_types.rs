//! Database entity types for the Soko payment engine.
//!
//! Every status column in the schema maps onto a closed enum here, so an illegal status string can
//! never leak past the type boundary, and the store-order transition table lives in exactly one
//! place ([`StoreOrderStatus::can_progress_to`]).
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

pub use soko_common::Kobo;

#[derive(Debug, Clone, Error)]
#[error("Invalid {0} value: {1}")]
pub struct ConversionError(pub &'static str, pub String);

//--------------------------------------     BalanceKind      ---------------------------------------------------------
/// The five independent ledgers carried by a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceKind {
    Shopping,
    Reward,
    Referral,
    Loyalty,
    AdCredit,
}

impl Display for BalanceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BalanceKind::Shopping => write!(f, "shopping"),
            BalanceKind::Reward => write!(f, "reward"),
            BalanceKind::Referral => write!(f, "referral"),
            BalanceKind::Loyalty => write!(f, "loyalty"),
            BalanceKind::AdCredit => write!(f, "ad_credit"),
        }
    }
}

//--------------------------------------        Wallet        ---------------------------------------------------------
/// A user's balance ledgers. Created lazily on first use and mutated only through the ledger
/// primitives, never by direct assignment.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub user_id: i64,
    pub shopping_balance: Kobo,
    pub reward_balance: Kobo,
    pub referral_balance: Kobo,
    pub loyalty_points: i64,
    pub ad_credit: Kobo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn balance(&self, kind: BalanceKind) -> Kobo {
        match kind {
            BalanceKind::Shopping => self.shopping_balance,
            BalanceKind::Reward => self.reward_balance,
            BalanceKind::Referral => self.referral_balance,
            BalanceKind::Loyalty => Kobo::from(self.loyalty_points),
            BalanceKind::AdCredit => self.ad_credit,
        }
    }
}

//--------------------------------------       TxStatus       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

impl Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxStatus::Pending => write!(f, "Pending"),
            TxStatus::Success => write!(f, "Success"),
            TxStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for TxStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Success" => Ok(Self::Success),
            "Failed" => Ok(Self::Failed),
            other => Err(ConversionError("transaction status", other.to_string())),
        }
    }
}

//--------------------------------------        TxType        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TxType {
    Deposit,
    Withdrawal,
    OrderPayment,
    EscrowRelease,
    EscrowRefund,
}

impl TxType {
    /// Prefix used when generating a human-traceable transaction id for this kind of movement.
    pub fn tx_id_prefix(&self) -> &'static str {
        match self {
            TxType::Deposit => "DP",
            TxType::Withdrawal => "WD",
            TxType::OrderPayment => "PAY",
            TxType::EscrowRelease => "ESC",
            TxType::EscrowRefund => "RFD",
        }
    }
}

impl Display for TxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxType::Deposit => write!(f, "Deposit"),
            TxType::Withdrawal => write!(f, "Withdrawal"),
            TxType::OrderPayment => write!(f, "OrderPayment"),
            TxType::EscrowRelease => write!(f, "EscrowRelease"),
            TxType::EscrowRefund => write!(f, "EscrowRefund"),
        }
    }
}

impl FromStr for TxType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deposit" => Ok(Self::Deposit),
            "Withdrawal" => Ok(Self::Withdrawal),
            "OrderPayment" => Ok(Self::OrderPayment),
            "EscrowRelease" => Ok(Self::EscrowRelease),
            "EscrowRefund" => Ok(Self::EscrowRefund),
            other => Err(ConversionError("transaction type", other.to_string())),
        }
    }
}

//--------------------------------------   WalletTransaction  ---------------------------------------------------------
/// An append-only record of one money movement. Only `status` may change after insertion, and only
/// from `Pending` to a terminal state.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: i64,
    pub tx_id: String,
    pub user_id: i64,
    pub amount: Kobo,
    pub tx_type: TxType,
    pub status: TxStatus,
    pub order_id: Option<i64>,
    pub reference: Option<String>,
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a new [`WalletTransaction`] row.
#[derive(Debug, Clone)]
pub struct NewWalletTransaction {
    pub tx_id: String,
    pub user_id: i64,
    pub amount: Kobo,
    pub tx_type: TxType,
    pub status: TxStatus,
    pub order_id: Option<i64>,
    pub reference: Option<String>,
    pub memo: Option<String>,
}

impl NewWalletTransaction {
    pub fn new(tx_id: String, user_id: i64, amount: Kobo, tx_type: TxType) -> Self {
        Self { tx_id, user_id, amount, tx_type, status: TxStatus::Success, order_id: None, reference: None, memo: None }
    }

    pub fn pending(mut self) -> Self {
        self.status = TxStatus::Pending;
        self
    }

    pub fn for_order(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_reference(mut self, reference: String) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_memo(mut self, memo: String) -> Self {
        self.memo = Some(memo);
        self
    }
}

//--------------------------------------       OrderNo        ---------------------------------------------------------
/// A lightweight wrapper around the public order number.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderNo(pub String);

impl FromStr for OrderNo {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderNo {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderNo {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------    PaymentMethod     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentMethod {
    Wallet,
    Card,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Wallet => write!(f, "Wallet"),
            PaymentMethod::Card => write!(f, "Card"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Wallet" => Ok(Self::Wallet),
            "Card" => Ok(Self::Card),
            other => Err(ConversionError("payment method", other.to_string())),
        }
    }
}

//--------------------------------------    PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Paid => write!(f, "Paid"),
            PaymentStatus::Failed => write!(f, "Failed"),
            PaymentStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            "Refunded" => Ok(Self::Refunded),
            other => Err(ConversionError("payment status", other.to_string())),
        }
    }
}

//--------------------------------------     OrderStatus      ---------------------------------------------------------
/// The buyer-facing roll-up of the order's store orders. Derived, never set directly by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Accepted,
    Rejected,
    Paid,
    Completed,
    Cancelled,
    Refunded,
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "Pending"),
            OrderStatus::Accepted => write!(f, "Accepted"),
            OrderStatus::Rejected => write!(f, "Rejected"),
            OrderStatus::Paid => write!(f, "Paid"),
            OrderStatus::Completed => write!(f, "Completed"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
            OrderStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Accepted" => Ok(Self::Accepted),
            "Rejected" => Ok(Self::Rejected),
            "Paid" => Ok(Self::Paid),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            "Refunded" => Ok(Self::Refunded),
            other => Err(ConversionError("order status", other.to_string())),
        }
    }
}

impl OrderStatus {
    /// Rolls the per-store statuses up into the buyer-facing order status.
    pub fn roll_up(statuses: &[StoreOrderStatus]) -> OrderStatus {
        use StoreOrderStatus as S;
        if statuses.is_empty() {
            return OrderStatus::Pending;
        }
        if statuses.iter().all(|s| *s == S::Rejected) {
            return OrderStatus::Rejected;
        }
        if statuses.iter().all(|s| *s == S::Cancelled) {
            return OrderStatus::Cancelled;
        }
        if statuses.iter().all(|s| matches!(s, S::Refunded | S::Cancelled)) {
            return OrderStatus::Refunded;
        }
        if statuses.iter().all(|s| *s == S::Delivered) {
            return OrderStatus::Completed;
        }
        if statuses.iter().any(|s| matches!(s, S::Paid | S::Processing | S::OutForDelivery | S::Delivered)) {
            return OrderStatus::Paid;
        }
        if statuses.iter().all(|s| *s != S::PendingAcceptance) {
            return OrderStatus::Accepted;
        }
        OrderStatus::Pending
    }
}

//--------------------------------------        Order         ---------------------------------------------------------
/// One buyer checkout event. Totals are frozen at creation time; later seller actions never change
/// them, and `grand_total = items_total + shipping_total + platform_fee - discount_total` holds for
/// the lifetime of the row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_no: OrderNo,
    pub user_id: i64,
    pub delivery_address_id: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub items_total: Kobo,
    pub shipping_total: Kobo,
    pub platform_fee: Kobo,
    pub discount_total: Kobo,
    pub grand_total: Kobo,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------   StoreOrderStatus   ---------------------------------------------------------
/// Per-store fulfillment state machine.
///
/// ```text
/// PendingAcceptance -> Accepted -> Paid -> Processing -> OutForDelivery -> Delivered
///        |                                   \------------- Cancelled | Refunded
///        +-> Rejected (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum StoreOrderStatus {
    PendingAcceptance,
    Accepted,
    Paid,
    Processing,
    OutForDelivery,
    Delivered,
    Rejected,
    Cancelled,
    Refunded,
}

impl StoreOrderStatus {
    /// Position in the forward fulfillment sequence, or `None` for the branch states.
    pub fn fulfillment_rank(&self) -> Option<u8> {
        use StoreOrderStatus::*;
        match self {
            PendingAcceptance => Some(0),
            Accepted => Some(1),
            Paid => Some(2),
            Processing => Some(3),
            OutForDelivery => Some(4),
            Delivered => Some(5),
            Rejected | Cancelled | Refunded => None,
        }
    }

    /// The single authority on which transitions are legal. Callers must not re-implement this.
    pub fn can_progress_to(&self, next: StoreOrderStatus) -> bool {
        use StoreOrderStatus::*;
        match (*self, next) {
            (PendingAcceptance, Accepted) | (PendingAcceptance, Rejected) => true,
            (Accepted, Paid) => true,
            // Fulfillment only moves forward. Skipping ahead is allowed, going back is not.
            (from, to) => match (from.fulfillment_rank(), to.fulfillment_rank()) {
                (Some(f), Some(t)) => f >= 2 && t > f,
                (Some(f), None) => f >= 2 && matches!(to, Cancelled | Refunded),
                _ => false,
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StoreOrderStatus::Rejected | StoreOrderStatus::Cancelled | StoreOrderStatus::Refunded)
    }
}

impl Display for StoreOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreOrderStatus::PendingAcceptance => write!(f, "PendingAcceptance"),
            StoreOrderStatus::Accepted => write!(f, "Accepted"),
            StoreOrderStatus::Paid => write!(f, "Paid"),
            StoreOrderStatus::Processing => write!(f, "Processing"),
            StoreOrderStatus::OutForDelivery => write!(f, "OutForDelivery"),
            StoreOrderStatus::Delivered => write!(f, "Delivered"),
            StoreOrderStatus::Rejected => write!(f, "Rejected"),
            StoreOrderStatus::Cancelled => write!(f, "Cancelled"),
            StoreOrderStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for StoreOrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PendingAcceptance" => Ok(Self::PendingAcceptance),
            "Accepted" => Ok(Self::Accepted),
            "Paid" => Ok(Self::Paid),
            "Processing" => Ok(Self::Processing),
            "OutForDelivery" => Ok(Self::OutForDelivery),
            "Delivered" => Ok(Self::Delivered),
            "Rejected" => Ok(Self::Rejected),
            "Cancelled" => Ok(Self::Cancelled),
            "Refunded" => Ok(Self::Refunded),
            other => Err(ConversionError("store order status", other.to_string())),
        }
    }
}

//--------------------------------------      StoreOrder      ---------------------------------------------------------
/// One seller's portion of an order. Never hard-deleted; rejected and refunded rows stay behind as
/// the audit trail. `subtotal_with_shipping` is this store's full payable share of the order's
/// grand total, and is the amount that lands in escrow at capture time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StoreOrder {
    pub id: i64,
    pub order_id: i64,
    pub store_id: i64,
    pub status: StoreOrderStatus,
    pub items_subtotal: Kobo,
    pub shipping_fee: Kobo,
    pub discount: Kobo,
    pub subtotal_with_shipping: Kobo,
    pub rejection_reason: Option<String>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
    pub delivery_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      OrderItem       ---------------------------------------------------------
/// Line item snapshot taken at checkout, so later catalog edits never rewrite order history.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub store_order_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub name: String,
    pub sku: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub unit_price: Kobo,
    pub unit_discount_price: Option<Kobo>,
    pub qty: i64,
    pub line_total: Kobo,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     EscrowStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum EscrowStatus {
    Locked,
    Released,
    Refunded,
}

impl Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EscrowStatus::Locked => write!(f, "Locked"),
            EscrowStatus::Released => write!(f, "Released"),
            EscrowStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for EscrowStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Locked" => Ok(Self::Locked),
            "Released" => Ok(Self::Released),
            "Refunded" => Ok(Self::Refunded),
            other => Err(ConversionError("escrow status", other.to_string())),
        }
    }
}

//--------------------------------------        Escrow        ---------------------------------------------------------
/// Funds held against a store order until delivery is confirmed. `Locked` rows move to exactly one
/// of `Released` or `Refunded`, enforced by the status predicate on the update, never by
/// check-then-act. Rows with a NULL `store_order_id` predate store-order granularity and are only
/// ever read through the legacy fallback lookup.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Escrow {
    pub id: i64,
    pub order_id: i64,
    pub store_order_id: Option<i64>,
    pub order_item_id: Option<i64>,
    pub seller_id: i64,
    pub buyer_id: i64,
    pub amount: Kobo,
    pub shipping_fee: Kobo,
    pub status: EscrowStatus,
    pub released_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    OrderTracking     ---------------------------------------------------------
/// Append-only audit row written on every store-order transition.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderTracking {
    pub id: i64,
    pub store_order_id: i64,
    pub status: StoreOrderStatus,
    pub note: Option<String>,
    pub performed_by: String,
    pub delivery_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        Actor         ---------------------------------------------------------
/// Who performed a transition. Persisted as text in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    Buyer(i64),
    Seller(i64),
    Admin(i64),
    System,
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::Buyer(id) => write!(f, "buyer:{id}"),
            Actor::Seller(id) => write!(f, "seller:{id}"),
            Actor::Admin(id) => write!(f, "admin:{id}"),
            Actor::System => write!(f, "system"),
        }
    }
}

//--------------------------------------  WithdrawalStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl WithdrawalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WithdrawalStatus::Completed | WithdrawalStatus::Failed)
    }
}

impl Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WithdrawalStatus::Pending => write!(f, "Pending"),
            WithdrawalStatus::Processing => write!(f, "Processing"),
            WithdrawalStatus::Completed => write!(f, "Completed"),
            WithdrawalStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for WithdrawalStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            other => Err(ConversionError("withdrawal status", other.to_string())),
        }
    }
}

//-------------------------------------- WithdrawalRequest    ---------------------------------------------------------
/// A payout ask against the shopping balance. The balance is reserved up front; a failed external
/// transfer re-credits it. Terminal rows are immutable.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: i64,
    pub user_id: i64,
    pub amount: Kobo,
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
    pub status: WithdrawalStatus,
    pub reference: String,
    pub tx_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
