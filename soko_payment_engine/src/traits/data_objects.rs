use serde::{Deserialize, Serialize};
use soko_common::Kobo;

use crate::{
    cart::PricedLine,
    db_types::{Escrow, Order, PaymentMethod, StoreOrder, WalletTransaction},
};

/// A fully priced checkout, ready to be persisted. Produced by [`crate::cart::assemble_order`];
/// totals already satisfy `grand_total = items_total + shipping_total + platform_fee -
/// discount_total`.
#[derive(Debug, Clone)]
pub struct AssembledOrder {
    pub order_no: String,
    pub user_id: i64,
    pub delivery_address_id: i64,
    pub payment_method: PaymentMethod,
    pub items_total: Kobo,
    pub shipping_total: Kobo,
    pub platform_fee: Kobo,
    pub discount_total: Kobo,
    pub grand_total: Kobo,
    pub stores: Vec<AssembledStoreOrder>,
}

/// One store's slice of an assembled order. `subtotal_with_shipping` is the store's full payable
/// share of the grand total: items + shipping + its platform-fee share - its discount share.
#[derive(Debug, Clone)]
pub struct AssembledStoreOrder {
    pub store_id: i64,
    pub items_subtotal: Kobo,
    pub shipping_fee: Kobo,
    pub discount: Kobo,
    pub subtotal_with_shipping: Kobo,
    pub lines: Vec<PricedLine>,
}

/// What checkout hands back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResult {
    pub order: Order,
    pub store_orders: Vec<StoreOrder>,
}

/// How the buyer is paying. Card authorization happens at the gateway before this engine is
/// invoked; the engine only records the gateway's reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentData {
    Wallet,
    Card { gateway_reference: String },
}

/// The committed outcome of a successful payment capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub order: Order,
    pub store_orders: Vec<StoreOrder>,
    pub escrows: Vec<Escrow>,
    pub transaction: WalletTransaction,
}

/// The committed outcome of an escrow release or refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowSettlement {
    pub escrow: Escrow,
    pub transaction: WalletTransaction,
}

/// Destination account for a withdrawal, as the payout provider expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetails {
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
}

/// What the payout provider reported back for a withdrawal reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    Completed,
    Failed { reason: String },
}
