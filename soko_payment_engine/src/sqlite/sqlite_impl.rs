//! `SqliteDatabase` is a concrete implementation of a Soko payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the
//! [`crate::traits`] module. Every multi-step flow opens one transaction against the pool and
//! commits it at the end; an early return via `?` drops the transaction, which rolls the whole
//! unit back.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use soko_common::Kobo;
use sqlx::SqlitePool;

use super::db::{db_url, escrows, new_pool, orders, store_orders, tracking, transactions, wallets, withdrawals};
use crate::{
    db_types::{
        Actor,
        BalanceKind,
        Escrow,
        EscrowStatus,
        NewWalletTransaction,
        Order,
        OrderItem,
        OrderNo,
        OrderStatus,
        OrderTracking,
        PaymentStatus,
        StoreOrder,
        StoreOrderStatus,
        TxStatus,
        TxType,
        Wallet,
        WalletTransaction,
        WithdrawalRequest,
        WithdrawalStatus,
    },
    helpers::{new_payout_reference, new_tx_id},
    traits::{
        AssembledOrder,
        BankDetails,
        CheckoutResult,
        EscrowSettlement,
        MarketplaceDatabase,
        MarketplaceError,
        PaymentData,
        PaymentReceipt,
        SettlementOutcome,
        WalletApiError,
        WalletManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL from the environment.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Re-derives the buyer-facing order status from its store orders. Called inside the same
    /// transaction as the transition that made it stale. Totals are never recomputed here.
    async fn roll_up_order_status(
        order_id: i64,
        conn: &mut sqlx::SqliteConnection,
    ) -> Result<OrderStatus, MarketplaceError> {
        let store_orders = store_orders::fetch_store_orders_for_order(order_id, &mut *conn).await?;
        let statuses: Vec<StoreOrderStatus> = store_orders.iter().map(|so| so.status).collect();
        let rolled = OrderStatus::roll_up(&statuses);
        orders::set_status(order_id, rolled, conn).await?;
        Ok(rolled)
    }
}

impl WalletManagement for SqliteDatabase {
    async fn fetch_wallet(&self, user_id: i64) -> Result<Option<Wallet>, WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        wallets::fetch_wallet(user_id, &mut conn).await
    }

    async fn fetch_or_create_wallet(&self, user_id: i64) -> Result<Wallet, WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        wallets::fetch_or_create_wallet(user_id, &mut conn).await
    }

    async fn credit(
        &self,
        user_id: i64,
        amount: Kobo,
        kind: BalanceKind,
        tx_type: TxType,
        memo: Option<String>,
    ) -> Result<WalletTransaction, WalletApiError> {
        if !amount.is_positive() {
            return Err(WalletApiError::InvalidAmount(amount));
        }
        let mut tx = self.pool.begin().await?;
        wallets::credit_balance(user_id, amount, kind, &mut tx).await?;
        let mut new_tx = NewWalletTransaction::new(new_tx_id(tx_type.tx_id_prefix()), user_id, amount, tx_type);
        new_tx.memo = memo;
        let record = transactions::insert_transaction(new_tx, &mut tx).await?;
        tx.commit().await?;
        debug!("🏦️ Credit of {amount} to user {user_id} recorded as [{}]", record.tx_id);
        Ok(record)
    }

    async fn debit(
        &self,
        user_id: i64,
        amount: Kobo,
        kind: BalanceKind,
        tx_type: TxType,
        memo: Option<String>,
    ) -> Result<WalletTransaction, WalletApiError> {
        if !amount.is_positive() {
            return Err(WalletApiError::InvalidAmount(amount));
        }
        let mut tx = self.pool.begin().await?;
        wallets::debit_balance(user_id, amount, kind, &mut tx).await?;
        let mut new_tx = NewWalletTransaction::new(new_tx_id(tx_type.tx_id_prefix()), user_id, amount, tx_type);
        new_tx.memo = memo;
        let record = transactions::insert_transaction(new_tx, &mut tx).await?;
        tx.commit().await?;
        debug!("🏦️ Debit of {amount} from user {user_id} recorded as [{}]", record.tx_id);
        Ok(record)
    }

    async fn fetch_transactions_for_user(&self, user_id: i64) -> Result<Vec<WalletTransaction>, WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_for_user(user_id, &mut conn).await
    }

    async fn fetch_transaction_by_tx_id(&self, tx_id: &str) -> Result<Option<WalletTransaction>, WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_by_tx_id(tx_id, &mut conn).await
    }
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_checkout(&self, checkout: AssembledOrder) -> Result<CheckoutResult, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(&checkout, &mut tx).await?;
        let mut result_stores = Vec::with_capacity(checkout.stores.len());
        for store in &checkout.stores {
            let store_order = store_orders::insert_store_order(order.id, store, &mut tx).await?;
            store_orders::insert_order_items(store_order.id, &store.lines, &mut tx).await?;
            tracking::insert_tracking(
                store_order.id,
                StoreOrderStatus::PendingAcceptance,
                Some("order placed"),
                Actor::Buyer(order.user_id),
                None,
                &mut tx,
            )
            .await?;
            result_stores.push(store_order);
        }
        tx.commit().await?;
        debug!(
            "🗃️ Order {} saved with {} store orders, grand total {}",
            order.order_no,
            result_stores.len(),
            order.grand_total
        );
        Ok(CheckoutResult { order, store_orders: result_stores })
    }

    async fn fetch_order(&self, order_no: &OrderNo) -> Result<Option<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_no(order_no, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_store_order(&self, store_order_id: i64) -> Result<Option<StoreOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let row = store_orders::fetch_store_order(store_order_id, &mut conn).await?;
        Ok(row)
    }

    async fn fetch_store_orders_for_order(&self, order_id: i64) -> Result<Vec<StoreOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let rows = store_orders::fetch_store_orders_for_order(order_id, &mut conn).await?;
        Ok(rows)
    }

    async fn fetch_order_items(&self, store_order_id: i64) -> Result<Vec<OrderItem>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let rows = store_orders::fetch_order_items(store_order_id, &mut conn).await?;
        Ok(rows)
    }

    async fn fetch_tracking(&self, store_order_id: i64) -> Result<Vec<OrderTracking>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let rows = tracking::fetch_for_store_order(store_order_id, &mut conn).await?;
        Ok(rows)
    }

    async fn accept_store_order(
        &self,
        store_order_id: i64,
        store_id: i64,
        estimated_delivery_date: Option<DateTime<Utc>>,
        delivery_code: Option<String>,
    ) -> Result<StoreOrder, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let store_order = store_orders::fetch_store_order(store_order_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::StoreOrderNotFound(store_order_id))?;
        if store_order.store_id != store_id {
            return Err(MarketplaceError::Unauthorized(Actor::Seller(store_id)));
        }
        if store_order.status != StoreOrderStatus::PendingAcceptance {
            return Err(MarketplaceError::bad_transition(store_order.status, StoreOrderStatus::Accepted));
        }
        let updated = store_orders::set_accepted(store_order_id, estimated_delivery_date, delivery_code, &mut tx)
            .await?
            .ok_or_else(|| MarketplaceError::bad_transition(store_order.status, StoreOrderStatus::Accepted))?;
        tracking::insert_tracking(
            store_order_id,
            StoreOrderStatus::Accepted,
            Some("order accepted by store"),
            Actor::Seller(store_id),
            updated.delivery_code.as_deref(),
            &mut tx,
        )
        .await?;
        Self::roll_up_order_status(updated.order_id, &mut tx).await?;
        tx.commit().await?;
        info!("📦️ Store order {store_order_id} accepted by store {store_id}");
        Ok(updated)
    }

    async fn reject_store_order(
        &self,
        store_order_id: i64,
        store_id: i64,
        reason: &str,
    ) -> Result<StoreOrder, MarketplaceError> {
        if reason.trim().is_empty() {
            return Err(MarketplaceError::Validation("a rejection reason is required".to_string()));
        }
        let mut tx = self.pool.begin().await?;
        let store_order = store_orders::fetch_store_order(store_order_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::StoreOrderNotFound(store_order_id))?;
        if store_order.store_id != store_id {
            return Err(MarketplaceError::Unauthorized(Actor::Seller(store_id)));
        }
        if store_order.status != StoreOrderStatus::PendingAcceptance {
            return Err(MarketplaceError::bad_transition(store_order.status, StoreOrderStatus::Rejected));
        }
        let updated = store_orders::set_rejected(store_order_id, reason, &mut tx)
            .await?
            .ok_or_else(|| MarketplaceError::bad_transition(store_order.status, StoreOrderStatus::Rejected))?;
        tracking::insert_tracking(
            store_order_id,
            StoreOrderStatus::Rejected,
            Some(reason),
            Actor::Seller(store_id),
            None,
            &mut tx,
        )
        .await?;
        Self::roll_up_order_status(updated.order_id, &mut tx).await?;
        tx.commit().await?;
        info!("📦️ Store order {store_order_id} rejected by store {store_id}: {reason}");
        Ok(updated)
    }

    async fn capture_payment(
        &self,
        order_no: &OrderNo,
        buyer_id: i64,
        payment: PaymentData,
    ) -> Result<PaymentReceipt, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_order_no(order_no, &mut tx)
            .await?
            .ok_or_else(|| MarketplaceError::OrderNotFound(order_no.clone()))?;
        if order.user_id != buyer_id {
            return Err(MarketplaceError::Unauthorized(Actor::Buyer(buyer_id)));
        }
        if order.payment_status == PaymentStatus::Paid {
            return Err(MarketplaceError::OrderAlreadyPaid(order_no.clone()));
        }
        let store_orders_list = store_orders::fetch_store_orders_for_order(order.id, &mut tx).await?;
        if store_orders_list.is_empty() {
            return Err(MarketplaceError::Validation(format!("order {order_no} has no store orders")));
        }
        for so in &store_orders_list {
            if so.status != StoreOrderStatus::Accepted {
                return Err(MarketplaceError::bad_transition(so.status, StoreOrderStatus::Paid));
            }
        }
        // The payable amount is recomputed from the accepted store orders. The client never gets
        // to supply a total.
        let payable: Kobo = store_orders_list.iter().map(|so| so.subtotal_with_shipping).sum();
        if payable != order.grand_total {
            warn!(
                "💳️ Order {order_no}: stored grand total {} disagrees with recomputed payable {payable}. Using the \
                 recomputed value.",
                order.grand_total
            );
        }
        let record = match payment {
            PaymentData::Wallet => {
                wallets::debit_balance(buyer_id, payable, BalanceKind::Shopping, &mut tx).await?;
                let new_tx =
                    NewWalletTransaction::new(new_tx_id(TxType::OrderPayment.tx_id_prefix()), buyer_id, payable, TxType::OrderPayment)
                        .for_order(order.id)
                        .with_memo(format!("Wallet payment for order {order_no}"));
                transactions::insert_transaction(new_tx, &mut tx).await?
            },
            PaymentData::Card { gateway_reference } => {
                if gateway_reference.trim().is_empty() {
                    return Err(MarketplaceError::Validation("a gateway reference is required for card payments".to_string()));
                }
                let new_tx =
                    NewWalletTransaction::new(new_tx_id(TxType::OrderPayment.tx_id_prefix()), buyer_id, payable, TxType::OrderPayment)
                        .for_order(order.id)
                        .with_reference(gateway_reference)
                        .with_memo(format!("Card payment for order {order_no}"));
                transactions::insert_transaction(new_tx, &mut tx).await?
            },
        };
        let order = orders::mark_paid(order.id, &mut tx)
            .await?
            .ok_or_else(|| MarketplaceError::OrderAlreadyPaid(order_no.clone()))?;
        let mut paid_stores = Vec::with_capacity(store_orders_list.len());
        let mut locked = Vec::with_capacity(store_orders_list.len());
        for so in &store_orders_list {
            let paid = store_orders::transition(so.id, StoreOrderStatus::Accepted, StoreOrderStatus::Paid, &mut tx)
                .await?
                .ok_or_else(|| MarketplaceError::bad_transition(so.status, StoreOrderStatus::Paid))?;
            tracking::insert_tracking(
                so.id,
                StoreOrderStatus::Paid,
                Some("payment captured, funds locked in escrow"),
                Actor::System,
                None,
                &mut tx,
            )
            .await?;
            let escrow = escrows::insert_locked(
                order.id,
                so.id,
                so.store_id,
                buyer_id,
                so.subtotal_with_shipping,
                so.shipping_fee,
                &mut tx,
            )
            .await?;
            locked.push(escrow);
            paid_stores.push(paid);
        }
        tx.commit().await?;
        info!(
            "💳️ Payment of {payable} captured for order {order_no} ({} store orders, tx [{}])",
            paid_stores.len(),
            record.tx_id
        );
        Ok(PaymentReceipt { order, store_orders: paid_stores, escrows: locked, transaction: record })
    }

    async fn update_fulfillment(
        &self,
        store_order_id: i64,
        store_id: i64,
        next: StoreOrderStatus,
        note: Option<String>,
    ) -> Result<StoreOrder, MarketplaceError> {
        if !matches!(next, StoreOrderStatus::Processing | StoreOrderStatus::OutForDelivery | StoreOrderStatus::Delivered)
        {
            return Err(MarketplaceError::Validation(format!("{next} is not a seller fulfillment status")));
        }
        let mut tx = self.pool.begin().await?;
        let store_order = store_orders::fetch_store_order(store_order_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::StoreOrderNotFound(store_order_id))?;
        if store_order.store_id != store_id {
            return Err(MarketplaceError::Unauthorized(Actor::Seller(store_id)));
        }
        if !store_order.status.can_progress_to(next) {
            return Err(MarketplaceError::bad_transition(store_order.status, next));
        }
        let updated = store_orders::transition(store_order_id, store_order.status, next, &mut tx)
            .await?
            .ok_or_else(|| MarketplaceError::bad_transition(store_order.status, next))?;
        tracking::insert_tracking(store_order_id, next, note.as_deref(), Actor::Seller(store_id), None, &mut tx)
            .await?;
        Self::roll_up_order_status(updated.order_id, &mut tx).await?;
        tx.commit().await?;
        debug!("📦️ Store order {store_order_id} moved to {next} by store {store_id}");
        Ok(updated)
    }

    async fn confirm_delivery(&self, store_order_id: i64, buyer_id: i64) -> Result<StoreOrder, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let store_order = store_orders::fetch_store_order(store_order_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::StoreOrderNotFound(store_order_id))?;
        let order = orders::fetch_order_by_id(store_order.order_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::StoreOrderNotFound(store_order_id))?;
        if order.user_id != buyer_id {
            return Err(MarketplaceError::Unauthorized(Actor::Buyer(buyer_id)));
        }
        let updated = match store_order.status {
            StoreOrderStatus::OutForDelivery => {
                store_orders::transition(store_order_id, store_order.status, StoreOrderStatus::Delivered, &mut tx)
                    .await?
                    .ok_or_else(|| {
                        MarketplaceError::bad_transition(store_order.status, StoreOrderStatus::Delivered)
                    })?
            },
            StoreOrderStatus::Delivered => store_order,
            other => return Err(MarketplaceError::bad_transition(other, StoreOrderStatus::Delivered)),
        };
        tracking::insert_tracking(
            store_order_id,
            StoreOrderStatus::Delivered,
            Some("delivery confirmed by buyer"),
            Actor::Buyer(buyer_id),
            None,
            &mut tx,
        )
        .await?;
        Self::roll_up_order_status(updated.order_id, &mut tx).await?;
        tx.commit().await?;
        info!("📦️ Buyer {buyer_id} confirmed delivery of store order {store_order_id}");
        Ok(updated)
    }

    async fn release_escrow(
        &self,
        store_order_id: i64,
        performed_by: Actor,
        reason: &str,
    ) -> Result<Option<EscrowSettlement>, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        // The claim is the first statement of the transaction; whoever wins it owns the release.
        let escrow = match escrows::claim_for_store_order(store_order_id, EscrowStatus::Released, &mut tx).await? {
            Some(e) => e,
            None => {
                let store_order = store_orders::fetch_store_order(store_order_id, &mut tx)
                    .await?
                    .ok_or(MarketplaceError::StoreOrderNotFound(store_order_id))?;
                match escrows::claim_legacy_for_order(store_order.order_id, EscrowStatus::Released, &mut tx).await? {
                    Some(e) => e,
                    None => {
                        debug!("🔓️ No locked escrow to release for store order {store_order_id}");
                        return Ok(None);
                    },
                }
            },
        };
        wallets::credit_balance(escrow.seller_id, escrow.amount, BalanceKind::Shopping, &mut tx)
            .await?;
        let new_tx = NewWalletTransaction::new(
            new_tx_id(TxType::EscrowRelease.tx_id_prefix()),
            escrow.seller_id,
            escrow.amount,
            TxType::EscrowRelease,
        )
        .for_order(escrow.order_id)
        .with_memo(reason.to_string());
        let record = transactions::insert_transaction(new_tx, &mut tx).await?;
        tx.commit().await?;
        info!(
            "🔓️ Escrow {} ({}) released to seller {} by {performed_by}: {reason}",
            escrow.id, escrow.amount, escrow.seller_id
        );
        Ok(Some(EscrowSettlement { escrow, transaction: record }))
    }

    async fn refund_escrow(
        &self,
        store_order_id: i64,
        performed_by: Actor,
        reason: &str,
        next_status: StoreOrderStatus,
    ) -> Result<Option<EscrowSettlement>, MarketplaceError> {
        if !matches!(next_status, StoreOrderStatus::Cancelled | StoreOrderStatus::Refunded) {
            return Err(MarketplaceError::Validation(format!("{next_status} is not a refund outcome")));
        }
        let mut tx = self.pool.begin().await?;
        let escrow = match escrows::claim_for_store_order(store_order_id, EscrowStatus::Refunded, &mut tx).await? {
            Some(e) => e,
            None => {
                let store_order = store_orders::fetch_store_order(store_order_id, &mut tx)
                    .await?
                    .ok_or(MarketplaceError::StoreOrderNotFound(store_order_id))?;
                match escrows::claim_legacy_for_order(store_order.order_id, EscrowStatus::Refunded, &mut tx).await? {
                    Some(e) => e,
                    None => {
                        debug!("🔓️ No locked escrow to refund for store order {store_order_id}");
                        return Ok(None);
                    },
                }
            },
        };
        wallets::credit_balance(escrow.buyer_id, escrow.amount, BalanceKind::Shopping, &mut tx)
            .await?;
        let new_tx = NewWalletTransaction::new(
            new_tx_id(TxType::EscrowRefund.tx_id_prefix()),
            escrow.buyer_id,
            escrow.amount,
            TxType::EscrowRefund,
        )
        .for_order(escrow.order_id)
        .with_memo(reason.to_string());
        let record = transactions::insert_transaction(new_tx, &mut tx).await?;
        if let Some(so_id) = escrow.store_order_id {
            let store_order = store_orders::fetch_store_order(so_id, &mut tx)
                .await?
                .ok_or(MarketplaceError::StoreOrderNotFound(so_id))?;
            if store_order.status.can_progress_to(next_status) {
                store_orders::transition(so_id, store_order.status, next_status, &mut tx).await?;
                tracking::insert_tracking(so_id, next_status, Some(reason), performed_by, None, &mut tx).await?;
            } else {
                warn!(
                    "🔓️ Store order {so_id} is {} and cannot move to {next_status}; refunding the escrow anyway",
                    store_order.status
                );
            }
            let rolled = Self::roll_up_order_status(store_order.order_id, &mut tx).await?;
            if matches!(rolled, OrderStatus::Refunded | OrderStatus::Cancelled) {
                orders::set_payment_status_refunded(store_order.order_id, &mut tx).await?;
            }
        }
        tx.commit().await?;
        info!(
            "🔓️ Escrow {} ({}) refunded to buyer {} by {performed_by}: {reason}",
            escrow.id, escrow.amount, escrow.buyer_id
        );
        Ok(Some(EscrowSettlement { escrow, transaction: record }))
    }

    async fn fetch_escrows_for_store_order(&self, store_order_id: i64) -> Result<Vec<Escrow>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let rows = escrows::fetch_for_store_order(store_order_id, &mut conn).await?;
        Ok(rows)
    }

    async fn request_withdrawal(
        &self,
        user_id: i64,
        amount: Kobo,
        bank: BankDetails,
    ) -> Result<WithdrawalRequest, MarketplaceError> {
        if !amount.is_positive() {
            return Err(MarketplaceError::Validation(format!("withdrawal amount must be positive, got {amount}")));
        }
        if bank.bank_code.trim().is_empty() || bank.account_name.trim().is_empty() {
            return Err(MarketplaceError::Validation("bank code and account name are required".to_string()));
        }
        if bank.account_number.is_empty() || !bank.account_number.chars().all(|c| c.is_ascii_digit()) {
            return Err(MarketplaceError::Validation("account number must be numeric".to_string()));
        }
        let mut tx = self.pool.begin().await?;
        // Pessimistic reservation: the wallet is debited now, and re-credited only if the
        // provider later reports failure.
        wallets::debit_balance(user_id, amount, BalanceKind::Shopping, &mut tx).await?;
        let tx_id = new_tx_id(TxType::Withdrawal.tx_id_prefix());
        let reference = new_payout_reference();
        let new_tx = NewWalletTransaction::new(tx_id.clone(), user_id, amount, TxType::Withdrawal)
            .pending()
            .with_reference(reference.clone())
            .with_memo(format!("Withdrawal to {}/{}", bank.bank_code, bank.account_number));
        transactions::insert_transaction(new_tx, &mut tx).await?;
        let request = withdrawals::insert_request(user_id, amount, &bank, &reference, &tx_id, &mut tx).await?;
        tx.commit().await?;
        info!("💸️ Withdrawal [{reference}] of {amount} reserved for user {user_id}");
        Ok(request)
    }

    async fn settle_withdrawal(
        &self,
        reference: &str,
        outcome: SettlementOutcome,
    ) -> Result<WithdrawalRequest, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let existing = withdrawals::fetch_by_reference(reference, &mut tx)
            .await?
            .ok_or_else(|| MarketplaceError::WithdrawalNotFound(reference.to_string()))?;
        let (to, tx_status) = match &outcome {
            SettlementOutcome::Completed => (WithdrawalStatus::Completed, TxStatus::Success),
            SettlementOutcome::Failed { .. } => (WithdrawalStatus::Failed, TxStatus::Failed),
        };
        let updated = withdrawals::settle(reference, to, &mut tx)
            .await?
            .ok_or_else(|| MarketplaceError::bad_transition(existing.status, to))?;
        transactions::finalise_transaction(&updated.tx_id, tx_status, &mut tx).await?;
        if let SettlementOutcome::Failed { reason } = &outcome {
            // The transfer never happened, so the reservation flows back.
            wallets::credit_balance(updated.user_id, updated.amount, BalanceKind::Shopping, &mut tx)
                .await?;
            warn!("💸️ Withdrawal [{reference}] failed ({reason}); {} re-credited to user {}", updated.amount, updated.user_id);
        }
        tx.commit().await?;
        info!("💸️ Withdrawal [{reference}] settled as {}", updated.status);
        Ok(updated)
    }

    async fn fetch_withdrawal(&self, reference: &str) -> Result<Option<WithdrawalRequest>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let row = withdrawals::fetch_by_reference(reference, &mut conn).await?;
        Ok(row)
    }

    async fn close(&mut self) -> Result<(), MarketplaceError> {
        self.pool.close().await;
        Ok(())
    }
}
