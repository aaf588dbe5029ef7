use log::*;
use soko_common::Kobo;

use crate::{
    db_types::WithdrawalRequest,
    events::{EventProducers, WithdrawalSettledEvent},
    traits::{BankDetails, MarketplaceDatabase, MarketplaceError, SettlementOutcome},
};

/// Cash-out flow: reserve wallet funds, hand the transfer to the payout provider, reconcile its
/// verdict when the callback arrives.
pub struct WithdrawalApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> WithdrawalApi<B>
where B: MarketplaceDatabase
{
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    /// Reserves the amount from the shopping balance and records the `Pending` request/transaction
    /// pair. The actual transfer is the payout provider's job; its asynchronous verdict arrives
    /// through [`Self::settle`].
    pub async fn request_withdraw(
        &self,
        user_id: i64,
        amount: Kobo,
        bank: BankDetails,
    ) -> Result<WithdrawalRequest, MarketplaceError> {
        let request = self.db.request_withdrawal(user_id, amount, bank).await?;
        info!("💸️ User {user_id} requested withdrawal [{}] of {amount}", request.reference);
        Ok(request)
    }

    /// Applies the provider's settlement verdict. A `Failed` verdict re-credits the reserved
    /// amount; settling a terminal request is rejected.
    pub async fn settle(
        &self,
        reference: &str,
        outcome: SettlementOutcome,
    ) -> Result<WithdrawalRequest, MarketplaceError> {
        let request = self.db.settle_withdrawal(reference, outcome).await?;
        for emitter in &self.producers.withdrawal_settled_producer {
            emitter.publish_event(WithdrawalSettledEvent { request: request.clone() }).await;
        }
        Ok(request)
    }

    pub async fn status(&self, reference: &str) -> Result<Option<WithdrawalRequest>, MarketplaceError> {
        self.db.fetch_withdrawal(reference).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
