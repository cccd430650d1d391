use std::{any::type_name_of_val, fmt, sync::Arc, time::Duration};

use cinegate_model::{AccountId, InviteId, ViewerAccount};
use tracing::debug;

use crate::{
    database::ports::{AccountStore, CreditOutcome},
    error::{StoreResult, bounded},
    settings::DEFAULT_STORE_TIMEOUT,
};

/// Spend one bonus credit if any are left.
pub fn consume_one(account: &mut ViewerAccount) -> bool {
    match account.bonus_views_available.checked_sub(1) {
        Some(left) => {
            account.bonus_views_available = left;
            true
        }
        None => false,
    }
}

/// Invite-earned view credits. Credits are keyed by the invite that earned
/// them, so replaying an acceptance never pays twice.
pub struct BonusLedger<A>
where
    A: AccountStore + ?Sized,
{
    store: Arc<A>,
    store_timeout: Duration,
}

impl<A> Clone for BonusLedger<A>
where
    A: AccountStore + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            store_timeout: self.store_timeout,
        }
    }
}

impl<A> fmt::Debug for BonusLedger<A>
where
    A: AccountStore + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BonusLedger")
            .field("store", &type_name_of_val(self.store.as_ref()))
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

impl<A> BonusLedger<A>
where
    A: AccountStore + ?Sized,
{
    pub fn new(store: Arc<A>) -> Self {
        Self {
            store,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Add `amount` credits to `account_id`, once per `invite_id`.
    pub async fn credit(
        &self,
        account_id: AccountId,
        invite_id: InviteId,
        amount: u32,
    ) -> StoreResult<CreditOutcome> {
        let outcome = bounded(
            self.store_timeout,
            self.store.credit_bonus_once(account_id, invite_id, amount),
        )
        .await?;

        match outcome {
            CreditOutcome::Applied { balance } => debug!(
                account = %account_id,
                invite = %invite_id,
                amount,
                balance,
                "bonus credited"
            ),
            CreditOutcome::AlreadyApplied => debug!(
                account = %account_id,
                invite = %invite_id,
                "bonus credit already applied"
            ),
        }
        Ok(outcome)
    }

    /// Spend one credit through the atomic update. Returns whether a credit
    /// was available.
    pub async fn consume_one(
        &self,
        account_id: AccountId,
    ) -> StoreResult<bool> {
        let mut spent = false;
        bounded(
            self.store_timeout,
            self.store.atomic_update_account(account_id, &mut |account| {
                spent = consume_one(account);
                spent
            }),
        )
        .await?;
        Ok(spent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::infrastructure::memory::InMemoryAccountStore;
    use chrono::Utc;

    #[test]
    fn consume_stops_at_zero() {
        let mut account = ViewerAccount::register("v@example.com", Utc::now());
        account.bonus_views_available = 1;

        assert!(consume_one(&mut account));
        assert!(!consume_one(&mut account));
        assert_eq!(account.bonus_views_available, 0);
    }

    #[tokio::test]
    async fn replayed_credit_pays_once() {
        let store = Arc::new(InMemoryAccountStore::new());
        let account = store
            .insert_account(ViewerAccount::register(
                "v@example.com",
                Utc::now(),
            ))
            .await
            .unwrap();
        let ledger = BonusLedger::new(store.clone());
        let invite = InviteId::new();

        let first = ledger.credit(account.id, invite, 2).await.unwrap();
        let replay = ledger.credit(account.id, invite, 2).await.unwrap();
        assert!(first.was_applied());
        assert!(!replay.was_applied());
        ledger.credit(account.id, InviteId::new(), 2).await.unwrap();

        assert!(ledger.consume_one(account.id).await.unwrap());
        let stored = store.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(stored.bonus_views_available, 3);
    }
}
