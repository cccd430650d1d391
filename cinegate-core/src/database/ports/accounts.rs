use async_trait::async_trait;
use cinegate_model::{AccountId, InviteId, ViewerAccount};
use serde::Serialize;

use crate::error::StoreResult;

/// In-place edit applied while the store holds the account's row lock.
///
/// Returns `true` when the draft was changed and must be written back.
/// Returning `false` commits nothing.
pub type AccountMutation<'a> =
    &'a mut (dyn FnMut(&mut ViewerAccount) -> bool + Send);

/// Result of a keyed bonus credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreditOutcome {
    /// First time the key was seen; `balance` is the new bonus balance.
    Applied { balance: u32 },
    /// The key was already applied; nothing changed.
    AlreadyApplied,
}

impl CreditOutcome {
    pub fn was_applied(&self) -> bool {
        matches!(self, CreditOutcome::Applied { .. })
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Persist a new account. Fails with `Duplicate` when the email is taken.
    async fn insert_account(
        &self,
        account: ViewerAccount,
    ) -> StoreResult<ViewerAccount>;

    async fn get_account(
        &self,
        id: AccountId,
    ) -> StoreResult<Option<ViewerAccount>>;

    /// Lookup by normalized email.
    async fn find_by_email(
        &self,
        email: &str,
    ) -> StoreResult<Option<ViewerAccount>>;

    /// Read the current record, run `update` against it and persist the
    /// result, all under a per-account lock. No other update of the same
    /// account interleaves between the read and the write.
    ///
    /// Returns the record as stored after the call. Implementations that
    /// detect a lost race instead of locking return `Conflict`.
    async fn atomic_update_account(
        &self,
        id: AccountId,
        update: AccountMutation<'_>,
    ) -> StoreResult<ViewerAccount>;

    /// Add `amount` to the bonus balance unless `key` was already applied
    /// to this account. The key check and the balance change are atomic.
    async fn credit_bonus_once(
        &self,
        id: AccountId,
        key: InviteId,
        amount: u32,
    ) -> StoreResult<CreditOutcome>;
}
