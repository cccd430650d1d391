use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinegate_model::{AccountId, Invite, InviteId};

use crate::error::StoreResult;

#[async_trait]
pub trait InviteStore: Send + Sync {
    /// Persist a new pending invite. Fails with `Duplicate` when a pending
    /// invite already exists for the same inviter and email.
    async fn insert_invite(&self, invite: Invite) -> StoreResult<Invite>;

    async fn get_invite(&self, id: InviteId) -> StoreResult<Option<Invite>>;

    async fn find_by_code(&self, code: &str) -> StoreResult<Option<Invite>>;

    /// The pending invite for `(inviter, email)`, whether or not it is past
    /// its expiry.
    async fn find_pending(
        &self,
        inviter: AccountId,
        email: &str,
    ) -> StoreResult<Option<Invite>>;

    /// Every invite sent by `inviter`, newest first.
    async fn list_by_inviter(
        &self,
        inviter: AccountId,
    ) -> StoreResult<Vec<Invite>>;

    /// Move a pending invite that is not past expiry at `now` to Accepted.
    ///
    /// Any other state is left untouched. Returns the record as stored after
    /// the call so the caller can tell which transition, if any, happened.
    async fn mark_accepted(
        &self,
        id: InviteId,
        now: DateTime<Utc>,
    ) -> StoreResult<Invite>;

    /// Move a pending invite to Expired. Other states are left untouched.
    async fn mark_expired(&self, id: InviteId) -> StoreResult<Invite>;

    /// Expire every pending invite with `expires_at < now`. Returns how many
    /// records changed.
    async fn expire_pending(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}
