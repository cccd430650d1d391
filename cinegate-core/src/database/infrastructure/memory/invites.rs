use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinegate_model::{AccountId, Invite, InviteId, InviteStatus};
use tokio::sync::Mutex;

use crate::database::ports::invites::InviteStore;
use crate::error::{StoreError, StoreResult};

/// Process-local invite store. One mutex guards the whole table, so every
/// status transition is atomic with the uniqueness checks.
#[derive(Debug, Default)]
pub struct InMemoryInviteStore {
    invites: Mutex<HashMap<InviteId, Invite>>,
}

impl InMemoryInviteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(id: InviteId) -> StoreError {
        StoreError::NotFound {
            entity: "invite",
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl InviteStore for InMemoryInviteStore {
    async fn insert_invite(&self, invite: Invite) -> StoreResult<Invite> {
        let mut invites = self.invites.lock().await;

        if invites.values().any(|existing| existing.code == invite.code) {
            return Err(StoreError::Duplicate {
                entity: "invite code",
                detail: invite.code,
            });
        }
        if invites.values().any(|existing| {
            existing.status == InviteStatus::Pending
                && existing.inviter_id == invite.inviter_id
                && existing.invitee_email == invite.invitee_email
        }) {
            return Err(StoreError::Duplicate {
                entity: "pending invite",
                detail: invite.invitee_email,
            });
        }
        if invites.contains_key(&invite.id) {
            return Err(StoreError::Duplicate {
                entity: "invite",
                detail: invite.id.to_string(),
            });
        }

        invites.insert(invite.id, invite.clone());
        Ok(invite)
    }

    async fn get_invite(&self, id: InviteId) -> StoreResult<Option<Invite>> {
        Ok(self.invites.lock().await.get(&id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> StoreResult<Option<Invite>> {
        let invites = self.invites.lock().await;
        Ok(invites.values().find(|invite| invite.code == code).cloned())
    }

    async fn find_pending(
        &self,
        inviter: AccountId,
        email: &str,
    ) -> StoreResult<Option<Invite>> {
        let invites = self.invites.lock().await;
        Ok(invites
            .values()
            .find(|invite| {
                invite.status == InviteStatus::Pending
                    && invite.inviter_id == inviter
                    && invite.invitee_email == email
            })
            .cloned())
    }

    async fn list_by_inviter(
        &self,
        inviter: AccountId,
    ) -> StoreResult<Vec<Invite>> {
        let invites = self.invites.lock().await;
        let mut sent: Vec<Invite> = invites
            .values()
            .filter(|invite| invite.inviter_id == inviter)
            .cloned()
            .collect();
        sent.sort_by(|a, b| {
            b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
        });
        Ok(sent)
    }

    async fn mark_accepted(
        &self,
        id: InviteId,
        now: DateTime<Utc>,
    ) -> StoreResult<Invite> {
        let mut invites = self.invites.lock().await;
        let invite = invites.get_mut(&id).ok_or_else(|| Self::not_found(id))?;

        if invite.is_open(now) {
            invite.status = InviteStatus::Accepted;
            invite.accepted_at = Some(now);
        }
        Ok(invite.clone())
    }

    async fn mark_expired(&self, id: InviteId) -> StoreResult<Invite> {
        let mut invites = self.invites.lock().await;
        let invite = invites.get_mut(&id).ok_or_else(|| Self::not_found(id))?;

        if invite.status == InviteStatus::Pending {
            invite.status = InviteStatus::Expired;
        }
        Ok(invite.clone())
    }

    async fn expire_pending(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut invites = self.invites.lock().await;
        let mut expired = 0;
        for invite in invites.values_mut() {
            if invite.status == InviteStatus::Pending
                && invite.is_past_expiry(now)
            {
                invite.status = InviteStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }
}
