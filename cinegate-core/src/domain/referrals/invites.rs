use std::{any::type_name_of_val, fmt, sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use cinegate_model::{AccountId, Invite, InviteId, InviteStatus};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::{
    clock::Clock,
    database::ports::{AccountStore, CreditOutcome, InviteStore},
    domain::{
        accounts::email::{InvalidEmail, normalize_email},
        entitlements::bonus::BonusLedger,
    },
    error::{StoreError, bounded},
    settings::{
        DEFAULT_BONUS_PER_INVITE, DEFAULT_INVITE_CODE_LENGTH,
        DEFAULT_INVITE_TTL_DAYS, DEFAULT_STORE_TIMEOUT, EngineSettings,
    },
};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_ATTEMPTS: usize = 4;

#[derive(Debug, Error)]
pub enum InviteError {
    #[error(
        "a pending invite to this address already exists until {expires_at}"
    )]
    DuplicatePendingInvite {
        invite_id: InviteId,
        expires_at: DateTime<Utc>,
    },
    #[error("{email} already has an account")]
    InviteeAlreadyRegistered { email: String },
    #[error("invite expired at {expired_at}")]
    InviteExpired { expired_at: DateTime<Utc> },
    #[error("invite not found")]
    InviteNotFound,
    #[error(transparent)]
    InvalidEmail(#[from] InvalidEmail),
    #[error("inviter account {0} not found")]
    InviterNotFound(AccountId),
    #[error("invite ttl {ttl} puts the expiry out of range")]
    TtlOutOfRange { ttl: TimeDelta },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// An accepted invite together with what the acceptance paid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptedInvite {
    pub invite: Invite,
    pub credit: CreditOutcome,
}

/// Invite lifecycle: create, accept (crediting the inviter once), expire.
pub struct InviteService<A, I>
where
    A: AccountStore + ?Sized,
    I: InviteStore + ?Sized,
{
    accounts: Arc<A>,
    invites: Arc<I>,
    ledger: BonusLedger<A>,
    clock: Arc<dyn Clock>,
    invite_ttl: TimeDelta,
    bonus_per_invite: u32,
    code_length: usize,
    store_timeout: Duration,
}

impl<A, I> Clone for InviteService<A, I>
where
    A: AccountStore + ?Sized,
    I: InviteStore + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            accounts: self.accounts.clone(),
            invites: self.invites.clone(),
            ledger: self.ledger.clone(),
            clock: self.clock.clone(),
            invite_ttl: self.invite_ttl,
            bonus_per_invite: self.bonus_per_invite,
            code_length: self.code_length,
            store_timeout: self.store_timeout,
        }
    }
}

impl<A, I> fmt::Debug for InviteService<A, I>
where
    A: AccountStore + ?Sized,
    I: InviteStore + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InviteService")
            .field("accounts", &type_name_of_val(self.accounts.as_ref()))
            .field("invites", &type_name_of_val(self.invites.as_ref()))
            .field("invite_ttl", &self.invite_ttl)
            .field("bonus_per_invite", &self.bonus_per_invite)
            .field("code_length", &self.code_length)
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

impl<A, I> InviteService<A, I>
where
    A: AccountStore + ?Sized,
    I: InviteStore + ?Sized,
{
    pub fn new(
        accounts: Arc<A>,
        invites: Arc<I>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger: BonusLedger::new(accounts.clone()),
            accounts,
            invites,
            clock,
            invite_ttl: TimeDelta::days(DEFAULT_INVITE_TTL_DAYS),
            bonus_per_invite: DEFAULT_BONUS_PER_INVITE,
            code_length: DEFAULT_INVITE_CODE_LENGTH,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn from_settings(
        accounts: Arc<A>,
        invites: Arc<I>,
        clock: Arc<dyn Clock>,
        settings: &EngineSettings,
    ) -> Self {
        Self::new(accounts, invites, clock)
            .with_invite_ttl(settings.invite_ttl)
            .with_bonus_per_invite(settings.bonus_per_invite)
            .with_code_length(settings.invite_code_length)
            .with_store_timeout(settings.store_timeout)
    }

    pub fn with_invite_ttl(mut self, ttl: TimeDelta) -> Self {
        self.invite_ttl = ttl;
        self
    }

    pub fn with_bonus_per_invite(mut self, amount: u32) -> Self {
        self.bonus_per_invite = amount;
        self
    }

    pub fn with_code_length(mut self, length: usize) -> Self {
        self.code_length = length.max(1);
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self.ledger = self.ledger.with_store_timeout(timeout);
        self
    }

    /// Record a pending invite from `inviter_id` to `invitee_email`.
    ///
    /// A pending invite to the same address that is already past its expiry
    /// is expired in place and does not block the new one.
    pub async fn create_invite(
        &self,
        inviter_id: AccountId,
        invitee_email: &str,
    ) -> Result<Invite, InviteError> {
        let email = normalize_email(invitee_email)?;
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(self.invite_ttl)
            .ok_or(InviteError::TtlOutOfRange {
                ttl: self.invite_ttl,
            })?;

        if bounded(self.store_timeout, self.accounts.get_account(inviter_id))
            .await?
            .is_none()
        {
            return Err(InviteError::InviterNotFound(inviter_id));
        }
        if bounded(self.store_timeout, self.accounts.find_by_email(&email))
            .await?
            .is_some()
        {
            return Err(InviteError::InviteeAlreadyRegistered { email });
        }

        if let Some(existing) = bounded(
            self.store_timeout,
            self.invites.find_pending(inviter_id, &email),
        )
        .await?
        {
            if !existing.is_past_expiry(now) {
                return Err(InviteError::DuplicatePendingInvite {
                    invite_id: existing.id,
                    expires_at: existing.expires_at,
                });
            }
            bounded(self.store_timeout, self.invites.mark_expired(existing.id))
                .await?;
            debug!(
                invite = %existing.id,
                "stale pending invite expired before re-invite"
            );
        }

        for _ in 0..CODE_ATTEMPTS {
            let invite = Invite {
                id: InviteId::new(),
                inviter_id,
                invitee_email: email.clone(),
                code: random_code(self.code_length),
                status: InviteStatus::Pending,
                created_at: now,
                expires_at,
                accepted_at: None,
            };

            let inserted =
                bounded(self.store_timeout, self.invites.insert_invite(invite))
                    .await;
            match inserted {
                Ok(invite) => {
                    info!(
                        invite = %invite.id,
                        inviter = %inviter_id,
                        expires_at = %invite.expires_at,
                        "invite created"
                    );
                    return Ok(invite);
                }
                Err(StoreError::Duplicate {
                    entity: "invite code",
                    ..
                }) => {
                    trace!("invite code collision; regenerating");
                }
                Err(StoreError::Duplicate {
                    entity: "pending invite",
                    detail,
                }) => {
                    return Err(self
                        .lost_pending_race(inviter_id, &email, detail)
                        .await);
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(StoreError::Duplicate {
            entity: "invite code",
            detail: format!("no free code after {CODE_ATTEMPTS} attempts"),
        }
        .into())
    }

    /// Another request created the pending invite between our check and
    /// insert; report it as the duplicate it is.
    async fn lost_pending_race(
        &self,
        inviter_id: AccountId,
        email: &str,
        detail: String,
    ) -> InviteError {
        let pending = bounded(
            self.store_timeout,
            self.invites.find_pending(inviter_id, email),
        )
        .await;
        match pending {
            Ok(Some(existing)) => InviteError::DuplicatePendingInvite {
                invite_id: existing.id,
                expires_at: existing.expires_at,
            },
            Ok(None) => InviteError::Store(StoreError::Duplicate {
                entity: "pending invite",
                detail,
            }),
            Err(err) => err.into(),
        }
    }

    /// Accept a pending invite and credit the inviter's bonus ledger.
    ///
    /// Accepting an already accepted invite is not an error: the keyed credit
    /// is re-applied, which pays nothing if it already went through.
    pub async fn accept_invite(
        &self,
        invite_id: InviteId,
    ) -> Result<AcceptedInvite, InviteError> {
        let now = self.clock.now();
        let invite =
            bounded(self.store_timeout, self.invites.get_invite(invite_id))
                .await?
                .ok_or(InviteError::InviteNotFound)?;

        let invite = match invite.status {
            InviteStatus::Accepted => invite,
            InviteStatus::Expired => {
                return Err(InviteError::InviteExpired {
                    expired_at: invite.expires_at,
                });
            }
            InviteStatus::Pending if invite.is_past_expiry(now) => {
                bounded(
                    self.store_timeout,
                    self.invites.mark_expired(invite_id),
                )
                .await?;
                debug!(
                    invite = %invite_id,
                    "invite expired on acceptance attempt"
                );
                return Err(InviteError::InviteExpired {
                    expired_at: invite.expires_at,
                });
            }
            InviteStatus::Pending => {
                let updated = bounded(
                    self.store_timeout,
                    self.invites.mark_accepted(invite_id, now),
                )
                .await?;
                if updated.status != InviteStatus::Accepted {
                    return Err(InviteError::InviteExpired {
                        expired_at: updated.expires_at,
                    });
                }
                info!(
                    invite = %invite_id,
                    inviter = %updated.inviter_id,
                    "invite accepted"
                );
                updated
            }
        };

        let credit = self
            .ledger
            .credit(invite.inviter_id, invite.id, self.bonus_per_invite)
            .await
            .map_err(|err| match err {
                StoreError::NotFound { .. } => {
                    InviteError::InviterNotFound(invite.inviter_id)
                }
                other => InviteError::Store(other),
            })?;

        Ok(AcceptedInvite { invite, credit })
    }

    /// Accept the invite carrying `code` (case-insensitive).
    pub async fn accept_invite_by_code(
        &self,
        code: &str,
    ) -> Result<AcceptedInvite, InviteError> {
        let code = code.trim().to_ascii_uppercase();
        let invite =
            bounded(self.store_timeout, self.invites.find_by_code(&code))
                .await?
                .ok_or(InviteError::InviteNotFound)?;
        self.accept_invite(invite.id).await
    }

    /// Invites sent by `inviter_id`, newest first.
    pub async fn list_invites(
        &self,
        inviter_id: AccountId,
    ) -> Result<Vec<Invite>, InviteError> {
        let invites = bounded(
            self.store_timeout,
            self.invites.list_by_inviter(inviter_id),
        )
        .await?;
        Ok(invites)
    }

    /// Expire every pending invite past its expiry at `now`. No credit is
    /// granted for expired invites.
    pub async fn expire_stale_invites(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, InviteError> {
        let expired =
            bounded(self.store_timeout, self.invites.expire_pending(now))
                .await?;
        if expired > 0 {
            info!(expired, "stale invites expired");
        }
        Ok(expired)
    }
}

/// Human-friendly code drawn from an alphabet without look-alike glyphs.
fn random_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char
        })
        .collect()
}
