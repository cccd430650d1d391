use std::{any::type_name_of_val, fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use cinegate_model::{AccountId, Plan, PremiumTerm, ViewerAccount};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    clock::Clock,
    database::ports::AccountStore,
    domain::accounts::email::{InvalidEmail, normalize_email},
    error::{StoreError, bounded},
    settings::DEFAULT_STORE_TIMEOUT,
};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    InvalidEmail(#[from] InvalidEmail),
    #[error("email {email} is already registered")]
    EmailTaken { email: String },
    #[error("account {0} not found")]
    NotFound(AccountId),
    #[error(transparent)]
    Store(StoreError),
}

impl AccountError {
    fn from_store(id: AccountId, err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => AccountError::NotFound(id),
            other => AccountError::Store(other),
        }
    }
}

/// Later of `now` and a still-running Premium term, plus `term`.
pub fn extended_premium_until(
    account: &ViewerAccount,
    term: PremiumTerm,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let base = match (account.effective_plan(now), account.premium_until) {
        (Plan::Premium, Some(until)) => until.max(now),
        _ => now,
    };
    base + term.duration()
}

/// Registration and plan changes for viewer accounts.
pub struct PlanManager<A>
where
    A: AccountStore + ?Sized,
{
    store: Arc<A>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl<A> Clone for PlanManager<A>
where
    A: AccountStore + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            store_timeout: self.store_timeout,
        }
    }
}

impl<A> fmt::Debug for PlanManager<A>
where
    A: AccountStore + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanManager")
            .field("store", &type_name_of_val(self.store.as_ref()))
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

impl<A> PlanManager<A>
where
    A: AccountStore + ?Sized,
{
    pub fn new(store: Arc<A>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Create a Free account with zeroed counters.
    pub async fn register(
        &self,
        email: &str,
    ) -> Result<ViewerAccount, AccountError> {
        let email = normalize_email(email)?;
        let account = ViewerAccount::register(email.clone(), self.clock.now());

        let inserted =
            bounded(self.store_timeout, self.store.insert_account(account))
                .await;
        match inserted {
            Ok(account) => {
                info!(account = %account.id, "account registered");
                Ok(account)
            }
            Err(StoreError::Duplicate { .. }) => {
                Err(AccountError::EmailTaken { email })
            }
            Err(err) => Err(AccountError::Store(err)),
        }
    }

    pub async fn get(
        &self,
        account_id: AccountId,
    ) -> Result<ViewerAccount, AccountError> {
        bounded(self.store_timeout, self.store.get_account(account_id))
            .await
            .map_err(AccountError::Store)?
            .ok_or(AccountError::NotFound(account_id))
    }

    /// Move the account to Premium for `term`. A running term is extended
    /// rather than restarted; an open-ended Premium account is left as is.
    pub async fn upgrade(
        &self,
        account_id: AccountId,
        term: PremiumTerm,
    ) -> Result<ViewerAccount, AccountError> {
        let now = self.clock.now();
        let account = bounded(
            self.store_timeout,
            self.store.atomic_update_account(account_id, &mut |account| {
                if account.plan == Plan::Premium
                    && account.premium_until.is_none()
                {
                    return false;
                }
                account.premium_until =
                    Some(extended_premium_until(account, term, now));
                account.plan = Plan::Premium;
                true
            }),
        )
        .await
        .map_err(|err| AccountError::from_store(account_id, err))?;

        info!(
            account = %account_id,
            ?term,
            until = ?account.premium_until,
            "account upgraded to premium"
        );
        Ok(account)
    }

    /// Persist the demotion of a lapsed Premium account back to Free.
    pub async fn downgrade_expired(
        &self,
        account_id: AccountId,
    ) -> Result<ViewerAccount, AccountError> {
        let now = self.clock.now();
        let mut demoted = false;
        let account = bounded(
            self.store_timeout,
            self.store.atomic_update_account(account_id, &mut |account| {
                demoted = account.premium_lapsed(now);
                if demoted {
                    account.plan = Plan::Free;
                    account.premium_until = None;
                }
                demoted
            }),
        )
        .await
        .map_err(|err| AccountError::from_store(account_id, err))?;

        if demoted {
            debug!(account = %account_id, "lapsed premium demoted to free");
        }
        Ok(account)
    }
}
