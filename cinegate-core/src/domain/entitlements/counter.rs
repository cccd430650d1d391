use std::{any::type_name_of_val, fmt, sync::Arc, time::Duration};

use chrono::{
    DateTime, FixedOffset, NaiveDate, Offset, TimeDelta, TimeZone, Utc,
};
use cinegate_model::{AccountId, QuotaSnapshot, ViewerAccount};
use tracing::{debug, trace};

use crate::{
    clock::Clock,
    database::ports::AccountStore,
    domain::entitlements::registry::PlanRegistry,
    error::{StoreError, StoreResult, bounded},
    settings::{DEFAULT_STORE_TIMEOUT, EngineSettings},
};

/// Calendar day of `instant` as observed in `tz`.
pub fn calendar_day_in<Tz: TimeZone>(
    instant: DateTime<Utc>,
    tz: &Tz,
) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// First instant of the calendar day after `now`'s, in `tz`.
///
/// When local midnight does not exist (a DST gap), the first existing hour
/// of that day is used.
pub fn start_of_next_day_in<Tz: TimeZone>(
    now: DateTime<Utc>,
    tz: &Tz,
) -> DateTime<Utc> {
    let fallback = now + TimeDelta::days(1);
    let Some(tomorrow) = calendar_day_in(now, tz).succ_opt() else {
        return fallback;
    };

    for hour in 0..4 {
        let Some(local) = tomorrow.and_hms_opt(hour, 0, 0) else {
            continue;
        };
        if let Some(start) = tz.from_local_datetime(&local).earliest() {
            return start.with_timezone(&Utc);
        }
    }
    fallback
}

/// Day-boundary rule in a fixed reference timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundary {
    offset: FixedOffset,
}

impl Default for DayBoundary {
    fn default() -> Self {
        Self::utc()
    }
}

impl DayBoundary {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn calendar_day(&self, instant: DateTime<Utc>) -> NaiveDate {
        calendar_day_in(instant, &self.offset)
    }

    /// True iff `now` and `last_reset_at` fall on different calendar days.
    pub fn should_reset(
        &self,
        last_reset_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        self.calendar_day(now) != self.calendar_day(last_reset_at)
    }

    /// Start of the calendar day after `now`'s.
    pub fn next_reset_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        start_of_next_day_in(now, &self.offset)
    }
}

/// Zero the daily counter and stamp the reset time.
pub fn reset(account: &mut ViewerAccount, now: DateTime<Utc>) {
    account.daily_views_consumed = 0;
    account.last_reset_at = now;
}

/// Apply [`reset`] when `now` starts a new calendar day.
///
/// An instant earlier than `last_reset_at` never resets: a request carrying a
/// stale clock must not wipe views counted after a newer reset.
pub fn reset_if_due(
    boundary: &DayBoundary,
    account: &mut ViewerAccount,
    now: DateTime<Utc>,
) -> bool {
    if now < account.last_reset_at
        || !boundary.should_reset(account.last_reset_at, now)
    {
        return false;
    }
    reset(account, now);
    true
}

/// Record one daily view. Does not enforce the allowance.
pub fn consume_one(account: &mut ViewerAccount) {
    account.daily_views_consumed =
        account.daily_views_consumed.saturating_add(1);
}

/// Quota numbers for `account` as they would read at `now`, without
/// mutating anything.
pub fn snapshot(
    registry: &PlanRegistry,
    boundary: &DayBoundary,
    account: &ViewerAccount,
    now: DateTime<Utc>,
) -> QuotaSnapshot {
    let plan = account.effective_plan(now);
    let consumed = if now >= account.last_reset_at
        && boundary.should_reset(account.last_reset_at, now)
    {
        0
    } else {
        account.daily_views_consumed
    };

    let daily_remaining =
        registry.allowance_for(plan).remaining_after(consumed);
    let bonus_available = account.bonus_views_available;

    QuotaSnapshot {
        plan,
        daily_remaining,
        bonus_available,
        total_remaining: daily_remaining
            .map(|daily| daily.saturating_add(bonus_available)),
        resets_at: boundary.next_reset_at(now),
    }
}

/// Persists day-boundary resets and daily consumption through the account
/// store's atomic update.
pub struct DailyCounterManager<A>
where
    A: AccountStore + ?Sized,
{
    store: Arc<A>,
    registry: Arc<PlanRegistry>,
    clock: Arc<dyn Clock>,
    boundary: DayBoundary,
    store_timeout: Duration,
}

impl<A> Clone for DailyCounterManager<A>
where
    A: AccountStore + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            registry: self.registry.clone(),
            clock: self.clock.clone(),
            boundary: self.boundary,
            store_timeout: self.store_timeout,
        }
    }
}

impl<A> fmt::Debug for DailyCounterManager<A>
where
    A: AccountStore + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DailyCounterManager")
            .field("store", &type_name_of_val(self.store.as_ref()))
            .field("boundary", &self.boundary)
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

impl<A> DailyCounterManager<A>
where
    A: AccountStore + ?Sized,
{
    pub fn new(
        store: Arc<A>,
        registry: Arc<PlanRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
            boundary: DayBoundary::utc(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn from_settings(
        store: Arc<A>,
        registry: Arc<PlanRegistry>,
        clock: Arc<dyn Clock>,
        settings: &EngineSettings,
    ) -> Self {
        Self::new(store, registry, clock)
            .with_boundary(DayBoundary::new(settings.utc_offset))
            .with_store_timeout(settings.store_timeout)
    }

    pub fn with_boundary(mut self, boundary: DayBoundary) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn boundary(&self) -> &DayBoundary {
        &self.boundary
    }

    /// Apply a pending day-boundary reset (e.g. at login) and return the
    /// fresh record.
    pub async fn refresh(
        &self,
        account_id: AccountId,
    ) -> StoreResult<ViewerAccount> {
        let now = self.clock.now();
        let boundary = self.boundary;
        let mut did_reset = false;

        let account = bounded(
            self.store_timeout,
            self.store.atomic_update_account(account_id, &mut |account| {
                did_reset = reset_if_due(&boundary, account, now);
                did_reset
            }),
        )
        .await?;

        if did_reset {
            debug!(account = %account_id, "daily counter reset on refresh");
        }
        Ok(account)
    }

    /// Unconditionally zero the counter at the current instant.
    pub async fn reset(
        &self,
        account_id: AccountId,
    ) -> StoreResult<ViewerAccount> {
        let now = self.clock.now();
        let account = bounded(
            self.store_timeout,
            self.store.atomic_update_account(account_id, &mut |account| {
                reset(account, now);
                true
            }),
        )
        .await?;
        debug!(account = %account_id, "daily counter reset");
        Ok(account)
    }

    /// Record one daily view without checking the allowance.
    pub async fn consume_one(
        &self,
        account_id: AccountId,
    ) -> StoreResult<ViewerAccount> {
        let account = bounded(
            self.store_timeout,
            self.store.atomic_update_account(account_id, &mut |account| {
                consume_one(account);
                true
            }),
        )
        .await?;
        trace!(
            account = %account_id,
            consumed = account.daily_views_consumed,
            "daily view recorded"
        );
        Ok(account)
    }

    pub fn snapshot(&self, account: &ViewerAccount) -> QuotaSnapshot {
        snapshot(&self.registry, &self.boundary, account, self.clock.now())
    }

    /// Refresh the stored record, then report its quota.
    pub async fn quota(
        &self,
        account_id: AccountId,
    ) -> StoreResult<QuotaSnapshot> {
        let account = self.refresh(account_id).await?;
        Ok(self.snapshot(&account))
    }

    /// Read-only lookup with the store timeout applied.
    pub async fn load(
        &self,
        account_id: AccountId,
    ) -> StoreResult<ViewerAccount> {
        bounded(self.store_timeout, self.store.get_account(account_id))
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "account",
                id: account_id.to_string(),
            })
    }
}
