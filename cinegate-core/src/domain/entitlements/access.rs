use std::{any::type_name_of_val, fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use cinegate_model::{
    AccessDecision, AccountId, Capabilities, ConsumptionSource, DailyAllowance,
    DenyReason, Plan, ViewerAccount, WatchRequest,
};
use tracing::{debug, trace, warn};

use crate::{
    clock::Clock,
    database::ports::AccountStore,
    domain::entitlements::{
        bonus,
        counter::{self, DayBoundary},
        registry::PlanRegistry,
    },
    error::bounded,
    settings::{DEFAULT_CONFLICT_RETRIES, DEFAULT_STORE_TIMEOUT, EngineSettings},
};

/// What the quota gate did to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaOutcome {
    /// The plan is unbounded; nothing was counted.
    Unmetered,
    /// One view was charged to `source`; `remaining` metered views are left.
    Consumed {
        source: ConsumptionSource,
        remaining: u32,
    },
    /// Bonus and daily allowance are both spent.
    Exhausted,
}

/// Result of running the quota gate against one account record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStep {
    pub outcome: QuotaOutcome,
    /// The record changed and must be written back.
    pub dirty: bool,
}

/// Quota gate: reset if a new day started, then charge bonus before the
/// daily allowance.
///
/// Capabilities are resolved from `account` as it is passed in, so when this
/// runs inside the store's atomic update it sees the current plan, not the
/// caller's snapshot.
pub fn evaluate_quota(
    registry: &PlanRegistry,
    boundary: &DayBoundary,
    account: &mut ViewerAccount,
    now: DateTime<Utc>,
) -> QuotaStep {
    let plan = account.effective_plan(now);
    let DailyAllowance::Limited(limit) = registry.allowance_for(plan) else {
        return QuotaStep {
            outcome: QuotaOutcome::Unmetered,
            dirty: false,
        };
    };

    let reset = counter::reset_if_due(boundary, account, now);

    let source = if bonus::consume_one(account) {
        ConsumptionSource::Bonus
    } else if account.daily_views_consumed < limit {
        counter::consume_one(account);
        ConsumptionSource::Daily
    } else {
        return QuotaStep {
            outcome: QuotaOutcome::Exhausted,
            dirty: reset,
        };
    };

    let remaining = limit
        .saturating_sub(account.daily_views_consumed)
        .saturating_add(account.bonus_views_available);
    QuotaStep {
        outcome: QuotaOutcome::Consumed { source, remaining },
        dirty: true,
    }
}

/// Entry point for watch requests.
///
/// Gates run in a fixed order and the first failure short-circuits:
/// adult content, resolution ceiling, then quota. Only the quota gate
/// touches storage, through a single atomic update per decision.
pub struct AccessEngine<A>
where
    A: AccountStore + ?Sized,
{
    store: Arc<A>,
    registry: Arc<PlanRegistry>,
    clock: Arc<dyn Clock>,
    boundary: DayBoundary,
    store_timeout: Duration,
    conflict_retries: u32,
}

impl<A> Clone for AccessEngine<A>
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
            conflict_retries: self.conflict_retries,
        }
    }
}

impl<A> fmt::Debug for AccessEngine<A>
where
    A: AccountStore + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessEngine")
            .field("store", &type_name_of_val(self.store.as_ref()))
            .field("registry", &self.registry)
            .field("boundary", &self.boundary)
            .field("store_timeout", &self.store_timeout)
            .field("conflict_retries", &self.conflict_retries)
            .finish()
    }
}

impl<A> AccessEngine<A>
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
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
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
            .with_conflict_retries(settings.conflict_retries)
    }

    pub fn with_boundary(mut self, boundary: DayBoundary) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    pub fn registry(&self) -> &PlanRegistry {
        &self.registry
    }

    pub fn boundary(&self) -> &DayBoundary {
        &self.boundary
    }

    /// Decide a watch request using the configured store timeout.
    pub async fn decide(&self, request: &WatchRequest) -> AccessDecision {
        self.decide_with_timeout(request, self.store_timeout).await
    }

    /// Decide a watch request, bounding each store call by `store_timeout`.
    ///
    /// Never fails: store errors and timeouts come back as a denial with
    /// [`DenyReason::TransientStoreError`].
    pub async fn decide_with_timeout(
        &self,
        request: &WatchRequest,
        store_timeout: Duration,
    ) -> AccessDecision {
        let now = self.clock.now();
        let plan = request
            .viewer
            .as_ref()
            .map_or(Plan::Guest, |viewer| viewer.effective_plan(now));
        let capabilities = self.registry.capabilities_for(plan);

        if let Some(denied) = self.adult_gate(request, plan, &capabilities) {
            return denied;
        }
        if let Some(denied) = self.resolution_gate(request, plan, &capabilities)
        {
            return denied;
        }

        // The stored record decides metering, even when the snapshot's plan
        // is unbounded: it may have been demoted since.
        match &request.viewer {
            None => self.guest_quota(&capabilities, now),
            Some(viewer) => {
                self.metered_quota(viewer.id, now, store_timeout).await
            }
        }
    }

    fn adult_gate(
        &self,
        request: &WatchRequest,
        plan: Plan,
        capabilities: &Capabilities,
    ) -> Option<AccessDecision> {
        if !request.asset.is_adult_only {
            return None;
        }
        match &request.viewer {
            None => {
                debug!(
                    asset = %request.asset.id,
                    "adult asset requested anonymously"
                );
                Some(AccessDecision::deny(DenyReason::AdultContentRequiresAuth))
            }
            Some(_) if !capabilities.adult_access => {
                debug!(
                    asset = %request.asset.id,
                    %plan,
                    "plan forbids adult content"
                );
                Some(AccessDecision::upgrade_required(
                    DenyReason::PlanForbidsAdultContent,
                    self.registry.minimum_plan_for_adult(),
                ))
            }
            Some(_) => None,
        }
    }

    fn resolution_gate(
        &self,
        request: &WatchRequest,
        plan: Plan,
        capabilities: &Capabilities,
    ) -> Option<AccessDecision> {
        let requested = request.requested_resolution;
        if capabilities.permits_resolution(requested) {
            return None;
        }
        debug!(
            %plan,
            requested = %requested,
            ceiling = %capabilities.max_resolution,
            "resolution above plan ceiling"
        );
        Some(AccessDecision::upgrade_required(
            DenyReason::ResolutionRequiresUpgrade,
            self.registry.minimum_plan_for_resolution(requested),
        ))
    }

    /// Anonymous viewers have no record to meter against: a zero allowance
    /// denies, anything else lets the view through uncounted. The config
    /// loader only admits zero or unbounded.
    fn guest_quota(
        &self,
        capabilities: &Capabilities,
        now: DateTime<Utc>,
    ) -> AccessDecision {
        match capabilities.daily_allowance {
            DailyAllowance::Limited(0) => {
                debug!("guest allowance is zero");
                AccessDecision::quota_exceeded(self.boundary.next_reset_at(now))
            }
            DailyAllowance::Limited(_) | DailyAllowance::Unbounded => {
                AccessDecision::unmetered()
            }
        }
    }

    async fn metered_quota(
        &self,
        account_id: AccountId,
        now: DateTime<Utc>,
        store_timeout: Duration,
    ) -> AccessDecision {
        let registry = self.registry.as_ref();
        let boundary = &self.boundary;
        let mut attempt = 0;

        loop {
            let mut outcome = None;
            let result = bounded(
                store_timeout,
                self.store.atomic_update_account(account_id, &mut |account| {
                    let step = evaluate_quota(registry, boundary, account, now);
                    outcome = Some(step.outcome);
                    step.dirty
                }),
            )
            .await;

            match (result, outcome) {
                (Ok(_), Some(outcome)) => {
                    return self.render_quota(account_id, outcome, now);
                }
                (Ok(_), None) => {
                    warn!(
                        account = %account_id,
                        "store committed without evaluating quota; denying"
                    );
                    return AccessDecision::deny(
                        DenyReason::TransientStoreError,
                    );
                }
                (Err(err), _)
                    if err.is_conflict() && attempt < self.conflict_retries =>
                {
                    attempt += 1;
                    trace!(
                        account = %account_id,
                        attempt,
                        "quota update conflicted; retrying"
                    );
                }
                (Err(err), _) => {
                    warn!(
                        account = %account_id,
                        error = %err,
                        "quota update failed; denying"
                    );
                    return AccessDecision::deny(
                        DenyReason::TransientStoreError,
                    );
                }
            }
        }
    }

    fn render_quota(
        &self,
        account_id: AccountId,
        outcome: QuotaOutcome,
        now: DateTime<Utc>,
    ) -> AccessDecision {
        match outcome {
            QuotaOutcome::Unmetered => AccessDecision::unmetered(),
            QuotaOutcome::Consumed { source, remaining } => {
                debug!(
                    account = %account_id,
                    ?source,
                    remaining,
                    "view metered"
                );
                AccessDecision::consumed(source, remaining)
            }
            QuotaOutcome::Exhausted => {
                debug!(account = %account_id, "daily quota exhausted");
                AccessDecision::quota_exceeded(self.boundary.next_reset_at(now))
            }
        }
    }
}
