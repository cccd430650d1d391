//! Property-based tests for day boundaries and the quota gate
//!
//! - A reset happens at most once per calendar day and never on a
//!   regressing clock
//! - `next_reset_at` is the first instant of the following day
//! - A metered account admits exactly `allowance + bonus` views per day
//! - Every plan's resolution list is the ordered prefix up to its ceiling

use chrono::{DateTime, FixedOffset, TimeDelta, TimeZone, Utc};
use cinegate_core::domain::entitlements::{
    DayBoundary, PlanRegistry, QuotaOutcome, counter, evaluate_quota,
};
use cinegate_model::{ConsumptionSource, Plan, ResolutionTier, ViewerAccount};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Instants between 2000 and 2100, to the second.
fn arb_instant() -> impl Strategy<Value = DateTime<Utc>> {
    (946_684_800i64..4_102_444_800i64)
        .prop_map(|secs| Utc.timestamp_opt(secs, 0).single().unwrap())
}

/// Reference offsets in quarter-hour steps, UTC-12:00 to UTC+14:00.
fn arb_boundary() -> impl Strategy<Value = DayBoundary> {
    (-48i32..=56).prop_map(|quarters| {
        DayBoundary::new(FixedOffset::east_opt(quarters * 15 * 60).unwrap())
    })
}

fn arb_resolution() -> impl Strategy<Value = ResolutionTier> {
    prop::sample::select(ResolutionTier::ALL.to_vec())
}

fn free_account(last_reset_at: DateTime<Utc>, bonus: u32) -> ViewerAccount {
    let mut account =
        ViewerAccount::register("prop@example.com", last_reset_at);
    account.plan = Plan::Free;
    account.bonus_views_available = bonus;
    account
}

// ============================================================================
// Day boundary
// ============================================================================

proptest! {
    #[test]
    fn same_instant_never_resets(
        boundary in arb_boundary(),
        now in arb_instant(),
    ) {
        prop_assert!(!boundary.should_reset(now, now));
    }

    #[test]
    fn next_reset_is_start_of_following_day(
        boundary in arb_boundary(),
        now in arb_instant(),
    ) {
        let next = boundary.next_reset_at(now);
        prop_assert!(next > now);
        prop_assert!(next - now <= TimeDelta::days(1));
        prop_assert_eq!(
            boundary.calendar_day(next),
            boundary.calendar_day(now).succ_opt().unwrap()
        );
        prop_assert_eq!(
            boundary.calendar_day(next - TimeDelta::seconds(1)),
            boundary.calendar_day(now)
        );
    }

    #[test]
    fn reset_applies_once(
        boundary in arb_boundary(),
        last in arb_instant(),
        gap_secs in 0i64..(3 * 86_400),
        consumed in 0u32..10,
    ) {
        let now = last + TimeDelta::seconds(gap_secs);
        let mut account = free_account(last, 0);
        account.daily_views_consumed = consumed;

        let first = counter::reset_if_due(&boundary, &mut account, now);
        prop_assert_eq!(first, boundary.should_reset(last, now));
        if first {
            prop_assert_eq!(account.daily_views_consumed, 0);
            prop_assert_eq!(account.last_reset_at, now);
        } else {
            prop_assert_eq!(account.daily_views_consumed, consumed);
        }

        account.daily_views_consumed = 3;
        prop_assert!(!counter::reset_if_due(&boundary, &mut account, now));
        prop_assert_eq!(account.daily_views_consumed, 3);
    }

    #[test]
    fn regressing_clock_never_resets(
        boundary in arb_boundary(),
        last in arb_instant(),
        back_secs in 1i64..(3 * 86_400),
    ) {
        let mut account = free_account(last, 0);
        account.daily_views_consumed = 4;

        let earlier = last - TimeDelta::seconds(back_secs);
        prop_assert!(!counter::reset_if_due(&boundary, &mut account, earlier));
        prop_assert_eq!(account.daily_views_consumed, 4);
        prop_assert_eq!(account.last_reset_at, last);
    }
}

// ============================================================================
// Quota gate
// ============================================================================

proptest! {
    #[test]
    fn free_day_admits_allowance_plus_bonus(
        boundary in arb_boundary(),
        start in arb_instant(),
        bonus in 0u32..8,
        requests in 1usize..24,
    ) {
        let registry = PlanRegistry::default();
        let mut account = free_account(start, bonus);
        let capacity = 5 + bonus as usize;

        let mut admitted = 0usize;
        let mut last_remaining = None;
        for _ in 0..requests {
            let step =
                evaluate_quota(&registry, &boundary, &mut account, start);
            match step.outcome {
                QuotaOutcome::Consumed { source, remaining } => {
                    // Bonus is spent before the daily allowance.
                    if admitted < bonus as usize {
                        prop_assert_eq!(source, ConsumptionSource::Bonus);
                    } else {
                        prop_assert_eq!(source, ConsumptionSource::Daily);
                    }
                    admitted += 1;
                    prop_assert_eq!(remaining as usize, capacity - admitted);
                    last_remaining = Some(remaining);
                }
                QuotaOutcome::Exhausted => {}
                QuotaOutcome::Unmetered => {
                    prop_assert!(false, "free plan is metered")
                }
            }
        }

        prop_assert_eq!(admitted, requests.min(capacity));
        prop_assert!(account.daily_views_consumed <= 5);
        if admitted == capacity {
            prop_assert_eq!(last_remaining, Some(0));
        }
    }

    #[test]
    fn premium_is_never_counted(now in arb_instant(), consumed in 0u32..50) {
        let registry = PlanRegistry::default();
        let mut account = free_account(now, 0);
        account.plan = Plan::Premium;
        account.premium_until = Some(now + TimeDelta::days(30));
        account.daily_views_consumed = consumed;

        let boundary = DayBoundary::utc();
        let step = evaluate_quota(&registry, &boundary, &mut account, now);
        prop_assert_eq!(step.outcome, QuotaOutcome::Unmetered);
        prop_assert!(!step.dirty);
        prop_assert_eq!(account.daily_views_consumed, consumed);
    }
}

// ============================================================================
// Plan registry
// ============================================================================

proptest! {
    #[test]
    fn resolutions_are_an_ordered_prefix(
        plan in prop::sample::select(Plan::ALL.to_vec()),
    ) {
        let registry = PlanRegistry::default();
        let ceiling = registry.capabilities_for(plan).max_resolution;
        let available = registry.available_resolutions(plan);

        prop_assert_eq!(available.last().copied(), Some(ceiling));
        prop_assert!(available.windows(2).all(|pair| pair[0] < pair[1]));
        prop_assert_eq!(available.first().copied(), Some(ResolutionTier::P360));
    }

    #[test]
    fn minimum_plan_is_cheapest_that_permits(requested in arb_resolution()) {
        let registry = PlanRegistry::default();
        let minimum = registry.minimum_plan_for_resolution(requested);

        for plan in [Plan::Free, Plan::Premium] {
            let permits =
                registry.capabilities_for(plan).permits_resolution(requested);
            match minimum {
                Some(min) => prop_assert_eq!(permits, plan >= min),
                None => prop_assert!(!permits),
            }
        }
    }
}
