use cinegate_model::{Capabilities, DailyAllowance, Plan, ResolutionTier};
use thiserror::Error;

/// Defects in a plan policy table, detected when the table is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("no capabilities configured for plan {0}")]
    UnmappedPlan(Plan),
    #[error("plan {0} is configured more than once")]
    DuplicatePlan(Plan),
}

/// Total, immutable mapping from [`Plan`] to [`Capabilities`].
///
/// Built once at startup and shared read-only. Lookups cannot fail: the
/// table has one slot per plan and construction rejects missing entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRegistry {
    table: [Capabilities; 3],
}

impl Default for PlanRegistry {
    fn default() -> Self {
        Self {
            table: Plan::ALL.map(Capabilities::default_for),
        }
    }
}

impl PlanRegistry {
    /// Build from an explicit list; every plan must appear exactly once.
    pub fn from_entries<I>(entries: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (Plan, Capabilities)>,
    {
        let mut slots: [Option<Capabilities>; 3] = [None; 3];
        for (plan, capabilities) in entries {
            let slot = &mut slots[plan.index()];
            if slot.is_some() {
                return Err(ConfigurationError::DuplicatePlan(plan));
            }
            *slot = Some(capabilities);
        }

        let mut table = Plan::ALL.map(Capabilities::default_for);
        for plan in Plan::ALL {
            table[plan.index()] = slots[plan.index()]
                .ok_or(ConfigurationError::UnmappedPlan(plan))?;
        }
        Ok(Self { table })
    }

    /// Replace one plan's entry, keeping the others.
    pub fn with_override(
        mut self,
        plan: Plan,
        capabilities: Capabilities,
    ) -> Self {
        self.table[plan.index()] = capabilities;
        self
    }

    pub fn capabilities_for(&self, plan: Plan) -> Capabilities {
        self.table[plan.index()]
    }

    /// Every resolution tier up to and including the plan's ceiling.
    pub fn available_resolutions(&self, plan: Plan) -> Vec<ResolutionTier> {
        ResolutionTier::up_to(self.capabilities_for(plan).max_resolution)
    }

    /// Cheapest purchasable plan whose ceiling covers `requested`.
    ///
    /// Guest is never suggested: it is the absence of an account, not
    /// something a viewer can move to.
    pub fn minimum_plan_for_resolution(
        &self,
        requested: ResolutionTier,
    ) -> Option<Plan> {
        self.purchasable()
            .find(|(_, caps)| caps.permits_resolution(requested))
            .map(|(plan, _)| plan)
    }

    /// Cheapest purchasable plan that grants adult content.
    pub fn minimum_plan_for_adult(&self) -> Option<Plan> {
        self.purchasable()
            .find(|(_, caps)| caps.adult_access)
            .map(|(plan, _)| plan)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Plan, Capabilities)> + '_ {
        Plan::ALL
            .into_iter()
            .map(move |plan| (plan, self.capabilities_for(plan)))
    }

    fn purchasable(&self) -> impl Iterator<Item = (Plan, Capabilities)> + '_ {
        self.iter().filter(|(plan, _)| *plan != Plan::Guest)
    }

    /// Daily allowance of `plan`, shorthand for the quota gate.
    pub fn allowance_for(&self, plan: Plan) -> DailyAllowance {
        self.capabilities_for(plan).daily_allowance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_matches_policy() {
        let registry = PlanRegistry::default();

        let guest = registry.capabilities_for(Plan::Guest);
        assert_eq!(guest.max_resolution, ResolutionTier::P720);
        assert_eq!(guest.daily_allowance, DailyAllowance::Limited(0));
        assert!(!guest.adult_access);

        let free = registry.capabilities_for(Plan::Free);
        assert_eq!(free.max_resolution, ResolutionTier::P720);
        assert_eq!(free.daily_allowance, DailyAllowance::Limited(5));
        assert!(free.adult_access);

        let premium = registry.capabilities_for(Plan::Premium);
        assert_eq!(premium.max_resolution, ResolutionTier::P1080);
        assert!(premium.daily_allowance.is_unbounded());
        assert!(premium.adult_access);
    }

    #[test]
    fn lookup_is_total_and_deterministic() {
        let registry = PlanRegistry::default();
        for plan in Plan::ALL {
            assert_eq!(
                registry.capabilities_for(plan),
                registry.capabilities_for(plan)
            );
        }
        assert_eq!(registry.iter().count(), Plan::ALL.len());
    }

    #[test]
    fn missing_plan_fails_fast() {
        let err = PlanRegistry::from_entries([
            (Plan::Guest, Capabilities::default_for(Plan::Guest)),
            (Plan::Free, Capabilities::default_for(Plan::Free)),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigurationError::UnmappedPlan(Plan::Premium));
    }

    #[test]
    fn duplicate_plan_is_rejected() {
        let err = PlanRegistry::from_entries([
            (Plan::Free, Capabilities::default_for(Plan::Free)),
            (Plan::Free, Capabilities::default_for(Plan::Free)),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicatePlan(Plan::Free));
    }

    #[test]
    fn minimum_plan_skips_guest() {
        let registry = PlanRegistry::default();
        assert_eq!(
            registry.minimum_plan_for_resolution(ResolutionTier::P480),
            Some(Plan::Free)
        );
        assert_eq!(
            registry.minimum_plan_for_resolution(ResolutionTier::P1080),
            Some(Plan::Premium)
        );
        assert_eq!(registry.minimum_plan_for_adult(), Some(Plan::Free));

        let strict = registry.with_override(
            Plan::Free,
            Capabilities::new(
                ResolutionTier::P480,
                DailyAllowance::Limited(5),
                false,
            ),
        );
        assert_eq!(strict.minimum_plan_for_adult(), Some(Plan::Premium));
        assert_eq!(
            strict.minimum_plan_for_resolution(ResolutionTier::P720),
            Some(Plan::Premium)
        );
    }

    #[test]
    fn available_resolutions_follow_ceiling() {
        let registry = PlanRegistry::default();
        assert_eq!(
            registry.available_resolutions(Plan::Free),
            vec![
                ResolutionTier::P360,
                ResolutionTier::P480,
                ResolutionTier::P720
            ]
        );
        assert_eq!(registry.available_resolutions(Plan::Premium).len(), 4);
    }
}
