//! Subscription plan catalog.

use std::collections::{BTreeMap, BTreeSet};

use guildhall_config::{Config, PlanConfig};
use guildhall_primitives::AppMode;

/// One plan tier and the modes it entitles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanTier {
	pub id: String,
	pub display: String,
	pub rank: u32,
	pub modes: BTreeSet<AppMode>,
	pub default_mode: AppMode,
}

impl PlanTier {
	pub fn entitles(&self, mode: AppMode) -> bool {
		self.modes.contains(&mode)
	}
}

/// Plan id to tier mapping. Plan ids are matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanCatalog {
	tiers: BTreeMap<String, PlanTier>,
}

impl Default for PlanCatalog {
	fn default() -> Self {
		Self::from_config(&Config::default().plans)
	}
}

impl PlanCatalog {
	/// Builds a catalog from the `[plans]` configuration section.
	pub fn from_config(plans: &BTreeMap<String, PlanConfig>) -> Self {
		let tiers = plans
			.iter()
			.map(|(id, plan)| {
				let id = id.to_ascii_lowercase();
				let tier = PlanTier {
					id: id.clone(),
					display: plan.display.clone(),
					rank: plan.rank,
					modes: plan.modes.iter().copied().collect(),
					default_mode: plan.default_mode,
				};
				(id, tier)
			})
			.collect();
		Self { tiers }
	}

	pub fn get(&self, plan: &str) -> Option<&PlanTier> {
		self.tiers.get(&plan.trim().to_ascii_lowercase())
	}

	/// Lowest-ranked tier entitling `mode`; ties resolve by plan id.
	pub fn required_plan_for(&self, mode: AppMode) -> Option<&PlanTier> {
		self.tiers.values().filter(|tier| tier.entitles(mode)).min_by_key(|tier| tier.rank)
	}
}
