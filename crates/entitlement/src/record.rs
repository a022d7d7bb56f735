//! Stored entitlement records and their validated form.

use std::collections::BTreeSet;

use guildhall_primitives::{AppMode, Capability, TenantId};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::plan::{PlanCatalog, PlanTier};
use crate::{Result, SettingsError};

/// Billing state of a subscription. Displayed, never consulted for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
	Active,
	Trialing,
	PastDue,
	Canceled,
}

impl SubscriptionStatus {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Active => "active",
			Self::Trialing => "trialing",
			Self::PastDue => "past_due",
			Self::Canceled => "canceled",
		}
	}
}

/// Tenant settings as held by settings storage.
///
/// Nothing about a stored record is trusted: [`Entitlements`] is the only form
/// the gate answers questions from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRecord {
	pub tenant_id: TenantId,
	pub subscription_plan: String,
	pub subscription_status: SubscriptionStatus,
	#[serde(default)]
	pub access_permissions: BTreeSet<Capability>,
	pub allowed_modes: BTreeSet<AppMode>,
	/// Last persisted active mode.
	#[serde(default)]
	pub active_mode: Option<AppMode>,
}

impl EntitlementRecord {
	/// An active subscription on `plan` with no modes or permissions yet.
	pub fn new(tenant_id: impl Into<TenantId>, plan: impl Into<String>) -> Self {
		Self {
			tenant_id: tenant_id.into(),
			subscription_plan: plan.into(),
			subscription_status: SubscriptionStatus::Active,
			access_permissions: BTreeSet::new(),
			allowed_modes: BTreeSet::new(),
			active_mode: None,
		}
	}

	#[must_use]
	pub fn with_modes(mut self, modes: impl IntoIterator<Item = AppMode>) -> Self {
		self.allowed_modes = modes.into_iter().collect();
		self
	}

	#[must_use]
	pub fn with_permissions<I, T>(mut self, tags: I) -> Self
	where
		I: IntoIterator<Item = T>,
		T: Into<Capability>,
	{
		self.access_permissions = tags.into_iter().map(Into::into).collect();
		self
	}

	#[must_use]
	pub fn with_active_mode(mut self, mode: AppMode) -> Self {
		self.active_mode = Some(mode);
		self
	}

	#[must_use]
	pub fn with_status(mut self, status: SubscriptionStatus) -> Self {
		self.subscription_status = status;
		self
	}
}

/// A validated entitlement record.
///
/// Invariants, established by [`Entitlements::validate`] and preserved by the
/// gate: `allowed_modes` is non-empty and a subset of the plan's modes, and
/// `active_mode` is a member of `allowed_modes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entitlements {
	tenant_id: TenantId,
	plan: PlanTier,
	status: SubscriptionStatus,
	permissions: BTreeSet<Capability>,
	allowed_modes: BTreeSet<AppMode>,
	active_mode: AppMode,
}

impl Entitlements {
	/// Validates `record` for `tenant` against the catalog.
	///
	/// Modes the plan does not entitle are dropped. `preferred` wins as the
	/// active mode when still allowed, then the record's stored mode, then the
	/// plan default, then the first allowed mode.
	pub(crate) fn validate(record: &EntitlementRecord, catalog: &PlanCatalog, tenant: &TenantId, preferred: Option<AppMode>) -> Result<Self> {
		if &record.tenant_id != tenant {
			return Err(SettingsError::Malformed(format!(
				"record for tenant {} returned for tenant {tenant}",
				record.tenant_id
			)));
		}

		let plan = catalog
			.get(&record.subscription_plan)
			.ok_or_else(|| SettingsError::UnknownPlan(record.subscription_plan.clone()))?;

		let allowed_modes: BTreeSet<AppMode> = record.allowed_modes.iter().copied().filter(|mode| plan.entitles(*mode)).collect();
		if allowed_modes.len() != record.allowed_modes.len() {
			let dropped: Vec<_> = record.allowed_modes.difference(&allowed_modes).map(|m| m.as_str()).collect();
			warn!(tenant = %tenant, plan = %plan.id, ?dropped, "entitlement.modes_clamped");
		}

		let active_mode = [preferred, record.active_mode, Some(plan.default_mode)]
			.into_iter()
			.flatten()
			.find(|mode| allowed_modes.contains(mode))
			.or_else(|| allowed_modes.first().copied())
			.ok_or_else(|| SettingsError::NoAllowedModes { plan: plan.id.clone() })?;

		Ok(Self {
			tenant_id: tenant.clone(),
			plan: plan.clone(),
			status: record.subscription_status,
			permissions: record.access_permissions.clone(),
			allowed_modes,
			active_mode,
		})
	}

	pub fn tenant_id(&self) -> &TenantId {
		&self.tenant_id
	}

	pub fn plan(&self) -> &PlanTier {
		&self.plan
	}

	pub fn status(&self) -> SubscriptionStatus {
		self.status
	}

	pub fn permissions(&self) -> &BTreeSet<Capability> {
		&self.permissions
	}

	pub fn allowed_modes(&self) -> &BTreeSet<AppMode> {
		&self.allowed_modes
	}

	pub fn active_mode(&self) -> AppMode {
		self.active_mode
	}

	pub fn allows(&self, mode: AppMode) -> bool {
		self.allowed_modes.contains(&mode)
	}

	pub fn has_capability(&self, tag: &str) -> bool {
		self.permissions.contains(tag)
	}

	/// Only callable after [`Self::allows`] returned true for `mode`.
	pub(crate) fn set_active_mode(&mut self, mode: AppMode) {
		debug_assert!(self.allows(mode), "active mode must stay within allowed modes");
		self.active_mode = mode;
	}
}
