//! The entitlement gate state machine.

use std::sync::Arc;

use guildhall_primitives::{AppMode, TenantId};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::plan::PlanCatalog;
use crate::record::{EntitlementRecord, Entitlements};
use crate::store::SettingsStore;
use crate::{ModeSwitchError, SettingsError};

/// Gate lifecycle state.
///
/// Only [`GateState::Loaded`] carries permission data. The other variants
/// have nothing to answer a permission question from, so every check in them
/// is `false` by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
	Uninitialized,
	Loaded(Entitlements),
	Error(SettingsError),
}

/// Read-only view of the gate published to every consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateSnapshot {
	Uninitialized,
	Loaded(Entitlements),
	Error { reason: String },
}

impl GateSnapshot {
	fn of(state: &GateState) -> Self {
		match state {
			GateState::Uninitialized => Self::Uninitialized,
			GateState::Loaded(ent) => Self::Loaded(ent.clone()),
			GateState::Error(err) => Self::Error { reason: err.to_string() },
		}
	}

	pub fn entitlements(&self) -> Option<&Entitlements> {
		match self {
			Self::Loaded(ent) => Some(ent),
			_ => None,
		}
	}

	pub fn active_mode(&self) -> Option<AppMode> {
		self.entitlements().map(Entitlements::active_mode)
	}

	pub fn can_switch_to_mode(&self, mode: AppMode) -> bool {
		self.entitlements().is_some_and(|ent| ent.allows(mode))
	}

	pub fn has_capability(&self, tag: &str) -> bool {
		self.entitlements().is_some_and(|ent| ent.has_capability(tag))
	}

	pub fn is_error(&self) -> bool {
		matches!(self, Self::Error { .. })
	}
}

/// Outcome of an accepted mode switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSwitched {
	pub previous: AppMode,
	pub mode: AppMode,
	/// False when the switch applied but settings storage rejected the write;
	/// a reload will then restore the previously stored mode.
	pub persisted: bool,
}

/// Single source of truth for what the current tenant may do.
///
/// Mutation goes through `&mut self`, so only the owner of the gate (the
/// session context) can load settings or switch modes. Everyone else observes
/// through [`EntitlementGate::subscribe`].
pub struct EntitlementGate {
	store: Arc<dyn SettingsStore>,
	catalog: Arc<PlanCatalog>,
	tenant: Option<TenantId>,
	state: GateState,
	snapshot: watch::Sender<GateSnapshot>,
}

impl EntitlementGate {
	pub fn new(store: Arc<dyn SettingsStore>, catalog: Arc<PlanCatalog>) -> Self {
		let (snapshot, _) = watch::channel(GateSnapshot::Uninitialized);
		Self {
			store,
			catalog,
			tenant: None,
			state: GateState::Uninitialized,
			snapshot,
		}
	}

	pub fn state(&self) -> &GateState {
		&self.state
	}

	/// Tenant of the last load attempt, successful or not.
	pub fn tenant(&self) -> Option<&TenantId> {
		self.tenant.as_ref()
	}

	pub fn catalog(&self) -> &PlanCatalog {
		&self.catalog
	}

	/// Subscribes to gate snapshots. The receiver starts at the current state.
	pub fn subscribe(&self) -> watch::Receiver<GateSnapshot> {
		self.snapshot.subscribe()
	}

	pub fn snapshot(&self) -> GateSnapshot {
		GateSnapshot::of(&self.state)
	}

	fn entitlements(&self) -> Option<&Entitlements> {
		match &self.state {
			GateState::Loaded(ent) => Some(ent),
			GateState::Uninitialized | GateState::Error(_) => None,
		}
	}

	pub fn active_mode(&self) -> Option<AppMode> {
		self.entitlements().map(Entitlements::active_mode)
	}

	/// True iff `mode` is allowed by the current entitlement record.
	pub fn can_switch_to_mode(&self, mode: AppMode) -> bool {
		self.entitlements().is_some_and(|ent| ent.allows(mode))
	}

	/// True iff `tag` is among the tenant's access permissions.
	pub fn has_capability(&self, tag: &str) -> bool {
		self.entitlements().is_some_and(|ent| ent.has_capability(tag))
	}

	/// Display name of the lowest plan tier entitling `mode`.
	pub fn required_plan_for(&self, mode: AppMode) -> Option<&str> {
		self.catalog.required_plan_for(mode).map(|tier| tier.display.as_str())
	}

	/// Loads entitlements for `tenant` from settings storage.
	///
	/// On failure the gate enters [`GateState::Error`] and every check fails
	/// closed; entitlements from an earlier load are discarded.
	pub async fn load(&mut self, tenant: TenantId) -> Result<(), SettingsError> {
		self.tenant = Some(tenant.clone());
		let result = match self.store.load_settings(&tenant).await {
			Ok(record) => Entitlements::validate(&record, &self.catalog, &tenant, None),
			Err(err) => Err(err),
		};
		self.settle(&tenant, result)
	}

	/// Re-runs [`Self::load`] for the tenant already held.
	pub async fn reload(&mut self) -> Result<(), SettingsError> {
		match self.tenant.clone() {
			Some(tenant) => self.load(tenant).await,
			None => Err(SettingsError::NoTenant),
		}
	}

	/// Replaces entitlements after an explicit settings update (e.g. a plan change).
	///
	/// The record is validated exactly like a load. The current active mode is
	/// kept when the new record still allows it. Only the tenant of the last
	/// load can be updated; without one the gate stays as it is.
	pub fn apply_settings(&mut self, record: EntitlementRecord) -> Result<(), SettingsError> {
		let Some(tenant) = self.tenant.clone() else {
			warn!(tenant = %record.tenant_id, "entitlement.apply_settings.no_tenant");
			return Err(SettingsError::NoTenant);
		};
		let preferred = self.active_mode();
		let result = Entitlements::validate(&record, &self.catalog, &tenant, preferred);
		self.settle(&tenant, result)
	}

	fn settle(&mut self, tenant: &TenantId, result: Result<Entitlements, SettingsError>) -> Result<(), SettingsError> {
		let outcome = match result {
			Ok(ent) => {
				info!(
					tenant = %tenant,
					plan = %ent.plan().id,
					status = ent.status().as_str(),
					active_mode = %ent.active_mode(),
					"entitlement.loaded"
				);
				self.state = GateState::Loaded(ent);
				Ok(())
			}
			Err(err) => {
				warn!(tenant = %tenant, error = %err, "entitlement.load_failed");
				self.state = GateState::Error(err.clone());
				Err(err)
			}
		};
		self.publish();
		outcome
	}

	/// Switches the active mode if the plan allows it and persists the choice.
	///
	/// A refused switch leaves the active mode untouched. An accepted switch is
	/// applied and published before the write, so a failed write degrades to
	/// `persisted: false` rather than undoing the switch.
	pub async fn request_mode_switch(&mut self, target: AppMode) -> Result<ModeSwitched, ModeSwitchError> {
		let GateState::Loaded(ent) = &mut self.state else {
			debug!(target_mode = %target, "entitlement.mode_switch.unavailable");
			return Err(ModeSwitchError::GateUnavailable);
		};

		if !ent.allows(target) {
			let required_plan = self
				.catalog
				.required_plan_for(target)
				.map(|tier| tier.display.clone())
				.unwrap_or_else(|| "higher".to_string());
			debug!(tenant = %ent.tenant_id(), target_mode = %target, %required_plan, "entitlement.mode_switch.denied");
			return Err(ModeSwitchError::NotEntitled { target, required_plan });
		}

		let previous = ent.active_mode();
		if previous == target {
			return Ok(ModeSwitched {
				previous,
				mode: target,
				persisted: true,
			});
		}
		ent.set_active_mode(target);
		let tenant = ent.tenant_id().clone();
		self.publish();

		let persisted = match self.store.save_active_mode(&tenant, target).await {
			Ok(()) => true,
			Err(err) => {
				warn!(tenant = %tenant, mode = %target, error = %err, "entitlement.mode_switch.persist_failed");
				false
			}
		};
		info!(tenant = %tenant, from = %previous, to = %target, persisted, "entitlement.mode_switch");
		Ok(ModeSwitched {
			previous,
			mode: target,
			persisted,
		})
	}

	/// Discards all entitlement state, e.g. on sign-out.
	pub fn reset(&mut self) {
		self.tenant = None;
		self.state = GateState::Uninitialized;
		self.publish();
	}

	fn publish(&self) {
		self.snapshot.send_replace(GateSnapshot::of(&self.state));
	}
}

#[cfg(test)]
mod tests;
