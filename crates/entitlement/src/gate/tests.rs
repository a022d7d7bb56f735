use pretty_assertions::assert_eq;

use super::*;
use crate::record::SubscriptionStatus;
use crate::store::MemorySettingsStore;

fn gate_with(records: impl IntoIterator<Item = EntitlementRecord>) -> (EntitlementGate, Arc<MemorySettingsStore>) {
	let store = Arc::new(MemorySettingsStore::new());
	for record in records {
		store.insert(record);
	}
	let gate = EntitlementGate::new(store.clone(), Arc::new(PlanCatalog::default()));
	(gate, store)
}

fn basic(tenant: &str) -> EntitlementRecord {
	EntitlementRecord::new(tenant, "basic")
		.with_modes([AppMode::Crm])
		.with_permissions(["contacts"])
}

fn enterprise(tenant: &str) -> EntitlementRecord {
	EntitlementRecord::new(tenant, "enterprise")
		.with_modes([AppMode::Crm, AppMode::Trade])
		.with_active_mode(AppMode::Crm)
		.with_permissions(["marketing", "detailed_stats"])
}

#[test]
fn uninitialized_gate_denies_everything() {
	let (gate, _) = gate_with([]);
	assert_eq!(gate.state(), &GateState::Uninitialized);
	for mode in AppMode::ALL {
		assert!(!gate.can_switch_to_mode(mode));
	}
	assert!(!gate.has_capability("contacts"));
	assert_eq!(gate.active_mode(), None);
}

#[tokio::test]
async fn basic_plan_refuses_trade_mode() {
	let (mut gate, store) = gate_with([basic("t1")]);
	gate.load(TenantId::new("t1")).await.unwrap();

	let err = gate.request_mode_switch(AppMode::Trade).await.unwrap_err();
	assert_eq!(
		err,
		ModeSwitchError::NotEntitled {
			target: AppMode::Trade,
			required_plan: "Enterprise".into(),
		}
	);
	assert_eq!(err.to_string(), "trade mode requires the Enterprise plan");
	assert_eq!(gate.active_mode(), Some(AppMode::Crm));
	assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn enterprise_switch_is_persisted_across_reload() {
	let (mut gate, store) = gate_with([enterprise("t1")]);
	gate.load(TenantId::new("t1")).await.unwrap();
	assert_eq!(gate.active_mode(), Some(AppMode::Crm));

	let switched = gate.request_mode_switch(AppMode::Trade).await.unwrap();
	assert_eq!(
		switched,
		ModeSwitched {
			previous: AppMode::Crm,
			mode: AppMode::Trade,
			persisted: true,
		}
	);
	assert_eq!(gate.active_mode(), Some(AppMode::Trade));
	assert_eq!(store.save_count(), 1);

	let mut fresh = EntitlementGate::new(store.clone(), Arc::new(PlanCatalog::default()));
	fresh.load(TenantId::new("t1")).await.unwrap();
	assert_eq!(fresh.active_mode(), Some(AppMode::Trade));
}

#[tokio::test]
async fn load_failure_fails_closed_for_previously_granted_capabilities() {
	let (mut gate, store) = gate_with([enterprise("t1")]);
	gate.load(TenantId::new("t1")).await.unwrap();
	assert!(gate.has_capability("marketing"));
	assert!(gate.can_switch_to_mode(AppMode::Trade));

	store.set_unreachable(true);
	let err = gate.reload().await.unwrap_err();
	assert!(matches!(err, SettingsError::Unreachable(_)));
	assert!(matches!(gate.state(), GateState::Error(_)));

	assert!(!gate.has_capability("marketing"));
	for mode in AppMode::ALL {
		assert!(!gate.can_switch_to_mode(mode));
	}
	assert_eq!(gate.request_mode_switch(AppMode::Crm).await, Err(ModeSwitchError::GateUnavailable));
	assert!(gate.snapshot().is_error());
	assert!(!gate.snapshot().has_capability("marketing"));
}

#[tokio::test]
async fn missing_tenant_settings_enter_error_state() {
	let (mut gate, _) = gate_with([]);
	let err = gate.load(TenantId::new("ghost")).await.unwrap_err();
	assert_eq!(err, SettingsError::NotFound(TenantId::new("ghost")));
	assert_eq!(gate.tenant(), Some(&TenantId::new("ghost")));
	assert!(matches!(gate.state(), GateState::Error(_)));
}

#[tokio::test]
async fn failed_persist_keeps_switch_but_reports_it() {
	let (mut gate, store) = gate_with([enterprise("t1")]);
	gate.load(TenantId::new("t1")).await.unwrap();
	store.set_fail_saves(true);

	let switched = gate.request_mode_switch(AppMode::Trade).await.unwrap();
	assert!(!switched.persisted);
	assert_eq!(gate.active_mode(), Some(AppMode::Trade));
	assert_eq!(store.record(&TenantId::new("t1")).and_then(|r| r.active_mode), Some(AppMode::Crm));
}

#[tokio::test]
async fn subscribers_observe_mode_switches() {
	let (mut gate, _) = gate_with([enterprise("t1")]);
	let mut rx = gate.subscribe();
	assert_eq!(*rx.borrow_and_update(), GateSnapshot::Uninitialized);

	gate.load(TenantId::new("t1")).await.unwrap();
	assert!(rx.has_changed().unwrap());
	assert_eq!(rx.borrow_and_update().active_mode(), Some(AppMode::Crm));

	gate.request_mode_switch(AppMode::Trade).await.unwrap();
	assert_eq!(rx.borrow_and_update().active_mode(), Some(AppMode::Trade));

	gate.reset();
	assert_eq!(*rx.borrow_and_update(), GateSnapshot::Uninitialized);
}

#[tokio::test]
async fn plan_downgrade_moves_active_mode_back_into_allowed_set() {
	let (mut gate, _) = gate_with([enterprise("t1")]);
	gate.load(TenantId::new("t1")).await.unwrap();
	gate.request_mode_switch(AppMode::Trade).await.unwrap();

	gate.apply_settings(basic("t1").with_status(SubscriptionStatus::PastDue)).unwrap();
	assert_eq!(gate.active_mode(), Some(AppMode::Crm));
	assert!(!gate.can_switch_to_mode(AppMode::Trade));
	assert!(!gate.has_capability("marketing"));
	assert_eq!(gate.snapshot().entitlements().map(|e| e.status()), Some(SubscriptionStatus::PastDue));
}

#[tokio::test]
async fn plan_change_keeps_active_mode_when_still_allowed() {
	let (mut gate, _) = gate_with([enterprise("t1")]);
	gate.load(TenantId::new("t1")).await.unwrap();
	gate.request_mode_switch(AppMode::Trade).await.unwrap();

	let updated = enterprise("t1").with_permissions(["marketing"]);
	gate.apply_settings(updated).unwrap();
	assert_eq!(gate.active_mode(), Some(AppMode::Trade));
	assert!(!gate.has_capability("detailed_stats"));
}

#[tokio::test]
async fn malformed_update_fails_closed() {
	let (mut gate, _) = gate_with([enterprise("t1")]);
	gate.load(TenantId::new("t1")).await.unwrap();

	let err = gate.apply_settings(EntitlementRecord::new("t1", "platinum").with_modes([AppMode::Crm])).unwrap_err();
	assert_eq!(err, SettingsError::UnknownPlan("platinum".into()));
	assert!(!gate.can_switch_to_mode(AppMode::Crm));
	assert!(!gate.has_capability("marketing"));
}

#[tokio::test]
async fn switching_to_current_mode_skips_the_store() {
	let (mut gate, store) = gate_with([basic("t1")]);
	gate.load(TenantId::new("t1")).await.unwrap();
	let switched = gate.request_mode_switch(AppMode::Crm).await.unwrap();
	assert_eq!(switched.previous, AppMode::Crm);
	assert_eq!(switched.mode, AppMode::Crm);
	assert_eq!(store.save_count(), 0);
}

#[test]
fn required_plan_lookup_uses_catalog_display_names() {
	let (gate, _) = gate_with([]);
	assert_eq!(gate.required_plan_for(AppMode::Trade), Some("Enterprise"));
	assert_eq!(gate.required_plan_for(AppMode::Crm), Some("Basic"));
}

#[test]
fn settings_update_without_a_tenant_is_refused() {
	let (mut gate, _) = gate_with([]);
	assert_eq!(gate.apply_settings(enterprise("t1")), Err(SettingsError::NoTenant));
	assert_eq!(gate.state(), &GateState::Uninitialized);
	assert!(!gate.has_capability("marketing"));
	assert_eq!(gate.snapshot(), GateSnapshot::Uninitialized);
}

#[tokio::test]
async fn reset_gate_cannot_be_reauthorized_by_a_stale_update() {
	let (mut gate, _) = gate_with([enterprise("t1")]);
	gate.load(TenantId::new("t1")).await.unwrap();
	gate.reset();

	assert_eq!(gate.apply_settings(enterprise("t1")), Err(SettingsError::NoTenant));
	assert_eq!(gate.state(), &GateState::Uninitialized);
	assert_eq!(gate.tenant(), None);
	assert!(!gate.has_capability("marketing"));
	for mode in AppMode::ALL {
		assert!(!gate.can_switch_to_mode(mode));
	}
	assert_eq!(gate.reload().await, Err(SettingsError::NoTenant));
}
