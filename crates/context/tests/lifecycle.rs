//! Session lifecycle through the context over the in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use guildhall_config::Config;
use guildhall_context::{ContextDeps, SessionContext, SessionProvider};
use guildhall_entitlement::{EntitlementRecord, GateState, MemorySettingsStore, ModeSwitchError, SettingsError};
use guildhall_primitives::{AppMode, Session, Topic};
use guildhall_realtime::{MemoryTransport, RecordingCache, RecordingToasts};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;

struct Fixture {
	settings: Arc<MemorySettingsStore>,
	transport: Arc<MemoryTransport>,
	cache: Arc<RecordingCache>,
	toasts: Arc<RecordingToasts>,
}

impl Fixture {
	fn new() -> Self {
		let settings = Arc::new(MemorySettingsStore::new());
		settings.insert(
			EntitlementRecord::new("acme", "enterprise")
				.with_modes([AppMode::Crm, AppMode::Trade])
				.with_permissions(["marketing"]),
		);
		settings.insert(EntitlementRecord::new("globex", "basic").with_modes([AppMode::Crm]));
		Self {
			settings,
			transport: Arc::new(MemoryTransport::new()),
			cache: Arc::new(RecordingCache::new()),
			toasts: Arc::new(RecordingToasts::new()),
		}
	}

	fn context(&self) -> SessionContext {
		let deps = ContextDeps {
			settings: self.settings.clone(),
			transport: self.transport.clone(),
			cache: self.cache.clone(),
			toasts: self.toasts.clone(),
		};
		let mut config = Config::default();
		config.realtime.subscribe_backoff_ms = 1;
		config.realtime.presence_refresh_secs = 0;
		SessionContext::new(deps, &config)
	}
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) {
	for _ in 0..3000 {
		if condition() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(1)).await;
	}
	panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn construction_starts_nothing() {
	let fx = Fixture::new();
	let ctx = fx.context();
	assert_eq!(ctx.gate().state(), &GateState::Uninitialized);
	assert!(!ctx.sync().is_running());
	assert_eq!(fx.transport.open_count(), 0);
}

#[tokio::test]
async fn start_loads_entitlements_and_subscribes() {
	let fx = Fixture::new();
	let mut ctx = fx.context();
	ctx.start(Session::new("acme", "u-1")).await.unwrap();
	ctx.ready().await;

	assert!(ctx.gate().has_capability("marketing"));
	assert_eq!(ctx.gate().active_mode(), Some(AppMode::Crm));
	assert_eq!(fx.transport.open_count(), 6);

	fx.transport.publish(Topic::Events, json!({"eventType": "INSERT", "new": {"id": "ev-1"}})).await;
	wait_until("toast", || !fx.toasts.messages().is_empty()).await;
	assert!(fx.cache.is_stale("events:acme"));

	ctx.end().await;
}

#[tokio::test]
async fn mode_switch_goes_through_the_context() {
	let fx = Fixture::new();
	let mut ctx = fx.context();
	let mut snapshots = ctx.subscribe_gate();
	ctx.start(Session::new("acme", "u-1")).await.unwrap();

	let switched = ctx.request_mode_switch(AppMode::Trade).await.unwrap();
	assert!(switched.persisted);
	assert_eq!(snapshots.borrow_and_update().active_mode(), Some(AppMode::Trade));
	ctx.end().await;

	ctx.start(Session::new("globex", "u-2")).await.unwrap();
	let err = ctx.request_mode_switch(AppMode::Trade).await.unwrap_err();
	assert!(matches!(err, ModeSwitchError::NotEntitled { .. }));
	ctx.end().await;
}

#[tokio::test]
async fn tenant_change_ends_the_previous_session_first() {
	let fx = Fixture::new();
	let mut ctx = fx.context();
	ctx.start(Session::new("acme", "u-1")).await.unwrap();
	ctx.ready().await;

	ctx.start(Session::new("globex", "u-1")).await.unwrap();
	ctx.ready().await;

	assert_eq!(fx.transport.unsubscribed().len(), 6);
	assert_eq!(fx.transport.open_count(), 6);
	assert_eq!(ctx.gate().tenant().map(|t| t.as_str()), Some("globex"));
	assert!(!ctx.gate().has_capability("marketing"));
	ctx.end().await;
}

#[tokio::test]
async fn settings_failure_fails_closed_but_keeps_syncing() {
	let fx = Fixture::new();
	fx.settings.set_unreachable(true);
	let mut ctx = fx.context();
	ctx.start(Session::new("acme", "u-1")).await.unwrap();
	ctx.ready().await;

	assert!(matches!(ctx.gate().state(), GateState::Error(_)));
	assert!(!ctx.gate().has_capability("marketing"));
	assert!(!ctx.gate().can_switch_to_mode(AppMode::Crm));
	assert_eq!(fx.transport.open_count(), 6);

	fx.settings.set_unreachable(false);
	ctx.reload_settings().await.unwrap();
	assert!(ctx.gate().has_capability("marketing"));
	ctx.end().await;
}

#[tokio::test]
async fn end_is_idempotent() {
	let fx = Fixture::new();
	let mut ctx = fx.context();
	ctx.start(Session::new("acme", "u-1")).await.unwrap();
	ctx.ready().await;

	ctx.end().await;
	ctx.end().await;
	assert_eq!(fx.transport.unsubscribed().len(), 6);
	assert_eq!(fx.transport.rejected_unsubscribes(), 0);
	assert!(ctx.session().is_none());
	assert_eq!(ctx.gate().state(), &GateState::Uninitialized);
}

#[tokio::test]
async fn settings_update_after_sign_out_grants_nothing() {
	let fx = Fixture::new();
	let mut ctx = fx.context();
	ctx.start(Session::new("acme", "u-1")).await.unwrap();
	ctx.ready().await;
	ctx.end().await;

	let update = EntitlementRecord::new("acme", "enterprise")
		.with_modes([AppMode::Crm, AppMode::Trade])
		.with_permissions(["marketing"]);
	assert_eq!(ctx.apply_settings(update), Err(SettingsError::NoTenant));
	assert!(ctx.session().is_none());
	assert_eq!(ctx.gate().state(), &GateState::Uninitialized);
	assert!(!ctx.gate().has_capability("marketing"));
	assert!(!ctx.gate().can_switch_to_mode(AppMode::Trade));
}

#[tokio::test]
async fn run_follows_the_session_provider() {
	let fx = Fixture::new();
	let mut ctx = fx.context();
	let provider = SessionProvider::new();
	let shutdown = CancellationToken::new();

	let sessions = provider.subscribe();
	let token = shutdown.clone();
	let task = tokio::spawn(async move {
		ctx.run(sessions, token).await.unwrap();
		ctx
	});

	provider.sign_in(Session::new("acme", "u-1"));
	wait_until("six open subscriptions", || fx.transport.open_count() == 6).await;

	provider.sign_out();
	wait_until("all subscriptions closed", || fx.transport.open_count() == 0).await;

	provider.sign_in(Session::new("globex", "u-3"));
	wait_until("resubscribed", || fx.transport.open_count() == 6).await;

	shutdown.cancel();
	let ctx = task.await.unwrap();
	assert!(ctx.session().is_none());
	assert_eq!(fx.transport.open_count(), 0);
	assert_eq!(fx.transport.rejected_unsubscribes(), 0);
}
