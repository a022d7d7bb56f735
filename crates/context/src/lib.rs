//! Session context for the guildhall client core.
//!
//! # Purpose
//!
//! - Wire the [`EntitlementGate`] and the [`RealtimeSyncManager`] to one authenticated session.
//! - Replace ambient shared state with a value the embedding layer constructs, owns and passes to
//!   its views.
//!
//! # Lifecycle
//!
//! - [`SessionContext::new`] only constructs; nothing loads or subscribes.
//! - [`SessionContext::start`] loads entitlements for the session's tenant and starts realtime sync.
//!   A different session already running is ended first.
//! - [`SessionContext::end`] tears realtime sync down and resets the gate. It is idempotent.
//! - [`SessionContext::run`] follows a [`SessionProvider`] and calls the two above on every
//!   sign-in, sign-out or tenant change.
//!
//! # Failure modes and recovery
//!
//! - Settings load fails on start: the session still starts, realtime sync runs, and the gate sits
//!   in its error state, denying every mode and capability. Recovery: [`SessionContext::reload_settings`].
//! - Realtime sync cannot start (no runtime): [`ContextError::Start`]; the gate is reset.

#![cfg_attr(test, allow(unused_crate_dependencies))]

mod error;
mod provider;

use std::sync::Arc;

pub use error::{ContextError, Result};
use guildhall_config::Config;
use guildhall_entitlement::{
	EntitlementGate, EntitlementRecord, GateSnapshot, ModeSwitchError, ModeSwitched, PlanCatalog, SettingsError, SettingsStore,
};
use guildhall_primitives::{AppMode, Session};
use guildhall_realtime::{ChangeTransport, QueryCache, RealtimeSyncManager, ToastSink};
pub use provider::SessionProvider;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// External collaborators the context is built over.
#[derive(Clone)]
pub struct ContextDeps {
	pub settings: Arc<dyn SettingsStore>,
	pub transport: Arc<dyn ChangeTransport>,
	pub cache: Arc<dyn QueryCache>,
	pub toasts: Arc<dyn ToastSink>,
}

/// Explicitly owned per-session state.
///
/// Await [`SessionContext::end`] before dropping a context with a running
/// session. Dropping it instead only closes subscriptions best-effort.
pub struct SessionContext {
	session: Option<Session>,
	gate: EntitlementGate,
	sync: RealtimeSyncManager,
}

impl SessionContext {
	pub fn new(deps: ContextDeps, config: &Config) -> Self {
		let catalog = Arc::new(PlanCatalog::from_config(&config.plans));
		Self {
			session: None,
			gate: EntitlementGate::new(deps.settings, catalog),
			sync: RealtimeSyncManager::new(deps.transport, deps.cache, deps.toasts, config.realtime.clone()),
		}
	}

	pub fn session(&self) -> Option<&Session> {
		self.session.as_ref()
	}

	/// Read access for views. Mutation goes through the context.
	pub fn gate(&self) -> &EntitlementGate {
		&self.gate
	}

	pub fn subscribe_gate(&self) -> watch::Receiver<GateSnapshot> {
		self.gate.subscribe()
	}

	pub fn sync(&self) -> &RealtimeSyncManager {
		&self.sync
	}

	/// Waits until realtime subscription setup has resolved.
	pub async fn ready(&self) {
		self.sync.ready().await;
	}

	/// Starts `session`. Starting the session already running is a no-op.
	pub async fn start(&mut self, session: Session) -> Result<()> {
		if self.session.as_ref() == Some(&session) {
			debug!(session = %session, "context.start.unchanged");
			return Ok(());
		}
		if let Some(previous) = &self.session {
			info!(from = %previous, to = %session, "context.session_changed");
			self.end().await;
		}

		if let Err(err) = self.gate.load(session.tenant_id.clone()).await {
			warn!(session = %session, error = %err, "context.start.entitlements_unavailable");
		}
		if let Err(err) = self.sync.start(session.clone()) {
			self.gate.reset();
			return Err(err.into());
		}
		info!(session = %session, mode = ?self.gate.active_mode(), "context.start");
		self.session = Some(session);
		Ok(())
	}

	/// Ends the current session. Idempotent.
	pub async fn end(&mut self) {
		self.sync.teardown().await;
		self.gate.reset();
		if let Some(session) = self.session.take() {
			info!(session = %session, "context.end");
		}
	}

	/// Switches the application mode for the current tenant.
	pub async fn request_mode_switch(&mut self, mode: AppMode) -> std::result::Result<ModeSwitched, ModeSwitchError> {
		self.gate.request_mode_switch(mode).await
	}

	/// Applies an explicit settings update, such as a plan change.
	pub fn apply_settings(&mut self, record: EntitlementRecord) -> std::result::Result<(), SettingsError> {
		self.gate.apply_settings(record)
	}

	/// Reloads entitlements for the current tenant.
	pub async fn reload_settings(&mut self) -> std::result::Result<(), SettingsError> {
		self.gate.reload().await
	}

	/// Follows `sessions` until the provider goes away or `shutdown` fires,
	/// then ends whatever session is running.
	pub async fn run(&mut self, mut sessions: watch::Receiver<Option<Session>>, shutdown: CancellationToken) -> Result<()> {
		let initial = sessions.borrow_and_update().clone();
		let outcome = self.follow(initial, &mut sessions, &shutdown).await;
		self.end().await;
		outcome
	}

	async fn follow(&mut self, initial: Option<Session>, sessions: &mut watch::Receiver<Option<Session>>, shutdown: &CancellationToken) -> Result<()> {
		self.apply(initial).await?;
		loop {
			tokio::select! {
				biased;
				_ = shutdown.cancelled() => {
					debug!("context.run.shutdown");
					return Ok(());
				}
				next = next_session(sessions) => match next {
					Some(next) => self.apply(next).await?,
					None => {
						debug!("context.run.provider_closed");
						return Ok(());
					}
				},
			}
		}
	}

	async fn apply(&mut self, session: Option<Session>) -> Result<()> {
		match session {
			Some(session) => self.start(session).await,
			None => {
				self.end().await;
				Ok(())
			}
		}
	}
}

async fn next_session(sessions: &mut watch::Receiver<Option<Session>>) -> Option<Option<Session>> {
	sessions.changed().await.ok()?;
	Some(sessions.borrow_and_update().clone())
}
