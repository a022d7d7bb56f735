use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use guildhall_config::Config;
use guildhall_context::{ContextDeps, SessionContext};
use guildhall_entitlement::{GateState, MemorySettingsStore};
use guildhall_primitives::{AppMode, Session, Topic};
use guildhall_realtime::{MemoryTransport, RecordingCache, RecordingToasts, Toast, TopicStatus};
use tracing::{debug, info, warn};

use crate::script::Step;

/// Time given to the dispatcher to drain after each step.
const SETTLE: Duration = Duration::from_millis(5);

/// Drives a [`SessionContext`] over in-memory collaborators.
pub struct Runner {
	settings: Arc<MemorySettingsStore>,
	transport: Arc<MemoryTransport>,
	cache: Arc<RecordingCache>,
	toasts: Arc<RecordingToasts>,
	context: SessionContext,
	outcomes: Vec<String>,
}

/// What a replay left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
	pub outcomes: Vec<String>,
	pub toasts: Vec<Toast>,
	pub stale: Vec<String>,
	pub topics: Vec<(Topic, TopicStatus)>,
	pub mode: Option<AppMode>,
}

impl Runner {
	pub fn new(config: &Config) -> Self {
		let settings = Arc::new(MemorySettingsStore::new());
		let transport = Arc::new(MemoryTransport::new());
		let cache = Arc::new(RecordingCache::new());
		let toasts = Arc::new(RecordingToasts::new());
		let deps = ContextDeps {
			settings: settings.clone(),
			transport: transport.clone(),
			cache: cache.clone(),
			toasts: toasts.clone(),
		};
		Self {
			settings,
			transport,
			cache,
			toasts,
			context: SessionContext::new(deps, config),
			outcomes: Vec::new(),
		}
	}

	/// Replays `steps`, then ends whatever session is still running.
	///
	/// The report is taken before the final teardown so it shows the state
	/// the script left the session in.
	pub async fn run(&mut self, steps: &[Step]) -> anyhow::Result<Report> {
		for (index, step) in steps.iter().enumerate() {
			debug!(step = index + 1, kind = step.kind(), "sim.step");
			self.apply(step).await?;
			tokio::time::sleep(SETTLE).await;
		}
		let report = self.report();
		self.context.end().await;
		info!(steps = steps.len(), toasts = report.toasts.len(), stale = report.stale.len(), "sim.done");
		Ok(report)
	}

	async fn apply(&mut self, step: &Step) -> anyhow::Result<()> {
		match step {
			Step::Seed(record) => self.settings.insert(record.clone()),
			Step::SignIn { tenant, user } => {
				self.context.start(Session::new(tenant.clone(), user.clone())).await?;
				self.context.ready().await;
				if matches!(self.context.gate().state(), GateState::Error(_)) {
					self.outcomes.push(format!("signed in {user}@{tenant} without entitlements"));
				} else {
					self.outcomes.push(format!("signed in {user}@{tenant}"));
				}
			}
			Step::SignOut => {
				self.context.end().await;
				self.outcomes.push("signed out".into());
			}
			Step::Publish { topic, payload } => {
				if self.transport.publish(*topic, payload.clone()).await == 0 {
					warn!(topic = %topic, "sim.publish.undelivered");
				}
			}
			Step::Presence { message } => {
				if self.transport.publish_presence(message.clone()).await == 0 {
					warn!("sim.presence.undelivered");
				}
			}
			Step::SwitchMode { mode } => match self.context.request_mode_switch(*mode).await {
				Ok(switched) if switched.persisted => self.outcomes.push(format!("switched {} -> {}", switched.previous, switched.mode)),
				Ok(switched) => self.outcomes.push(format!("switched {} -> {} (not persisted)", switched.previous, switched.mode)),
				Err(err) => self.outcomes.push(format!("switch to {mode} refused: {err}")),
			},
			Step::Reload => {
				if let Err(err) = self.context.reload_settings().await {
					self.outcomes.push(format!("reload failed: {err}"));
				}
			}
			Step::Refetch { key } => {
				if !self.cache.refetch(key) {
					debug!(partition = %key, "sim.refetch.fresh");
				}
			}
			Step::Reconnect => {
				let epoch = self.transport.reconnect();
				self.outcomes.push(format!("reconnected (epoch {epoch})"));
			}
			Step::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
		}
		Ok(())
	}

	pub fn report(&self) -> Report {
		Report {
			outcomes: self.outcomes.clone(),
			toasts: self.toasts.shown(),
			stale: self.cache.stale_keys(),
			topics: self.context.sync().status(),
			mode: self.context.gate().active_mode(),
		}
	}
}

impl fmt::Display for Report {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for outcome in &self.outcomes {
			writeln!(f, "- {outcome}")?;
		}
		writeln!(f, "toasts:")?;
		for toast in &self.toasts {
			writeln!(f, "  [{:?}] {}", toast.level, toast.message)?;
		}
		writeln!(f, "stale partitions:")?;
		for key in &self.stale {
			writeln!(f, "  {key}")?;
		}
		writeln!(f, "topics:")?;
		for (topic, status) in &self.topics {
			writeln!(f, "  {topic}: {status:?}")?;
		}
		match self.mode {
			Some(mode) => write!(f, "mode: {mode}"),
			None => write!(f, "mode: none"),
		}
	}
}
