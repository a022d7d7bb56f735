//! Realtime sync manager and change dispatcher.
//!
//! # Purpose
//!
//! - Keep the cached read model fresh for one session by turning change-stream events into
//!   partition invalidations.
//! - Own the lifecycle of the session's topic subscriptions, from concurrent setup to exactly-once teardown.
//!
//! # Mental model
//!
//! - [`RealtimeSyncManager::start`] assigns a new session generation, spawns the dispatcher and
//!   spawns one setup task that subscribes every topic in [`Topic::ALL`] concurrently.
//! - Every subscription gets an [`crate::InboundSink`] stamped with its topic and generation. All sinks
//!   feed one bounded channel owned by the manager for its whole lifetime.
//! - The dispatcher consumes that channel sequentially, drops messages from other generations and
//!   applies [`crate::routes::partitions_for`]. It never patches cache contents.
//! - [`RealtimeSyncManager::teardown`] closes the generation's subscription set, unsubscribes
//!   every handle drained from it and joins the dispatcher, recovering the channel receiver for
//!   the next session.
//!
//! # Key types
//!
//! | Type | Meaning | Constraints | Constructed / mutated in |
//! |---|---|---|---|
//! | [`RealtimeSyncManager`] | Per-context sync root | At most one running session | [`RealtimeSyncManager::start`], [`RealtimeSyncManager::teardown`] |
//! | `SubscriptionSet` | Handles and [`TopicStatus`] of one generation | Handles leave the set exactly once | `Setup::subscribe`, [`RealtimeSyncManager::teardown`] |
//! | [`InboundMessage`] | Payload tagged with topic and generation | Generation is fixed by the sink | [`crate::InboundSink`] |
//! | `Dispatcher` | Sequential event pump | Must not block on the cache or toast sink | `Dispatcher::run` |
//!
//! # Invariants
//!
//! - Must unsubscribe every opened handle exactly once.
//! - A handle resolved after teardown must be unsubscribed as soon as it resolves.
//! - Must drop inbound messages whose generation is not the current session's.
//! - Must invalidate exactly the partitions the route table names for a topic.
//! - A toast failure must not prevent invalidation.
//! - A topic whose subscription keeps failing degrades alone.
//! - A transport reconnect must invalidate every session partition and re-announce presence.
//!
//! # Lifecycle
//!
//! - Start: generation bump, dispatcher spawn, concurrent subscribe with bounded retries, one
//!   presence announcement as soon as the presence topic opens.
//! - Running: dispatcher applies changes, presence updates, transport status changes and the
//!   periodic presence refresh.
//! - Teardown: cancel token fires (stops retries, backoff sleeps and the dispatcher), handles are
//!   drained and unsubscribed, dispatcher joined. Setup tasks are not awaited; a subscribe still in
//!   flight closes its own handle once it resolves. [`RealtimeSyncManager::drain_setups`] waits
//!   for those.
//! - Drop without teardown: handles are unsubscribed best-effort on a spawned task; await
//!   [`RealtimeSyncManager::teardown`] instead wherever possible.
//!
//! # Failure modes and recovery
//!
//! - Subscribe refused: Recovery: retried after a fixed backoff; the topic is marked
//!   [`TopicStatus::Failed`] and a warning toast is raised after the configured number of attempts.
//! - Unsupported payload shape: logged at `warn` and ignored.
//! - Transport dropped and resumed: every partition is invalidated so missed changes are refetched.

mod dispatch;
pub(crate) mod invariants;
mod setup;
#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use guildhall_config::RealtimeConfig;
use guildhall_primitives::{Session, Topic, UserId};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use self::dispatch::Dispatcher;
use self::setup::Setup;
use crate::cache::QueryCache;
use crate::error::StartError;
use crate::event::PresenceMeta;
use crate::presence::PresenceRoster;
use crate::subscriptions::{SubscriptionSet, TopicStatus};
use crate::toast::ToastSink;
use crate::transport::{ChangeTransport, InboundMessage};

struct ActiveSession {
	session: Session,
	generation: u64,
	cancel: CancellationToken,
	ready: watch::Receiver<bool>,
	dispatcher: JoinHandle<mpsc::Receiver<InboundMessage>>,
}

/// Subscribes a session to the change stream and reconciles events into the cache.
pub struct RealtimeSyncManager {
	transport: Arc<dyn ChangeTransport>,
	cache: Arc<dyn QueryCache>,
	toasts: Arc<dyn ToastSink>,
	config: RealtimeConfig,
	generation: u64,
	inbound_tx: mpsc::Sender<InboundMessage>,
	inbound_rx: Option<mpsc::Receiver<InboundMessage>>,
	subscriptions: Option<Arc<Mutex<SubscriptionSet>>>,
	roster: Arc<Mutex<PresenceRoster>>,
	active: Option<ActiveSession>,
	setups: JoinSet<()>,
}

impl RealtimeSyncManager {
	pub fn new(transport: Arc<dyn ChangeTransport>, cache: Arc<dyn QueryCache>, toasts: Arc<dyn ToastSink>, config: RealtimeConfig) -> Self {
		let (inbound_tx, inbound_rx) = mpsc::channel(config.channel_capacity.max(1));
		Self {
			transport,
			cache,
			toasts,
			config,
			generation: 0,
			inbound_tx,
			inbound_rx: Some(inbound_rx),
			subscriptions: None,
			roster: Arc::new(Mutex::new(PresenceRoster::default())),
			active: None,
			setups: JoinSet::new(),
		}
	}

	/// Starts syncing `session`. Returns once the work is spawned; use
	/// [`Self::ready`] to wait for subscription setup to resolve.
	///
	/// Must be called from within a Tokio runtime.
	pub fn start(&mut self, session: Session) -> Result<(), StartError> {
		if tokio::runtime::Handle::try_current().is_err() {
			return Err(StartError::NoRuntime);
		}
		if self.active.is_some() {
			return Err(StartError::AlreadyRunning);
		}
		let Some(inbound_rx) = self.inbound_rx.take() else {
			return Err(StartError::AlreadyRunning);
		};
		while self.setups.try_join_next().is_some() {}

		self.generation += 1;
		let generation = self.generation;
		let subscriptions = Arc::new(Mutex::new(SubscriptionSet::new(generation)));
		let cancel = CancellationToken::new();
		let (ready_tx, ready) = watch::channel(false);

		let dispatcher = Dispatcher::new(
			session.clone(),
			generation,
			self.transport.clone(),
			self.cache.clone(),
			self.toasts.clone(),
			self.roster.clone(),
			self.config.toast_dedup_window,
		);
		tracing::trace!(task = "dispatcher", generation, "realtime.spawn");
		let dispatcher = tokio::spawn(dispatcher.run(inbound_rx, self.transport.status(), self.config.presence_refresh(), cancel.clone()));

		let setup = Setup {
			session: session.clone(),
			generation,
			transport: self.transport.clone(),
			subscriptions: subscriptions.clone(),
			toasts: self.toasts.clone(),
			inbound: self.inbound_tx.clone(),
			cancel: cancel.clone(),
			max_attempts: self.config.subscribe_max_attempts.max(1),
			backoff: self.config.subscribe_backoff(),
		};
		tracing::trace!(task = "setup", generation, pending = self.setups.len(), "realtime.spawn");
		self.setups.spawn(setup.run(ready_tx));

		info!(session = %session, generation, "realtime.start");
		self.subscriptions = Some(subscriptions);
		self.active = Some(ActiveSession {
			session,
			generation,
			cancel,
			ready,
			dispatcher,
		});
		Ok(())
	}

	/// Waits until subscription setup for the running session has resolved,
	/// successfully or not. Returns immediately when nothing is running.
	pub async fn ready(&self) {
		let Some(mut ready) = self.active.as_ref().map(|active| active.ready.clone()) else {
			return;
		};
		let _ = ready.wait_for(|done| *done).await;
	}

	/// Stops syncing. Idempotent: a second call is a no-op.
	pub async fn teardown(&mut self) {
		let Some(active) = self.active.take() else {
			debug!("realtime.teardown.idle");
			return;
		};
		active.cancel.cancel();

		let handles = match &self.subscriptions {
			Some(set) => set.lock().close(),
			None => Vec::new(),
		};
		let mut closed = 0usize;
		for handle in handles {
			match self.transport.unsubscribe(handle).await {
				Ok(()) => closed += 1,
				Err(err) => warn!(handle = %handle, error = %err, "realtime.unsubscribe.failed"),
			}
		}

		match active.dispatcher.await {
			Ok(inbound_rx) => self.inbound_rx = Some(inbound_rx),
			Err(err) => {
				error!(generation = active.generation, error = %err, "realtime.dispatcher.join_failed");
				let (inbound_tx, inbound_rx) = mpsc::channel(self.config.channel_capacity.max(1));
				self.inbound_tx = inbound_tx;
				self.inbound_rx = Some(inbound_rx);
			}
		}
		self.roster.lock().clear();

		info!(session = %active.session, generation = active.generation, closed, "realtime.teardown");
	}

	/// Waits for every setup task, including those of torn-down sessions, to finish.
	pub async fn drain_setups(&mut self) {
		while let Some(joined) = self.setups.join_next().await {
			if let Err(err) = joined {
				error!(error = %err, "realtime.setup.join_failed");
			}
		}
	}

	pub fn is_running(&self) -> bool {
		self.active.is_some()
	}

	pub fn session(&self) -> Option<&Session> {
		self.active.as_ref().map(|active| &active.session)
	}

	/// Generation of the running session, or of the last one when idle.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Status of `topic` for the current or most recent session.
	pub fn topic_status(&self, topic: Topic) -> Option<TopicStatus> {
		self.subscriptions.as_ref().map(|set| set.lock().status(topic))
	}

	pub fn status(&self) -> Vec<(Topic, TopicStatus)> {
		self.subscriptions.as_ref().map(|set| set.lock().statuses()).unwrap_or_default()
	}

	pub fn online_users(&self) -> Vec<UserId> {
		self.roster.lock().users()
	}

	pub fn roster(&self) -> PresenceRoster {
		self.roster.lock().clone()
	}
}

/// Dropping a running manager is a fallback for a missed [`RealtimeSyncManager::teardown`].
/// Open handles are unsubscribed on a spawned task when a runtime is available;
/// subscribes still in flight are aborted with the setup tasks.
impl Drop for RealtimeSyncManager {
	fn drop(&mut self) {
		let Some(active) = self.active.take() else {
			return;
		};
		active.cancel.cancel();
		let handles = self.subscriptions.as_ref().map(|set| set.lock().close()).unwrap_or_default();
		warn!(
			session = %active.session,
			generation = active.generation,
			open = handles.len(),
			"realtime.dropped_without_teardown"
		);
		if handles.is_empty() {
			return;
		}
		let Ok(runtime) = tokio::runtime::Handle::try_current() else {
			error!(session = %active.session, leaked = handles.len(), "realtime.drop.handles_leaked");
			return;
		};
		let transport = self.transport.clone();
		runtime.spawn(async move {
			for handle in handles {
				if let Err(err) = transport.unsubscribe(handle).await {
					warn!(handle = %handle, error = %err, "realtime.unsubscribe.failed");
				}
			}
		});
	}
}

async fn announce_presence(transport: &dyn ChangeTransport, session: &Session) {
	let meta = PresenceMeta::now(session.user_id.clone());
	match transport.announce_presence(&session.tenant_id, meta).await {
		Ok(()) => debug!(session = %session, "realtime.presence.announce"),
		Err(err) => warn!(session = %session, error = %err, "realtime.presence.announce_failed"),
	}
}
