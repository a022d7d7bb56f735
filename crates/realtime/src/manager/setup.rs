use std::sync::Arc;
use std::time::Duration;

use guildhall_primitives::{Session, Topic};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::announce_presence;
use crate::subscriptions::SubscriptionSet;
use crate::toast::{Toast, ToastSink};
use crate::transport::{ChangeTransport, InboundMessage, InboundSink, ScopeFilter, SubscriptionRequest};

/// Subscription setup for one session generation.
pub(super) struct Setup {
	pub(super) session: Session,
	pub(super) generation: u64,
	pub(super) transport: Arc<dyn ChangeTransport>,
	pub(super) subscriptions: Arc<Mutex<SubscriptionSet>>,
	pub(super) toasts: Arc<dyn ToastSink>,
	pub(super) inbound: mpsc::Sender<InboundMessage>,
	pub(super) cancel: CancellationToken,
	pub(super) max_attempts: u32,
	pub(super) backoff: Duration,
}

impl Setup {
	/// Subscribes every topic concurrently and marks the session ready once
	/// every topic has resolved, open or failed.
	pub(super) async fn run(self, ready: watch::Sender<bool>) {
		let setup = Arc::new(self);
		let mut topics = JoinSet::new();
		for topic in Topic::ALL {
			topics.spawn(Arc::clone(&setup).subscribe(topic));
		}
		while let Some(joined) = topics.join_next().await {
			if let Err(err) = joined {
				error!(generation = setup.generation, error = %err, "realtime.subscribe.task_failed");
			}
		}

		if setup.cancel.is_cancelled() {
			return;
		}
		let open = setup.subscriptions.lock().open_count();
		info!(session = %setup.session, generation = setup.generation, open, "realtime.ready");
		ready.send_replace(true);
	}

	/// Subscribes one topic with bounded retries.
	///
	/// An in-flight subscribe is never abandoned: if teardown happened while it
	/// was pending, the resolved handle is unsubscribed here. The presence
	/// topic announces the session as soon as it opens, without waiting on
	/// the other topics.
	async fn subscribe(self: Arc<Self>, topic: Topic) {
		let filter = ScopeFilter::for_topic(topic, &self.session);
		for attempt in 1..=self.max_attempts {
			let closed = self.subscriptions.lock().is_closed();
			if closed {
				return;
			}

			let request = SubscriptionRequest {
				topic,
				filter: filter.clone(),
				generation: self.generation,
			};
			let sink = InboundSink::new(topic, self.generation, self.inbound.clone());
			match self.transport.subscribe(request, sink).await {
				Ok(handle) => {
					let registered = self.subscriptions.lock().register(handle);
					match registered {
						Ok(()) => {
							info!(topic = %topic, filter = %filter, attempt, handle = %handle, "realtime.subscribe");
							if topic == Topic::Presence && !self.cancel.is_cancelled() {
								announce_presence(&*self.transport, &self.session).await;
							}
						}
						Err(late) => {
							info!(topic = %topic, handle = %late, "realtime.subscribe.late_handle");
							if let Err(err) = self.transport.unsubscribe(late).await {
								warn!(topic = %topic, handle = %late, error = %err, "realtime.unsubscribe.failed");
							}
						}
					}
					return;
				}
				Err(err) => {
					warn!(topic = %topic, attempt, max_attempts = self.max_attempts, error = %err, "realtime.subscribe.failed");
					if attempt == self.max_attempts {
						break;
					}
					tokio::select! {
						biased;
						_ = self.cancel.cancelled() => return,
						_ = tokio::time::sleep(self.backoff) => {}
					}
				}
			}
		}

		self.subscriptions.lock().mark_failed(topic);
		warn!(topic = %topic, attempts = self.max_attempts, "realtime.subscribe.degraded");
		if self.cancel.is_cancelled() {
			return;
		}
		if let Err(err) = self.toasts.show(Toast::warning(format!("Live updates for {topic} are unavailable"))) {
			warn!(topic = %topic, error = %err, "realtime.toast.failed");
		}
	}
}
