//! In-process change-stream transport.
//!
//! Delivers published payloads to matching open subscriptions and records
//! every call made against it. Failure injection and per-topic holds let tests
//! and the simulator reproduce slow or flaky subscription setup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use guildhall_primitives::{TenantId, Topic};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{Notify, watch};

use crate::error::TransportError;
use crate::event::{PresenceMessage, PresenceMeta};
use crate::transport::{ChangeTransport, InboundSink, ScopeFilter, SubscriptionHandle, SubscriptionRequest, TransportStatus};

#[derive(Debug)]
struct Subscriber {
	handle: SubscriptionHandle,
	request: SubscriptionRequest,
	sink: InboundSink,
	open: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
	next_id: u64,
	epoch: u64,
	subscribers: Vec<Subscriber>,
	failures: HashMap<Topic, u32>,
	attempts: HashMap<Topic, u32>,
	holds: HashMap<Topic, Arc<Notify>>,
	unsubscribed: Vec<SubscriptionHandle>,
	rejected_unsubscribes: usize,
	announcements: Vec<(TenantId, PresenceMeta)>,
}

#[derive(Debug)]
pub struct MemoryTransport {
	state: Mutex<MemoryState>,
	status: watch::Sender<TransportStatus>,
}

impl Default for MemoryTransport {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryTransport {
	/// A connected transport at epoch 0.
	pub fn new() -> Self {
		let (status, _) = watch::channel(TransportStatus::Connected { epoch: 0 });
		Self {
			state: Mutex::new(MemoryState::default()),
			status,
		}
	}

	/// Makes the next `times` subscribe attempts on `topic` fail.
	pub fn fail_subscribes(&self, topic: Topic, times: u32) {
		self.state.lock().failures.insert(topic, times);
	}

	/// Parks subscribe attempts on `topic` until [`Self::release`] is called.
	pub fn hold(&self, topic: Topic) {
		self.state.lock().holds.insert(topic, Arc::new(Notify::new()));
	}

	/// Lets a held subscribe on `topic` resolve.
	pub fn release(&self, topic: Topic) {
		if let Some(gate) = self.state.lock().holds.remove(&topic) {
			gate.notify_one();
		}
	}

	/// Delivers a raw change record to every open subscription on `topic`.
	/// Returns the number of subscriptions it was delivered to.
	pub async fn publish(&self, topic: Topic, payload: Value) -> usize {
		let sinks = self.sinks(|sub| sub.open && sub.request.topic == topic);
		let mut delivered = 0;
		for sink in sinks {
			if sink.send_change(payload.clone()).await.is_ok() {
				delivered += 1;
			}
		}
		delivered
	}

	/// Delivers a presence event to every open presence subscription.
	pub async fn publish_presence(&self, message: PresenceMessage) -> usize {
		let sinks = self.sinks(|sub| sub.open && sub.request.topic == Topic::Presence);
		let mut delivered = 0;
		for sink in sinks {
			if sink.send_presence(message.clone()).await.is_ok() {
				delivered += 1;
			}
		}
		delivered
	}

	/// Delivers through the already-closed subscriptions of `generation`, the
	/// way a backend flushes messages that were in flight at unsubscribe time.
	pub async fn publish_late(&self, generation: u64, topic: Topic, payload: Value) -> usize {
		let sinks = self.sinks(|sub| !sub.open && sub.request.generation == generation && sub.request.topic == topic);
		let mut delivered = 0;
		for sink in sinks {
			if sink.send_change(payload.clone()).await.is_ok() {
				delivered += 1;
			}
		}
		delivered
	}

	fn sinks(&self, filter: impl Fn(&Subscriber) -> bool) -> Vec<InboundSink> {
		self.state.lock().subscribers.iter().filter(|sub| filter(sub)).map(|sub| sub.sink.clone()).collect()
	}

	/// Drops the connection and re-establishes it under a new epoch.
	pub fn reconnect(&self) -> u64 {
		let epoch = {
			let mut state = self.state.lock();
			state.epoch += 1;
			state.epoch
		};
		self.status.send_replace(TransportStatus::Disconnected);
		self.status.send_replace(TransportStatus::Connected { epoch });
		epoch
	}

	pub fn disconnect(&self) {
		self.status.send_replace(TransportStatus::Disconnected);
	}

	pub fn open_count(&self) -> usize {
		self.state.lock().subscribers.iter().filter(|sub| sub.open).count()
	}

	pub fn open_topics(&self) -> Vec<Topic> {
		let mut topics: Vec<_> = self.state.lock().subscribers.iter().filter(|sub| sub.open).map(|sub| sub.request.topic).collect();
		topics.sort();
		topics
	}

	/// Filters of the open subscriptions on `topic`.
	pub fn filters(&self, topic: Topic) -> Vec<ScopeFilter> {
		self.state
			.lock()
			.subscribers
			.iter()
			.filter(|sub| sub.open && sub.request.topic == topic)
			.map(|sub| sub.request.filter.clone())
			.collect()
	}

	/// Handles successfully unsubscribed, in order.
	pub fn unsubscribed(&self) -> Vec<SubscriptionHandle> {
		self.state.lock().unsubscribed.clone()
	}

	pub fn unsubscribe_count(&self, topic: Topic) -> usize {
		self.state.lock().unsubscribed.iter().filter(|h| h.topic() == topic).count()
	}

	/// Unsubscribe calls for handles that were not open.
	pub fn rejected_unsubscribes(&self) -> usize {
		self.state.lock().rejected_unsubscribes
	}

	pub fn attempts(&self, topic: Topic) -> u32 {
		self.state.lock().attempts.get(&topic).copied().unwrap_or(0)
	}

	pub fn announcements(&self) -> Vec<(TenantId, PresenceMeta)> {
		self.state.lock().announcements.clone()
	}
}

#[async_trait]
impl ChangeTransport for MemoryTransport {
	async fn subscribe(&self, request: SubscriptionRequest, sink: InboundSink) -> Result<SubscriptionHandle, TransportError> {
		let gate = {
			let mut state = self.state.lock();
			*state.attempts.entry(request.topic).or_default() += 1;
			if let Some(remaining) = state.failures.get_mut(&request.topic)
				&& *remaining > 0
			{
				*remaining -= 1;
				return Err(TransportError::Unavailable(format!("subscribe to {} refused", request.topic)));
			}
			state.holds.get(&request.topic).cloned()
		};
		if let Some(gate) = gate {
			gate.notified().await;
		}

		let mut state = self.state.lock();
		state.next_id += 1;
		let handle = SubscriptionHandle::new(state.next_id, request.topic);
		state.subscribers.push(Subscriber {
			handle,
			request,
			sink,
			open: true,
		});
		Ok(handle)
	}

	async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), TransportError> {
		let mut guard = self.state.lock();
		let state = &mut *guard;
		match state.subscribers.iter_mut().find(|sub| sub.handle == handle && sub.open) {
			Some(sub) => {
				sub.open = false;
				state.unsubscribed.push(handle);
				Ok(())
			}
			None => {
				state.rejected_unsubscribes += 1;
				Err(TransportError::UnknownHandle(handle))
			}
		}
	}

	async fn announce_presence(&self, tenant: &TenantId, meta: PresenceMeta) -> Result<(), TransportError> {
		self.state.lock().announcements.push((tenant.clone(), meta));
		Ok(())
	}

	fn status(&self) -> watch::Receiver<TransportStatus> {
		self.status.subscribe()
	}
}
