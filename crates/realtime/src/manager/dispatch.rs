use std::sync::Arc;
use std::time::Duration;

use guildhall_primitives::{Partition, PartitionKey, Session, Topic};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::announce_presence;
use crate::cache::QueryCache;
use crate::event::{ChangeEvent, ChangeOperation, Notification, PresenceMessage};
use crate::presence::PresenceRoster;
use crate::routes::{insert_toast, partitions_for};
use crate::toast::{Toast, ToastDedup, ToastSink};
use crate::transport::{ChangeTransport, InboundMessage, InboundPayload, TransportStatus};

/// Sequential consumer of the inbound channel for one session generation.
pub(super) struct Dispatcher {
	session: Session,
	generation: u64,
	transport: Arc<dyn ChangeTransport>,
	cache: Arc<dyn QueryCache>,
	toasts: Arc<dyn ToastSink>,
	roster: Arc<Mutex<PresenceRoster>>,
	dedup: ToastDedup,
	last_epoch: Option<u64>,
	lost: bool,
}

impl Dispatcher {
	pub(super) fn new(
		session: Session,
		generation: u64,
		transport: Arc<dyn ChangeTransport>,
		cache: Arc<dyn QueryCache>,
		toasts: Arc<dyn ToastSink>,
		roster: Arc<Mutex<PresenceRoster>>,
		toast_dedup_window: usize,
	) -> Self {
		Self {
			session,
			generation,
			transport,
			cache,
			toasts,
			roster,
			dedup: ToastDedup::new(toast_dedup_window),
			last_epoch: None,
			lost: false,
		}
	}

	/// Runs until `cancel` fires, then hands the receiver back.
	pub(super) async fn run(
		mut self,
		mut inbound: mpsc::Receiver<InboundMessage>,
		mut status: watch::Receiver<TransportStatus>,
		refresh: Option<Duration>,
		cancel: CancellationToken,
	) -> mpsc::Receiver<InboundMessage> {
		if let TransportStatus::Connected { epoch } = *status.borrow_and_update() {
			self.last_epoch = Some(epoch);
		}
		let mut refresh = refresh.map(|period| tokio::time::interval_at(Instant::now() + period, period));

		loop {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => break,
				message = inbound.recv() => match message {
					Some(message) => self.handle(message),
					None => break,
				},
				update = next_status(&mut status) => self.on_status(update).await,
				_ = tick(&mut refresh) => announce_presence(&*self.transport, &self.session).await,
			}
		}
		debug!(generation = self.generation, "realtime.dispatcher.stopped");
		inbound
	}

	pub(super) fn handle(&mut self, message: InboundMessage) {
		if message.generation != self.generation {
			debug!(
				topic = %message.topic,
				generation = message.generation,
				current = self.generation,
				"realtime.event.stale_generation"
			);
			return;
		}

		match message.payload {
			InboundPayload::Presence(presence) if message.topic == Topic::Presence => self.on_presence(presence),
			InboundPayload::Presence(_) => {
				warn!(topic = %message.topic, "realtime.event.unsupported");
			}
			InboundPayload::Change(raw) => match ChangeEvent::decode(message.topic, raw) {
				Ok(event) => self.on_change(event),
				Err(err) => warn!(topic = %message.topic, error = %err, "realtime.event.unsupported"),
			},
		}
	}

	fn on_change(&mut self, event: ChangeEvent) {
		debug!(
			topic = %event.topic,
			operation = %event.operation,
			entity = %event.entity_id,
			"realtime.event"
		);
		self.invalidate(partitions_for(event.topic));

		if event.operation != ChangeOperation::Insert {
			return;
		}
		let toast = match event.topic {
			Topic::Notifications => self.notification_toast(&event),
			topic => insert_toast(topic).map(Toast::info),
		};
		if let Some(toast) = toast {
			self.show(event.topic, &event.entity_id, toast);
		}
	}

	fn notification_toast(&self, event: &ChangeEvent) -> Option<Toast> {
		let notification = match Notification::from_change(event) {
			Ok(notification) => notification,
			Err(err) => {
				warn!(entity = %event.entity_id, error = %err, "realtime.notification.malformed");
				return None;
			}
		};
		if let Some(target) = &notification.target_user_id
			&& target != &self.session.user_id
		{
			debug!(entity = %notification.id, target = %target, "realtime.notification.other_user");
			return None;
		}
		Some(Toast::info(notification.title))
	}

	fn on_presence(&mut self, message: PresenceMessage) {
		let (changed, online) = {
			let mut roster = self.roster.lock();
			let changed = roster.apply(message);
			(changed, roster.len())
		};
		debug!(changed, online, "realtime.presence");
		self.invalidate(&[Partition::Presence]);
	}

	fn show(&mut self, topic: Topic, entity_id: &str, toast: Toast) {
		if !self.dedup.first_sighting(topic, entity_id) {
			debug!(topic = %topic, entity = entity_id, "realtime.toast.duplicate");
			return;
		}
		if let Err(err) = self.toasts.show(toast) {
			warn!(topic = %topic, entity = entity_id, error = %err, "realtime.toast.failed");
		}
	}

	fn invalidate(&self, partitions: &[Partition]) {
		for partition in partitions {
			let key = PartitionKey::for_session(*partition, &self.session);
			self.cache.invalidate(&key);
			debug!(partition = %key, "realtime.invalidate");
		}
	}

	async fn on_status(&mut self, status: TransportStatus) {
		match status {
			TransportStatus::Connected { epoch } => {
				let resumed = self.lost || self.last_epoch.is_some_and(|previous| previous != epoch);
				self.lost = false;
				self.last_epoch = Some(epoch);
				if resumed {
					info!(session = %self.session, epoch, "realtime.reconnect");
					self.invalidate(&Partition::ALL);
					announce_presence(&*self.transport, &self.session).await;
				}
			}
			TransportStatus::Disconnected => {
				if !self.lost {
					warn!(session = %self.session, "realtime.transport.disconnected");
				}
				self.lost = true;
			}
			TransportStatus::Connecting => {}
		}
	}
}

async fn next_status(status: &mut watch::Receiver<TransportStatus>) -> TransportStatus {
	if status.changed().await.is_err() {
		std::future::pending::<()>().await;
	}
	*status.borrow_and_update()
}

async fn tick(refresh: &mut Option<Interval>) {
	match refresh {
		Some(interval) => {
			interval.tick().await;
		}
		None => std::future::pending().await,
	}
}
