//! Change-stream transport contract.

use std::fmt;

use async_trait::async_trait;
use guildhall_primitives::{Session, TenantId, Topic, TopicScope, UserId};
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::error::TransportError;
use crate::event::{PresenceMessage, PresenceMeta};

/// Row filter applied by the backend to a topic subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeFilter {
	Tenant(TenantId),
	User(UserId),
}

impl ScopeFilter {
	pub fn for_topic(topic: Topic, session: &Session) -> Self {
		match topic.scope() {
			TopicScope::Tenant => Self::Tenant(session.tenant_id.clone()),
			TopicScope::User => Self::User(session.user_id.clone()),
		}
	}
}

impl fmt::Display for ScopeFilter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Tenant(id) => write!(f, "tenant_id=eq.{id}"),
			Self::User(id) => write!(f, "target_user_id=eq.{id}"),
		}
	}
}

/// One topic subscription request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
	pub topic: Topic,
	pub filter: ScopeFilter,
	/// Session generation the subscription belongs to.
	pub generation: u64,
}

/// Live subscription handle issued by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle {
	id: u64,
	topic: Topic,
}

impl SubscriptionHandle {
	pub const fn new(id: u64, topic: Topic) -> Self {
		Self { id, topic }
	}

	pub const fn id(self) -> u64 {
		self.id
	}

	pub const fn topic(self) -> Topic {
		self.topic
	}
}

impl fmt::Display for SubscriptionHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}#{}", self.topic, self.id)
	}
}

/// Connection state reported by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
	Connecting,
	/// Connected; `epoch` changes every time the connection is re-established.
	Connected { epoch: u64 },
	Disconnected,
}

/// Payload delivered through a sink.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundPayload {
	Change(Value),
	Presence(PresenceMessage),
}

/// A payload tagged with the subscription it arrived on.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
	pub topic: Topic,
	pub generation: u64,
	pub payload: InboundPayload,
}

/// Delivery side of one subscription.
///
/// Sinks are created by the sync manager and handed to the transport; every
/// message sent through one is stamped with the sink's topic and generation.
#[derive(Debug, Clone)]
pub struct InboundSink {
	topic: Topic,
	generation: u64,
	tx: mpsc::Sender<InboundMessage>,
}

impl InboundSink {
	pub(crate) fn new(topic: Topic, generation: u64, tx: mpsc::Sender<InboundMessage>) -> Self {
		Self { topic, generation, tx }
	}

	pub fn topic(&self) -> Topic {
		self.topic
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Delivers a raw change record, waiting for channel capacity.
	pub async fn send_change(&self, payload: Value) -> Result<(), TransportError> {
		self.send(InboundPayload::Change(payload)).await
	}

	/// Delivers a presence sync event, waiting for channel capacity.
	pub async fn send_presence(&self, message: PresenceMessage) -> Result<(), TransportError> {
		self.send(InboundPayload::Presence(message)).await
	}

	async fn send(&self, payload: InboundPayload) -> Result<(), TransportError> {
		let message = InboundMessage {
			topic: self.topic,
			generation: self.generation,
			payload,
		};
		self.tx.send(message).await.map_err(|_| TransportError::Closed)
	}
}

/// Change-data-capture stream.
#[async_trait]
pub trait ChangeTransport: Send + Sync {
	/// Opens a subscription. Messages for it must be delivered through `sink`.
	async fn subscribe(&self, request: SubscriptionRequest, sink: InboundSink) -> Result<SubscriptionHandle, TransportError>;

	/// Closes a subscription. Closing a handle that is not open is an error.
	async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), TransportError>;

	/// Announces this session on the tenant's presence channel.
	async fn announce_presence(&self, tenant: &TenantId, meta: PresenceMeta) -> Result<(), TransportError>;

	/// Connection status. A change of `epoch` signals a reconnect.
	fn status(&self) -> watch::Receiver<TransportStatus>;
}
