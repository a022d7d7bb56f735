//! Error types for the realtime sync layer.

use thiserror::Error;

use crate::transport::SubscriptionHandle;

/// A change-stream transport operation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
	/// The backend refused or could not serve the request.
	#[error("change stream unavailable: {0}")]
	Unavailable(String),

	/// The handle is not open on this transport (never issued or already closed).
	#[error("unknown subscription handle {0}")]
	UnknownHandle(SubscriptionHandle),

	/// The receiving side of a subscription sink has gone away.
	#[error("inbound channel closed")]
	Closed,
}

/// [`crate::RealtimeSyncManager::start`] was called in a state that cannot start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartError {
	#[error("sync manager already running for a session")]
	AlreadyRunning,
	#[error("no tokio runtime available")]
	NoRuntime,
}

/// A raw payload did not have a supported event shape.
#[derive(Debug, Error)]
pub enum DecodeError {
	#[error("payload is not a change record: {0}")]
	Shape(#[source] serde_json::Error),

	#[error("{operation} change carries no entity id")]
	MissingEntityId { operation: &'static str },

	#[error("entity id must be a string or integer, got {0}")]
	InvalidEntityId(serde_json::Value),

	#[error("notification row is malformed: {0}")]
	Notification(#[source] serde_json::Error),

	#[error("presence topic delivered a change record")]
	ChangeOnPresenceTopic,
}

/// The toast sink could not show a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToastError {
	#[error("toast sink rejected message: {0}")]
	Rejected(String),
}
