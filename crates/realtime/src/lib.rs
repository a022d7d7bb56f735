//! Realtime change-stream sync for the guildhall client core.
//!
//! The [`RealtimeSyncManager`] subscribes a session to the fixed topic set,
//! turns inbound change records into cache-partition invalidations through a
//! static route table, keeps a presence roster, and raises toasts for the
//! inserts users care about. It never writes cache contents; views refetch
//! whatever was invalidated.
//!
//! External collaborators are traits: [`ChangeTransport`] for the stream,
//! [`QueryCache`] for the read model and [`ToastSink`] for transient messages.
//! [`MemoryTransport`], [`RecordingCache`] and [`RecordingToasts`] implement
//! them in-process.

#![cfg_attr(test, allow(unused_crate_dependencies))]

mod cache;
mod error;
mod event;
mod manager;
mod memory;
mod presence;
pub mod routes;
mod subscriptions;
mod toast;
mod transport;

pub use cache::{QueryCache, RecordingCache};
pub use error::{DecodeError, StartError, ToastError, TransportError};
pub use event::{ChangeEvent, ChangeOperation, Notification, PresenceMessage, PresenceMeta};
pub use manager::RealtimeSyncManager;
pub use memory::MemoryTransport;
pub use presence::PresenceRoster;
pub use subscriptions::TopicStatus;
pub use toast::{RecordingToasts, Toast, ToastLevel, ToastSink};
pub use transport::{
	ChangeTransport, InboundMessage, InboundPayload, InboundSink, ScopeFilter, SubscriptionHandle, SubscriptionRequest, TransportStatus,
};
