//! Shared vocabulary for the guildhall client core.
//!
//! Everything here is plain data: tenant and user identifiers, the session
//! pair, application modes, capability tags, change topics and the cache
//! partition keys derived from them. Both the entitlement gate and the
//! realtime sync manager speak in these types.

/// Capability tags gating individual features.
pub mod capability;
/// Tenant, user and session identifiers.
pub mod ids;
/// Application modes a tenant can switch between.
pub mod mode;
/// Change topics, cache partitions and partition keys.
pub mod topic;

pub use capability::Capability;
pub use ids::{Session, TenantId, UserId};
pub use mode::{AppMode, ParseModeError};
pub use topic::{ParseTopicError, Partition, PartitionKey, Topic, TopicScope};
