use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Session;

/// A logical change-data-capture topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
	Activity,
	Events,
	EventRegistrations,
	Members,
	/// Direct notifications; the only user-scoped topic.
	Notifications,
	Presence,
}

/// Whether a subscription or partition is scoped to the tenant or to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicScope {
	Tenant,
	User,
}

impl Topic {
	/// The fixed topic set opened for every session.
	pub const ALL: [Topic; 6] = [
		Topic::Activity,
		Topic::Events,
		Topic::EventRegistrations,
		Topic::Members,
		Topic::Notifications,
		Topic::Presence,
	];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Activity => "activity",
			Self::Events => "events",
			Self::EventRegistrations => "event_registrations",
			Self::Members => "members",
			Self::Notifications => "notifications",
			Self::Presence => "presence",
		}
	}

	pub const fn scope(self) -> TopicScope {
		match self {
			Self::Notifications => TopicScope::User,
			_ => TopicScope::Tenant,
		}
	}
}

impl fmt::Display for Topic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned when parsing an unknown topic name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown topic: {0}")]
pub struct ParseTopicError(pub String);

impl FromStr for Topic {
	type Err = ParseTopicError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|topic| topic.as_str() == s)
			.ok_or_else(|| ParseTopicError(s.to_string()))
	}
}

/// A named read-model partition owned by the query-cache layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Partition {
	Activity,
	Events,
	EventRegistrations,
	Members,
	Notifications,
	Presence,
}

impl Partition {
	pub const ALL: [Partition; 6] = [
		Partition::Activity,
		Partition::Events,
		Partition::EventRegistrations,
		Partition::Members,
		Partition::Notifications,
		Partition::Presence,
	];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Activity => "activity",
			Self::Events => "events",
			Self::EventRegistrations => "event_registrations",
			Self::Members => "members",
			Self::Notifications => "notifications",
			Self::Presence => "presence",
		}
	}

	pub const fn scope(self) -> TopicScope {
		match self {
			Self::Notifications => TopicScope::User,
			_ => TopicScope::Tenant,
		}
	}
}

impl fmt::Display for Partition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Cache partition key, `"{partition}:{scope}"`.
///
/// The scope is the tenant id, or the user id for user-scoped partitions.
/// Keys are derived deterministically so every consumer agrees on them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey(String);

impl PartitionKey {
	/// Derives the key of `partition` for a session.
	pub fn for_session(partition: Partition, session: &Session) -> Self {
		let scope = match partition.scope() {
			TopicScope::Tenant => session.tenant_id.as_str(),
			TopicScope::User => session.user_id.as_str(),
		};
		Self(format!("{}:{scope}", partition.as_str()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for PartitionKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}
