//! Decoding of inbound change and presence payloads.

use std::fmt;

use chrono::{DateTime, Utc};
use guildhall_primitives::{Topic, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DecodeError;

/// Row-level operation carried by a change record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOperation {
	Insert,
	Update,
	Delete,
}

impl ChangeOperation {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Insert => "insert",
			Self::Update => "update",
			Self::Delete => "delete",
		}
	}
}

impl fmt::Display for ChangeOperation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Deserialize)]
struct RawChange {
	#[serde(rename = "eventType")]
	event_type: ChangeOperation,
	#[serde(default)]
	new: Option<Map<String, Value>>,
	#[serde(default)]
	old: Option<Map<String, Value>>,
}

/// A decoded change record.
///
/// Delivery is at-least-once and unordered across topics.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
	pub topic: Topic,
	pub operation: ChangeOperation,
	pub entity_id: String,
	/// The row after the change, or the removed row for deletes.
	pub row: Map<String, Value>,
}

impl ChangeEvent {
	/// Decodes `{"eventType", "new", "old"}`. The entity id comes from
	/// `new.id`, falling back to `old.id`.
	pub fn decode(topic: Topic, payload: Value) -> Result<Self, DecodeError> {
		if topic == Topic::Presence {
			return Err(DecodeError::ChangeOnPresenceTopic);
		}
		let raw: RawChange = serde_json::from_value(payload).map_err(DecodeError::Shape)?;
		let new = raw.new.filter(|row| !row.is_empty());
		let old = raw.old.filter(|row| !row.is_empty());

		let id = new
			.as_ref()
			.and_then(|row| row.get("id"))
			.or_else(|| old.as_ref().and_then(|row| row.get("id")))
			.ok_or(DecodeError::MissingEntityId {
				operation: raw.event_type.as_str(),
			})?;
		let entity_id = match id {
			Value::String(id) => id.clone(),
			Value::Number(id) if id.is_i64() || id.is_u64() => id.to_string(),
			other => return Err(DecodeError::InvalidEntityId(other.clone())),
		};

		Ok(Self {
			topic,
			operation: raw.event_type,
			entity_id,
			row: new.or(old).unwrap_or_default(),
		})
	}
}

/// A user-directed notification, produced by an insert on the notifications topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
	pub id: String,
	pub title: String,
	pub target_user_id: Option<UserId>,
	pub read: bool,
}

#[derive(Deserialize)]
struct NotificationRow {
	title: String,
	#[serde(default)]
	target_user_id: Option<UserId>,
	#[serde(default)]
	read: bool,
}

impl Notification {
	pub fn from_change(event: &ChangeEvent) -> Result<Self, DecodeError> {
		let row: NotificationRow = serde_json::from_value(Value::Object(event.row.clone())).map_err(DecodeError::Notification)?;
		Ok(Self {
			id: event.entity_id.clone(),
			title: row.title,
			target_user_id: row.target_user_id,
			read: row.read,
		})
	}
}

/// Presence metadata a session announces for itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceMeta {
	pub user_id: UserId,
	pub online_at: DateTime<Utc>,
}

impl PresenceMeta {
	/// Presence for `user` stamped with the current time.
	pub fn now(user: UserId) -> Self {
		Self {
			user_id: user,
			online_at: Utc::now(),
		}
	}
}

/// Presence sync events. These never carry insert/update/delete semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "lowercase")]
pub enum PresenceMessage {
	/// Full roster replacement.
	Sync(Vec<PresenceMeta>),
	Join(PresenceMeta),
	Leave(UserId),
}
