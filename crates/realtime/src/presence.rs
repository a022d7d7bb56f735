//! Roster of users currently connected to the tenant.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use guildhall_primitives::UserId;

use crate::event::{PresenceMessage, PresenceMeta};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PresenceRoster {
	online: BTreeMap<UserId, DateTime<Utc>>,
}

impl PresenceRoster {
	/// Applies a presence event. Returns whether the roster changed.
	pub fn apply(&mut self, message: PresenceMessage) -> bool {
		match message {
			PresenceMessage::Sync(metas) => {
				let next: BTreeMap<_, _> = metas.into_iter().map(|m| (m.user_id, m.online_at)).collect();
				let changed = next != self.online;
				self.online = next;
				changed
			}
			PresenceMessage::Join(meta) => self.join(meta),
			PresenceMessage::Leave(user) => self.online.remove(&user).is_some(),
		}
	}

	// A user with several tabs joins repeatedly; keep the earliest online_at.
	fn join(&mut self, meta: PresenceMeta) -> bool {
		match self.online.get(&meta.user_id) {
			Some(since) if *since <= meta.online_at => false,
			_ => {
				self.online.insert(meta.user_id, meta.online_at);
				true
			}
		}
	}

	pub fn contains(&self, user: &UserId) -> bool {
		self.online.contains_key(user)
	}

	pub fn users(&self) -> Vec<UserId> {
		self.online.keys().cloned().collect()
	}

	pub fn online_since(&self, user: &UserId) -> Option<DateTime<Utc>> {
		self.online.get(user).copied()
	}

	pub fn len(&self) -> usize {
		self.online.len()
	}

	pub fn is_empty(&self) -> bool {
		self.online.is_empty()
	}

	pub fn clear(&mut self) {
		self.online.clear();
	}
}

#[cfg(test)]
mod tests {
	use chrono::TimeZone;

	use super::*;

	fn meta(user: &str, minute: u32) -> PresenceMeta {
		PresenceMeta {
			user_id: UserId::new(user),
			online_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, minute, 0).unwrap(),
		}
	}

	#[test]
	fn join_and_leave_track_users() {
		let mut roster = PresenceRoster::default();
		assert!(roster.apply(PresenceMessage::Join(meta("u-1", 0))));
		assert!(roster.apply(PresenceMessage::Join(meta("u-2", 1))));
		assert!(!roster.apply(PresenceMessage::Join(meta("u-1", 5))));
		assert_eq!(roster.online_since(&UserId::new("u-1")), Some(meta("u-1", 0).online_at));
		assert!(roster.apply(PresenceMessage::Leave(UserId::new("u-1"))));
		assert!(!roster.apply(PresenceMessage::Leave(UserId::new("u-1"))));
		assert_eq!(roster.users(), vec![UserId::new("u-2")]);
	}

	#[test]
	fn sync_replaces_roster() {
		let mut roster = PresenceRoster::default();
		roster.apply(PresenceMessage::Join(meta("u-1", 0)));
		assert!(roster.apply(PresenceMessage::Sync(vec![meta("u-3", 2), meta("u-4", 3)])));
		assert!(!roster.contains(&UserId::new("u-1")));
		assert_eq!(roster.len(), 2);
		assert!(!roster.apply(PresenceMessage::Sync(vec![meta("u-3", 2), meta("u-4", 3)])));
	}
}
