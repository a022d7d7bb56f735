//! Static topic to cache-partition routing.
//!
//! A change on one topic can stale more than its own partition: a new event
//! registration changes the event's attendee count and shows up in the
//! activity feed. This table is the single place that decision is written
//! down.

use guildhall_primitives::{Partition, Topic};

/// Partitions invalidated by any change on `topic`.
pub const fn partitions_for(topic: Topic) -> &'static [Partition] {
	match topic {
		Topic::Activity => &[Partition::Activity],
		Topic::Events => &[Partition::Events, Partition::Activity],
		Topic::EventRegistrations => &[Partition::EventRegistrations, Partition::Events, Partition::Activity],
		Topic::Members => &[Partition::Members, Partition::Activity],
		Topic::Notifications => &[Partition::Notifications],
		Topic::Presence => &[Partition::Presence],
	}
}

/// Fixed toast text for inserts on `topic`, if inserts there are announced.
///
/// Notification inserts are announced with the notification's own title and
/// are not covered here.
pub const fn insert_toast(topic: Topic) -> Option<&'static str> {
	match topic {
		Topic::Events => Some("New event created"),
		Topic::EventRegistrations => Some("New event registration"),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn route_table_matches_documented_fan_out() {
		let table: Vec<(Topic, Vec<&str>)> = Topic::ALL
			.into_iter()
			.map(|topic| (topic, partitions_for(topic).iter().map(|p| p.as_str()).collect()))
			.collect();
		assert_eq!(
			table,
			vec![
				(Topic::Activity, vec!["activity"]),
				(Topic::Events, vec!["events", "activity"]),
				(Topic::EventRegistrations, vec!["event_registrations", "events", "activity"]),
				(Topic::Members, vec!["members", "activity"]),
				(Topic::Notifications, vec!["notifications"]),
				(Topic::Presence, vec!["presence"]),
			]
		);
	}

	#[test]
	fn every_topic_invalidates_its_own_partition() {
		for topic in Topic::ALL {
			assert!(partitions_for(topic).iter().any(|p| p.as_str() == topic.as_str()), "{topic}");
		}
	}

	#[test]
	fn only_event_topics_have_fixed_insert_toasts() {
		assert_eq!(insert_toast(Topic::Events), Some("New event created"));
		assert_eq!(insert_toast(Topic::EventRegistrations), Some("New event registration"));
		assert_eq!(insert_toast(Topic::Members), None);
		assert_eq!(insert_toast(Topic::Notifications), None);
	}
}
