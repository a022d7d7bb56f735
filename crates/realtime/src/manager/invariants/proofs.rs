//! Machine-checkable invariant proofs for the realtime sync manager.

use chrono::Utc;
use guildhall_primitives::{PartitionKey, Topic, UserId};
use pretty_assertions::assert_eq;

use crate::error::StartError;
use crate::event::{PresenceMessage, PresenceMeta};
use crate::manager::test_support::{harness, insert, session, update, wait_until};
use crate::routes::partitions_for;
use crate::subscriptions::TopicStatus;

/// Double teardown closes every handle once and never double-closes.
#[cfg_attr(test, tokio::test)]
pub(crate) async fn test_teardown_closes_each_handle_once() {
	let mut h = harness();
	h.manager.start(session("X", "u-1")).unwrap();
	h.manager.ready().await;
	assert_eq!(h.transport.open_count(), 6);

	h.manager.teardown().await;
	h.manager.teardown().await;

	assert_eq!(h.transport.open_count(), 0);
	assert_eq!(h.transport.unsubscribed().len(), 6);
	assert_eq!(h.transport.rejected_unsubscribes(), 0);
	assert!(h.manager.status().iter().all(|(_, status)| *status == TopicStatus::Closed));
	assert!(!h.manager.is_running());
}

/// Teardown while `members` is mid-setup closes that handle once setup resolves.
#[cfg_attr(test, tokio::test)]
pub(crate) async fn test_late_handle_closes_on_resolve() {
	let mut h = harness();
	h.transport.hold(Topic::Members);
	h.manager.start(session("X", "u-1")).unwrap();
	wait_until("five open topics", || h.transport.open_count() == 5).await;
	assert_eq!(h.manager.topic_status(Topic::Members), Some(TopicStatus::Pending));
	wait_until("presence announced", || h.transport.announcements().len() == 1).await;

	h.manager.teardown().await;
	assert_eq!(h.transport.unsubscribed().len(), 5);
	assert_eq!(h.transport.unsubscribe_count(Topic::Members), 0);

	h.transport.release(Topic::Members);
	h.manager.drain_setups().await;

	assert_eq!(h.transport.unsubscribe_count(Topic::Members), 1);
	assert_eq!(h.transport.open_count(), 0);
	assert_eq!(h.transport.rejected_unsubscribes(), 0);
	assert_eq!(h.transport.announcements().len(), 1);
}

/// Late events from a previous session generation never reach the new session's partitions.
#[cfg_attr(test, tokio::test)]
pub(crate) async fn test_dispatcher_drops_stale_generation_events() {
	let mut h = harness();
	h.manager.start(session("X", "u-1")).unwrap();
	h.manager.ready().await;
	let old_generation = h.manager.generation();
	h.manager.teardown().await;

	h.manager.start(session("Y", "u-2")).unwrap();
	h.manager.ready().await;
	assert_ne!(h.manager.generation(), old_generation);

	assert_eq!(h.transport.publish_late(old_generation, Topic::Events, insert("ev-old")).await, 1);
	h.transport.publish(Topic::Members, insert("m-1")).await;
	wait_until("members:Y stale", || h.cache.is_stale("members:Y")).await;

	assert!(!h.cache.is_stale("events:X"));
	assert!(!h.cache.is_stale("events:Y"));
	assert!(h.toasts.messages().is_empty());
	h.manager.teardown().await;
}

/// A manager runs one session at a time.
#[cfg_attr(test, tokio::test)]
pub(crate) async fn test_single_session_per_manager() {
	let mut h = harness();
	assert!(h.manager.start(session("X", "u-1")).is_ok());
	assert_eq!(h.manager.start(session("Y", "u-2")), Err(StartError::AlreadyRunning));
	h.manager.teardown().await;
	assert!(h.manager.start(session("Y", "u-2")).is_ok());
	assert_eq!(h.manager.session().map(|s| s.tenant_id.as_str()), Some("Y"));
	h.manager.teardown().await;
}

/// Each topic invalidates exactly its routed partitions, scoped to the session.
#[cfg_attr(test, tokio::test)]
pub(crate) async fn test_invalidation_follows_route_table() {
	let mut h = harness();
	let s = session("X", "u-1");
	h.manager.start(s.clone()).unwrap();
	h.manager.ready().await;

	for topic in Topic::ALL {
		for key in h.cache.stale_keys() {
			h.cache.refetch(&key);
		}
		if topic == Topic::Presence {
			h.transport
				.publish_presence(PresenceMessage::Join(PresenceMeta {
					user_id: UserId::new("u-9"),
					online_at: Utc::now(),
				}))
				.await;
		} else {
			h.transport.publish(topic, update("row-1")).await;
		}

		let own = PartitionKey::for_session(partitions_for(topic)[0], &s);
		wait_until(own.as_str(), || h.cache.is_stale(own.as_str())).await;

		let mut expected: Vec<String> = partitions_for(topic)
			.iter()
			.map(|p| PartitionKey::for_session(*p, &s).as_str().to_string())
			.collect();
		expected.sort();
		assert_eq!(h.cache.stale_keys(), expected, "{topic}");
	}
	h.manager.teardown().await;
}

/// A rejecting toast sink leaves invalidation untouched.
#[cfg_attr(test, tokio::test)]
pub(crate) async fn test_toast_failure_does_not_block_invalidation() {
	let mut h = harness();
	h.manager.start(session("X", "u-1")).unwrap();
	h.manager.ready().await;

	h.toasts.set_failing(true);
	h.transport.publish(Topic::Events, insert("ev-1")).await;
	wait_until("events:X stale", || h.cache.is_stale("events:X")).await;
	assert!(h.cache.is_stale("activity:X"));
	assert!(h.toasts.messages().is_empty());

	h.toasts.set_failing(false);
	h.transport.publish(Topic::Events, insert("ev-2")).await;
	wait_until("second toast", || h.toasts.messages().len() == 1).await;
	assert!(h.manager.is_running());
	h.manager.teardown().await;
}

/// A topic that never subscribes is marked failed while the others sync.
#[cfg_attr(test, tokio::test)]
pub(crate) async fn test_failed_topic_degrades_in_isolation() {
	let mut h = harness();
	h.transport.fail_subscribes(Topic::Members, 10);
	h.manager.start(session("X", "u-1")).unwrap();
	h.manager.ready().await;

	assert_eq!(h.manager.topic_status(Topic::Members), Some(TopicStatus::Failed));
	assert_eq!(h.transport.attempts(Topic::Members), 3);
	for topic in Topic::ALL.into_iter().filter(|t| *t != Topic::Members) {
		assert_eq!(h.manager.topic_status(topic), Some(TopicStatus::Open), "{topic}");
	}

	assert_eq!(h.transport.publish(Topic::Members, insert("m-1")).await, 0);
	h.transport.publish(Topic::Events, insert("ev-1")).await;
	wait_until("events:X stale", || h.cache.is_stale("events:X")).await;
	assert!(!h.cache.is_stale("members:X"));

	h.manager.teardown().await;
	assert_eq!(h.transport.unsubscribed().len(), 5);
}

/// Reconnect invalidates every partition of the session and re-announces presence.
#[cfg_attr(test, tokio::test)]
pub(crate) async fn test_reconnect_resyncs_every_partition() {
	let mut h = harness();
	h.manager.start(session("X", "u-1")).unwrap();
	h.manager.ready().await;
	assert_eq!(h.transport.announcements().len(), 1);
	assert!(h.cache.stale_keys().is_empty());

	h.transport.reconnect();
	wait_until("all partitions stale", || h.cache.stale_keys().len() == 6).await;
	assert_eq!(
		h.cache.stale_keys(),
		vec![
			"activity:X",
			"event_registrations:X",
			"events:X",
			"members:X",
			"notifications:u-1",
			"presence:X",
		]
	);
	wait_until("second announcement", || h.transport.announcements().len() == 2).await;
	h.manager.teardown().await;
}
