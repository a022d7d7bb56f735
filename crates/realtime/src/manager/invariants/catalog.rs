//! Invariant catalog for [`crate::RealtimeSyncManager`].
#![allow(dead_code)]

/// Must unsubscribe every opened handle exactly once, however often teardown runs.
///
/// - Enforced in: `SubscriptionSet::close`, [`crate::RealtimeSyncManager::teardown`]
/// - Tested by: [`crate::manager::invariants::test_teardown_closes_each_handle_once`]
/// - Failure symptom: Leaked backend channels, or `UnknownHandle` errors from double closes.
pub(crate) const HANDLES_CLOSE_EXACTLY_ONCE: () = ();

/// A subscription resolving after teardown must be closed as soon as it resolves.
///
/// - Enforced in: `SubscriptionSet::register`, `Setup::subscribe`
/// - Tested by: [`crate::manager::invariants::test_late_handle_closes_on_resolve`]
/// - Failure symptom: A signed-out session keeps receiving another tenant's changes.
pub(crate) const LATE_HANDLES_CLOSE_ON_RESOLVE: () = ();

/// Dispatcher must discard messages stamped with another session generation.
///
/// - Enforced in: `Dispatcher::handle`
/// - Tested by: [`crate::manager::invariants::test_dispatcher_drops_stale_generation_events`]
/// - Failure symptom: A late event from a torn-down session invalidates the new session's partitions.
pub(crate) const DISPATCHER_DROPS_STALE_GENERATION_EVENTS: () = ();

/// At most one session runs per manager.
///
/// - Enforced in: [`crate::RealtimeSyncManager::start`]
/// - Tested by: [`crate::manager::invariants::test_single_session_per_manager`]
/// - Failure symptom: Two dispatchers race on one cache and toasts double up.
pub(crate) const SINGLE_SESSION_PER_MANAGER: () = ();

/// Every change invalidates exactly the partitions the route table lists for its topic.
///
/// - Enforced in: [`crate::routes::partitions_for`], `Dispatcher::on_change`
/// - Tested by: [`crate::manager::invariants::test_invalidation_follows_route_table`]
/// - Failure symptom: Dashboard counters or the activity feed stay stale after a change.
pub(crate) const INVALIDATION_FOLLOWS_ROUTE_TABLE: () = ();

/// A failing toast sink must not prevent or delay invalidation.
///
/// - Enforced in: `Dispatcher::show`
/// - Tested by: [`crate::manager::invariants::test_toast_failure_does_not_block_invalidation`]
/// - Failure symptom: Data stays stale whenever the notification surface is unavailable.
pub(crate) const TOAST_FAILURE_DOES_NOT_BLOCK_INVALIDATION: () = ();

/// A topic whose subscription keeps failing degrades alone.
///
/// - Enforced in: `Setup::subscribe`, `SubscriptionSet::mark_failed`
/// - Tested by: [`crate::manager::invariants::test_failed_topic_degrades_in_isolation`]
/// - Failure symptom: One flaky topic stops sync for the whole session.
pub(crate) const FAILED_TOPIC_DEGRADES_IN_ISOLATION: () = ();

/// A transport reconnect must invalidate every session partition and re-announce presence.
///
/// - Enforced in: `Dispatcher::on_status`
/// - Tested by: [`crate::manager::invariants::test_reconnect_resyncs_every_partition`]
/// - Failure symptom: Changes made while disconnected never show up.
pub(crate) const RECONNECT_RESYNCS_EVERY_PARTITION: () = ();
