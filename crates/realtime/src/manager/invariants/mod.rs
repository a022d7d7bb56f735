//! Machine-checkable invariant catalog and proof entrypoints for realtime sync behavior.
#![allow(dead_code)]

pub(crate) mod catalog;

#[allow(unused_imports)]
pub(crate) use catalog::{
	DISPATCHER_DROPS_STALE_GENERATION_EVENTS, FAILED_TOPIC_DEGRADES_IN_ISOLATION, HANDLES_CLOSE_EXACTLY_ONCE,
	INVALIDATION_FOLLOWS_ROUTE_TABLE, LATE_HANDLES_CLOSE_ON_RESOLVE, RECONNECT_RESYNCS_EVERY_PARTITION,
	SINGLE_SESSION_PER_MANAGER, TOAST_FAILURE_DOES_NOT_BLOCK_INVALIDATION,
};

#[cfg(doc)]
pub(crate) async fn test_teardown_closes_each_handle_once() {}

#[cfg(doc)]
pub(crate) async fn test_late_handle_closes_on_resolve() {}

#[cfg(doc)]
pub(crate) async fn test_dispatcher_drops_stale_generation_events() {}

#[cfg(doc)]
pub(crate) async fn test_single_session_per_manager() {}

#[cfg(doc)]
pub(crate) async fn test_invalidation_follows_route_table() {}

#[cfg(doc)]
pub(crate) async fn test_toast_failure_does_not_block_invalidation() {}

#[cfg(doc)]
pub(crate) async fn test_failed_topic_degrades_in_isolation() {}

#[cfg(doc)]
pub(crate) async fn test_reconnect_resyncs_every_partition() {}

#[cfg(test)]
mod proofs;

#[cfg(test)]
#[allow(unused_imports)]
pub(crate) use proofs::{
	test_dispatcher_drops_stale_generation_events, test_failed_topic_degrades_in_isolation, test_invalidation_follows_route_table,
	test_late_handle_closes_on_resolve, test_reconnect_resyncs_every_partition, test_single_session_per_manager,
	test_teardown_closes_each_handle_once, test_toast_failure_does_not_block_invalidation,
};
