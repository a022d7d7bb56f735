use std::sync::Arc;
use std::time::Duration;

use guildhall_config::RealtimeConfig;
use guildhall_primitives::Session;
use serde_json::{Value, json};

use super::RealtimeSyncManager;
use crate::cache::RecordingCache;
use crate::memory::MemoryTransport;
use crate::toast::RecordingToasts;

pub(crate) struct Harness {
	pub(crate) transport: Arc<MemoryTransport>,
	pub(crate) cache: Arc<RecordingCache>,
	pub(crate) toasts: Arc<RecordingToasts>,
	pub(crate) manager: RealtimeSyncManager,
}

pub(crate) fn fast_config() -> RealtimeConfig {
	RealtimeConfig {
		subscribe_backoff_ms: 1,
		presence_refresh_secs: 0,
		..RealtimeConfig::default()
	}
}

pub(crate) fn harness() -> Harness {
	harness_with(fast_config())
}

pub(crate) fn harness_with(config: RealtimeConfig) -> Harness {
	let transport = Arc::new(MemoryTransport::new());
	let cache = Arc::new(RecordingCache::new());
	let toasts = Arc::new(RecordingToasts::new());
	let manager = RealtimeSyncManager::new(transport.clone(), cache.clone(), toasts.clone(), config);
	Harness {
		transport,
		cache,
		toasts,
		manager,
	}
}

pub(crate) fn session(tenant: &str, user: &str) -> Session {
	Session::new(tenant, user)
}

pub(crate) fn insert(id: impl Into<Value>) -> Value {
	let id: Value = id.into();
	json!({"eventType": "INSERT", "new": {"id": id}, "old": {}})
}

pub(crate) fn update(id: impl Into<Value>) -> Value {
	let id: Value = id.into();
	json!({"eventType": "UPDATE", "new": {"id": id}, "old": {}})
}

pub(crate) fn delete(id: impl Into<Value>) -> Value {
	let id: Value = id.into();
	json!({"eventType": "DELETE", "new": {}, "old": {"id": id}})
}

/// Polls `condition` until it holds, failing the test after a few seconds.
pub(crate) async fn wait_until(what: &str, condition: impl Fn() -> bool) {
	for _ in 0..3000 {
		if condition() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(1)).await;
	}
	panic!("timed out waiting for {what}");
}
