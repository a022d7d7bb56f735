//! Query-cache contract and a recording implementation.

use std::collections::{BTreeSet, HashMap};

use guildhall_primitives::PartitionKey;
use parking_lot::Mutex;

/// Cached read model. The sync layer only ever marks partitions stale; it
/// never writes cache contents.
pub trait QueryCache: Send + Sync {
	fn invalidate(&self, key: &PartitionKey);
}

#[derive(Debug, Default)]
struct CacheState {
	stale: BTreeSet<PartitionKey>,
	counts: HashMap<PartitionKey, usize>,
}

/// Cache that remembers which partitions are stale and how often each was invalidated.
#[derive(Debug, Default)]
pub struct RecordingCache {
	state: Mutex<CacheState>,
}

impl RecordingCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_stale(&self, key: &str) -> bool {
		self.state.lock().stale.iter().any(|k| k.as_str() == key)
	}

	/// Stale partitions in key order.
	pub fn stale_keys(&self) -> Vec<String> {
		self.state.lock().stale.iter().map(|k| k.as_str().to_string()).collect()
	}

	/// How many times `key` was invalidated.
	pub fn invalidations(&self, key: &str) -> usize {
		self.state
			.lock()
			.counts
			.iter()
			.find(|(k, _)| k.as_str() == key)
			.map_or(0, |(_, count)| *count)
	}

	pub fn total_invalidations(&self) -> usize {
		self.state.lock().counts.values().sum()
	}

	/// Marks `key` fresh again, as a refetch would. Returns whether it was stale.
	pub fn refetch(&self, key: &str) -> bool {
		let mut state = self.state.lock();
		let before = state.stale.len();
		state.stale.retain(|k| k.as_str() != key);
		state.stale.len() != before
	}
}

impl QueryCache for RecordingCache {
	fn invalidate(&self, key: &PartitionKey) {
		let mut state = self.state.lock();
		state.stale.insert(key.clone());
		*state.counts.entry(key.clone()).or_default() += 1;
	}
}
