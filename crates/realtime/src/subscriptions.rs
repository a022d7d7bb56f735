//! Per-session subscription bookkeeping.

use std::collections::BTreeMap;

use guildhall_primitives::Topic;

use crate::transport::SubscriptionHandle;

/// Health of one topic subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicStatus {
	/// Setup has not resolved yet.
	Pending,
	Open,
	/// Every attempt failed; the topic's partitions are not kept fresh.
	Failed,
	/// Torn down.
	Closed,
}

impl TopicStatus {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Open => "open",
			Self::Failed => "failed",
			Self::Closed => "closed",
		}
	}
}

#[derive(Debug)]
struct Slot {
	status: TopicStatus,
	handle: Option<SubscriptionHandle>,
}

/// Subscription handles of one session generation.
///
/// Handles leave the set exactly once: either through [`SubscriptionSet::close`]
/// or by being refused in [`SubscriptionSet::register`] after close. Whoever
/// receives a handle from either is responsible for unsubscribing it.
#[derive(Debug)]
pub(crate) struct SubscriptionSet {
	generation: u64,
	closed: bool,
	slots: BTreeMap<Topic, Slot>,
}

impl SubscriptionSet {
	pub(crate) fn new(generation: u64) -> Self {
		let slots = Topic::ALL
			.into_iter()
			.map(|topic| {
				(
					topic,
					Slot {
						status: TopicStatus::Pending,
						handle: None,
					},
				)
			})
			.collect();
		Self {
			generation,
			closed: false,
			slots,
		}
	}

	pub(crate) fn generation(&self) -> u64 {
		self.generation
	}

	pub(crate) fn is_closed(&self) -> bool {
		self.closed
	}

	/// Records an opened handle. After close the handle is handed back.
	pub(crate) fn register(&mut self, handle: SubscriptionHandle) -> Result<(), SubscriptionHandle> {
		if self.closed {
			return Err(handle);
		}
		let Some(slot) = self.slots.get_mut(&handle.topic()) else {
			return Err(handle);
		};
		if slot.handle.is_some() {
			return Err(handle);
		}
		slot.handle = Some(handle);
		slot.status = TopicStatus::Open;
		Ok(())
	}

	pub(crate) fn mark_failed(&mut self, topic: Topic) {
		if self.closed {
			return;
		}
		if let Some(slot) = self.slots.get_mut(&topic) {
			slot.status = TopicStatus::Failed;
		}
	}

	/// Closes the set and drains every open handle. Later calls return nothing.
	pub(crate) fn close(&mut self) -> Vec<SubscriptionHandle> {
		if self.closed {
			return Vec::new();
		}
		self.closed = true;
		self.slots
			.values_mut()
			.filter_map(|slot| {
				slot.status = TopicStatus::Closed;
				slot.handle.take()
			})
			.collect()
	}

	pub(crate) fn status(&self, topic: Topic) -> TopicStatus {
		self.slots.get(&topic).map_or(TopicStatus::Closed, |slot| slot.status)
	}

	pub(crate) fn statuses(&self) -> Vec<(Topic, TopicStatus)> {
		self.slots.iter().map(|(topic, slot)| (*topic, slot.status)).collect()
	}

	pub(crate) fn open_count(&self) -> usize {
		self.slots.values().filter(|slot| slot.handle.is_some()).count()
	}
}
