//! Transient user-facing messages.

use std::num::NonZeroUsize;

use guildhall_primitives::Topic;
use lru::LruCache;
use parking_lot::Mutex;

use crate::error::ToastError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
	Info,
	Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
	pub level: ToastLevel,
	pub message: String,
}

impl Toast {
	pub fn info(message: impl Into<String>) -> Self {
		Self {
			level: ToastLevel::Info,
			message: message.into(),
		}
	}

	pub fn warning(message: impl Into<String>) -> Self {
		Self {
			level: ToastLevel::Warning,
			message: message.into(),
		}
	}
}

/// Best-effort toast display.
pub trait ToastSink: Send + Sync {
	fn show(&self, toast: Toast) -> Result<(), ToastError>;
}

#[derive(Debug, Default)]
struct ToastState {
	shown: Vec<Toast>,
	failing: bool,
}

/// Toast sink that records what it was asked to show.
#[derive(Debug, Default)]
pub struct RecordingToasts {
	state: Mutex<ToastState>,
}

impl RecordingToasts {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn shown(&self) -> Vec<Toast> {
		self.state.lock().shown.clone()
	}

	pub fn messages(&self) -> Vec<String> {
		self.state.lock().shown.iter().map(|t| t.message.clone()).collect()
	}

	/// While failing, every `show` is rejected and nothing is recorded.
	pub fn set_failing(&self, failing: bool) {
		self.state.lock().failing = failing;
	}
}

impl ToastSink for RecordingToasts {
	fn show(&self, toast: Toast) -> Result<(), ToastError> {
		let mut state = self.state.lock();
		if state.failing {
			return Err(ToastError::Rejected(toast.message));
		}
		state.shown.push(toast);
		Ok(())
	}
}

/// Bounded memory of recently toasted `(topic, entity)` pairs.
pub(crate) struct ToastDedup {
	recent: Option<LruCache<(Topic, String), ()>>,
}

impl ToastDedup {
	/// A window of zero disables suppression.
	pub(crate) fn new(window: usize) -> Self {
		Self {
			recent: NonZeroUsize::new(window).map(LruCache::new),
		}
	}

	/// Records the pair and returns true unless it is already in the window.
	pub(crate) fn first_sighting(&mut self, topic: Topic, entity_id: &str) -> bool {
		match &mut self.recent {
			Some(recent) => recent.put((topic, entity_id.to_string()), ()).is_none(),
			None => true,
		}
	}
}
