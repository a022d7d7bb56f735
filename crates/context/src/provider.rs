use guildhall_primitives::Session;
use tokio::sync::watch;

/// Source of the authenticated session.
///
/// The identity layer owns the sender; the session context only ever reads.
#[derive(Debug)]
pub struct SessionProvider {
	tx: watch::Sender<Option<Session>>,
}

impl Default for SessionProvider {
	fn default() -> Self {
		Self::new()
	}
}

impl SessionProvider {
	/// A provider with no session.
	pub fn new() -> Self {
		let (tx, _) = watch::channel(None);
		Self { tx }
	}

	pub fn sign_in(&self, session: Session) {
		self.tx.send_replace(Some(session));
	}

	pub fn sign_out(&self) {
		self.tx.send_replace(None);
	}

	pub fn current(&self) -> Option<Session> {
		self.tx.borrow().clone()
	}

	/// Session-changed notifications, starting at the current value.
	pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
		self.tx.subscribe()
	}
}
