use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(String);

		impl $name {
			/// Wraps a raw identifier.
			pub fn new(id: impl Into<String>) -> Self {
				Self(id.into())
			}

			/// Returns the raw identifier.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl From<&str> for $name {
			fn from(id: &str) -> Self {
				Self::new(id)
			}
		}

		impl From<String> for $name {
			fn from(id: String) -> Self {
				Self(id)
			}
		}
	};
}

string_id!(
	/// Tenant (organization) identifier. Every cache partition and every
	/// entitlement record is scoped to exactly one tenant.
	TenantId
);

string_id!(
	/// Authenticated user identifier.
	UserId
);

/// An authenticated session.
///
/// Owned by the identity provider; the core treats it as read-only input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Session {
	pub tenant_id: TenantId,
	pub user_id: UserId,
}

impl Session {
	pub fn new(tenant_id: impl Into<TenantId>, user_id: impl Into<UserId>) -> Self {
		Self {
			tenant_id: tenant_id.into(),
			user_id: user_id.into(),
		}
	}
}

impl fmt::Display for Session {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}@{}", self.user_id, self.tenant_id)
	}
}
