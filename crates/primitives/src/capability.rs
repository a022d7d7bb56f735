use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A capability tag from a tenant's access permissions, e.g. `"detailed_stats"`
/// or `"marketing"`.
///
/// Tags are opaque to the core; the view layer decides which feature each one
/// unlocks. `Borrow<str>` lets permission sets be queried with a plain `&str`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(String);

impl Capability {
	pub fn new(tag: impl Into<String>) -> Self {
		Self(tag.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Borrow<str> for Capability {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Capability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for Capability {
	fn from(tag: &str) -> Self {
		Self::new(tag)
	}
}
