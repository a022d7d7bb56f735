use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Application mode.
///
/// The dashboard renders either the real-estate CRM or the trade-association
/// management surface. Ordering is significant: when a stored mode is no
/// longer allowed, the first allowed mode in `Ord` order is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
	Crm,
	Trade,
}

impl AppMode {
	/// Every mode, in preference order.
	pub const ALL: [AppMode; 2] = [AppMode::Crm, AppMode::Trade];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Crm => "crm",
			Self::Trade => "trade",
		}
	}
}

impl fmt::Display for AppMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned when parsing an unknown mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown application mode: {0} (expected 'crm' or 'trade')")]
pub struct ParseModeError(pub String);

impl FromStr for AppMode {
	type Err = ParseModeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"crm" => Ok(Self::Crm),
			"trade" => Ok(Self::Trade),
			_ => Err(ParseModeError(s.to_string())),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_is_case_insensitive() {
		assert_eq!("CRM".parse::<AppMode>(), Ok(AppMode::Crm));
		assert_eq!(" trade ".parse::<AppMode>(), Ok(AppMode::Trade));
		assert!("admin".parse::<AppMode>().is_err());
	}

	#[test]
	fn crm_sorts_before_trade() {
		assert!(AppMode::Crm < AppMode::Trade);
		assert_eq!(AppMode::ALL[0], AppMode::Crm);
	}
}
