//! Configuration system for the guildhall client core.
//!
//! Configuration is written in TOML. Every section and field is optional and
//! falls back to the built-in defaults:
//!
//! ```toml
//! [log]
//! filter = "info,guildhall_realtime=debug"
//!
//! [realtime]
//! channel_capacity = 1024
//! subscribe_max_attempts = 3
//! subscribe_backoff_ms = 250
//! presence_refresh_secs = 30
//! toast_dedup_window = 256
//!
//! # Declaring any plan replaces the whole built-in catalog.
//! [plans.basic]
//! display = "Basic"
//! rank = 0
//! modes = ["crm"]
//! default_mode = "crm"
//! ```
//!
//! [`Config::parse`] validates after deserializing, so a config that parses is
//! also internally consistent (every plan has at least one mode and its default
//! mode is one of them).

pub mod error;

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub use error::{ConfigError, Result};
use guildhall_primitives::AppMode;
use serde::{Deserialize, Serialize};

/// Parsed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
	#[serde(default)]
	pub log: LogConfig,
	#[serde(default)]
	pub realtime: RealtimeConfig,
	/// Subscription plan catalog keyed by plan id.
	#[serde(default = "default_plans")]
	pub plans: BTreeMap<String, PlanConfig>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			log: LogConfig::default(),
			realtime: RealtimeConfig::default(),
			plans: default_plans(),
		}
	}
}

impl Config {
	/// Parse a TOML string into a validated [`Config`].
	pub fn parse(input: &str) -> Result<Self> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Read and parse a configuration file.
	pub fn load(path: &Path) -> Result<Self> {
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::parse(&input)
	}

	/// Checks cross-field rules that serde cannot express.
	pub fn validate(&self) -> Result<()> {
		if self.realtime.channel_capacity == 0 {
			return Err(ConfigError::Invalid("realtime.channel_capacity must be > 0".into()));
		}
		if self.realtime.subscribe_max_attempts == 0 {
			return Err(ConfigError::Invalid("realtime.subscribe_max_attempts must be > 0".into()));
		}
		if self.plans.is_empty() {
			return Err(ConfigError::Invalid("at least one plan must be configured".into()));
		}
		for (id, plan) in &self.plans {
			if plan.modes.is_empty() {
				return Err(ConfigError::Invalid(format!("plan '{id}' entitles no modes")));
			}
			if !plan.modes.contains(&plan.default_mode) {
				return Err(ConfigError::Invalid(format!(
					"plan '{id}' default mode '{}' is not one of its modes",
					plan.default_mode
				)));
			}
		}
		Ok(())
	}
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
	/// `tracing_subscriber::EnvFilter` directive string, used when `RUST_LOG` is unset.
	pub filter: String,
}

impl Default for LogConfig {
	fn default() -> Self {
		Self { filter: "info".into() }
	}
}

/// Realtime sync tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RealtimeConfig {
	/// Capacity of the inbound change channel shared by all topic subscriptions.
	pub channel_capacity: usize,
	/// Subscription attempts per topic before the topic is left degraded.
	pub subscribe_max_attempts: u32,
	/// Fixed backoff between subscription attempts.
	pub subscribe_backoff_ms: u64,
	/// Presence re-announce interval. Zero disables periodic refresh.
	pub presence_refresh_secs: u64,
	/// Number of recent `(topic, entity)` pairs remembered to suppress duplicate toasts.
	/// Zero disables suppression.
	pub toast_dedup_window: usize,
}

impl Default for RealtimeConfig {
	fn default() -> Self {
		Self {
			channel_capacity: 1024,
			subscribe_max_attempts: 3,
			subscribe_backoff_ms: 250,
			presence_refresh_secs: 30,
			toast_dedup_window: 256,
		}
	}
}

impl RealtimeConfig {
	pub fn subscribe_backoff(&self) -> Duration {
		Duration::from_millis(self.subscribe_backoff_ms)
	}

	/// Returns the presence refresh period, or `None` when refresh is disabled.
	pub fn presence_refresh(&self) -> Option<Duration> {
		(self.presence_refresh_secs > 0).then(|| Duration::from_secs(self.presence_refresh_secs))
	}
}

/// One subscription plan tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanConfig {
	/// Human-readable tier name shown when a mode is not entitled.
	pub display: String,
	/// Tier ordering; the lowest rank entitling a mode is reported as required.
	pub rank: u32,
	/// Modes this plan entitles.
	pub modes: Vec<AppMode>,
	/// Mode selected when a tenant has no valid stored mode.
	pub default_mode: AppMode,
}

fn default_plans() -> BTreeMap<String, PlanConfig> {
	let plan = |display: &str, rank, modes: &[AppMode]| PlanConfig {
		display: display.into(),
		rank,
		modes: modes.to_vec(),
		default_mode: AppMode::Crm,
	};
	BTreeMap::from([
		("basic".to_string(), plan("Basic", 0, &[AppMode::Crm])),
		("professional".to_string(), plan("Professional", 1, &[AppMode::Crm])),
		("enterprise".to_string(), plan("Enterprise", 2, &[AppMode::Crm, AppMode::Trade])),
	])
}
