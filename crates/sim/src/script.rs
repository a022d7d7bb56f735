//! Simulation scripts.
//!
//! A script is JSON lines, one [`Step`] per line, tagged by `"step"`. Blank
//! lines and lines starting with `#` are skipped.

use guildhall_entitlement::EntitlementRecord;
use guildhall_primitives::{AppMode, TenantId, Topic, UserId};
use guildhall_realtime::PresenceMessage;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Script replayed when no `--script` is given.
pub const DEMO: &str = r##"# enterprise tenant with both modes
{"step":"seed","tenant_id":"acme","subscription_plan":"enterprise","subscription_status":"active","access_permissions":["marketing"],"allowed_modes":["crm","trade"]}
{"step":"seed","tenant_id":"globex","subscription_plan":"basic","subscription_status":"active","allowed_modes":["crm"]}
{"step":"sign_in","tenant":"acme","user":"u-1"}
{"step":"publish","topic":"events","payload":{"eventType":"INSERT","new":{"id":"ev-1","name":"Spring gala"}}}
{"step":"publish","topic":"events","payload":{"eventType":"INSERT","new":{"id":"ev-1","name":"Spring gala"}}}
{"step":"publish","topic":"event_registrations","payload":{"eventType":"INSERT","new":{"id":42,"event_id":"ev-1"}}}
{"step":"publish","topic":"notifications","payload":{"eventType":"INSERT","new":{"id":"n-1","title":"Welcome aboard","target_user_id":"u-1"}}}
{"step":"publish","topic":"members","payload":{"eventType":"not-a-change"}}
{"step":"presence","message":{"event":"join","payload":{"user_id":"u-2","online_at":"2026-01-01T09:00:00Z"}}}
{"step":"switch_mode","mode":"trade"}
{"step":"refetch","key":"events:acme"}
{"step":"reconnect"}
{"step":"sign_in","tenant":"globex","user":"u-1"}
{"step":"switch_mode","mode":"trade"}
{"step":"sign_out"}
"##;

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
	/// Stores tenant settings.
	Seed(EntitlementRecord),
	SignIn { tenant: TenantId, user: UserId },
	SignOut,
	/// Delivers a raw change record on `topic`.
	Publish { topic: Topic, payload: Value },
	Presence { message: PresenceMessage },
	SwitchMode { mode: AppMode },
	/// Reloads settings for the signed-in tenant.
	Reload,
	/// Marks a partition fresh again, as a refetch would.
	Refetch { key: String },
	/// Drops the transport connection and re-establishes it.
	Reconnect,
	/// Pauses for `ms` milliseconds.
	Wait { ms: u64 },
}

impl Step {
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Seed(_) => "seed",
			Self::SignIn { .. } => "sign_in",
			Self::SignOut => "sign_out",
			Self::Publish { .. } => "publish",
			Self::Presence { .. } => "presence",
			Self::SwitchMode { .. } => "switch_mode",
			Self::Reload => "reload",
			Self::Refetch { .. } => "refetch",
			Self::Reconnect => "reconnect",
			Self::Wait { .. } => "wait",
		}
	}
}

#[derive(Debug, Error)]
#[error("script line {line}: {source}")]
pub struct ScriptError {
	pub line: usize,
	#[source]
	pub source: serde_json::Error,
}

/// Parses a JSON-lines script.
pub fn parse(input: &str) -> Result<Vec<Step>, ScriptError> {
	input
		.lines()
		.enumerate()
		.map(|(index, line)| (index + 1, line.trim()))
		.filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
		.map(|(line, text)| serde_json::from_str(text).map_err(|source| ScriptError { line, source }))
		.collect()
}
