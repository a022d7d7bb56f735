//! Error types for entitlement loading and mode switching.

use guildhall_primitives::{AppMode, TenantId};
use thiserror::Error;

/// Settings could not be loaded or saved.
///
/// Every variant is a settings-load failure from the gate's point of view: the
/// gate enters its error state and fails closed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
	/// The settings backend could not be reached.
	#[error("settings storage unreachable: {0}")]
	Unreachable(String),

	/// No settings exist for the tenant.
	#[error("no settings stored for tenant {0}")]
	NotFound(TenantId),

	/// The stored record is structurally wrong.
	#[error("malformed settings: {0}")]
	Malformed(String),

	/// The record names a plan missing from the plan catalog.
	#[error("unknown subscription plan: {0}")]
	UnknownPlan(String),

	/// No tenant is held: nothing was loaded, or the gate was reset on sign-out.
	#[error("no tenant is loaded")]
	NoTenant,

	/// After clamping to the plan, no mode is left to run in.
	#[error("plan '{plan}' leaves no allowed modes")]
	NoAllowedModes { plan: String },
}

/// A mode switch was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModeSwitchError {
	/// The tenant's plan does not cover the requested mode. An expected
	/// decision outcome; `required_plan` is shown to the user.
	#[error("{target} mode requires the {required_plan} plan")]
	NotEntitled { target: AppMode, required_plan: String },

	/// Entitlements are not loaded (never loaded, or the load failed).
	#[error("entitlements are not available")]
	GateUnavailable,
}

/// Result type for settings operations.
pub type Result<T, E = SettingsError> = std::result::Result<T, E>;
