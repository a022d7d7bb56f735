//! Subscription entitlements and application mode switching.
//!
//! # Purpose
//!
//! - Own the tenant's subscription plan, active application mode and capability set.
//! - Decide mode switches and feature checks; the only I/O goes through [`SettingsStore`].
//!
//! # Mental model
//!
//! - [`SettingsStore`] returns an untrusted [`EntitlementRecord`].
//! - [`PlanCatalog`] says which modes each plan tier entitles and which tier a mode requires.
//! - [`Entitlements`] is a record validated against the catalog. It is the only form permission
//!   questions are answered from.
//! - [`EntitlementGate`] is a three-state machine ([`GateState`]) owned by the session context and
//!   mutated through `&mut self`. Observers read [`GateSnapshot`] values from [`EntitlementGate::subscribe`].
//!
//! # Key types
//!
//! | Type | Meaning | Constraints | Constructed / mutated in |
//! |---|---|---|---|
//! | [`EntitlementGate`] | Decision point for modes and capabilities | Must fail closed outside `Loaded` | [`EntitlementGate::load`], [`EntitlementGate::request_mode_switch`] |
//! | [`Entitlements`] | Validated record | `active_mode ∈ allowed_modes ⊆ plan.modes`, `allowed_modes` non-empty | `Entitlements::validate` |
//! | [`PlanCatalog`] | Plan id to [`PlanTier`] | Ids are case-insensitive | [`PlanCatalog::from_config`] |
//! | [`GateSnapshot`] | Published view of the gate | Republished after every state change | `EntitlementGate::publish` |
//!
//! # Invariants
//!
//! - `Uninitialized` and `Error` carry no permission data; every check answers `false`.
//! - A failed load discards entitlements from any earlier load.
//! - The active mode only takes values that were allowed at the time they were set.
//! - A refused mode switch never changes the active mode and never writes to storage.
//!
//! # Failure modes and recovery
//!
//! - Settings unreachable or malformed: gate enters `Error`. Recovery: [`EntitlementGate::reload`].
//! - Active-mode write rejected: the switch stays applied with `persisted: false`; the next load
//!   restores the stored mode.

#![cfg_attr(test, allow(unused_crate_dependencies))]

mod error;
mod gate;
mod plan;
mod record;
mod store;

pub use error::{ModeSwitchError, Result, SettingsError};
pub use gate::{EntitlementGate, GateSnapshot, GateState, ModeSwitched};
pub use plan::{PlanCatalog, PlanTier};
pub use record::{EntitlementRecord, Entitlements, SubscriptionStatus};
pub use store::{MemorySettingsStore, SettingsStore};
