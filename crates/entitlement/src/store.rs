//! Settings storage contract and an in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use guildhall_primitives::{AppMode, TenantId};
use parking_lot::Mutex;

use crate::record::EntitlementRecord;
use crate::{Result, SettingsError};

/// Settings storage owned by the backend.
#[async_trait]
pub trait SettingsStore: Send + Sync {
	/// Loads the entitlement record stored for `tenant`.
	async fn load_settings(&self, tenant: &TenantId) -> Result<EntitlementRecord>;

	/// Persists the active mode so the next load restores it.
	async fn save_active_mode(&self, tenant: &TenantId, mode: AppMode) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryState {
	records: HashMap<TenantId, EntitlementRecord>,
	unreachable: bool,
	fail_saves: bool,
	saves: usize,
}

/// Process-local settings store.
///
/// Backs tests and the simulator. Failure switches model an unreachable
/// backend for loads and saves independently.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
	state: Mutex<MemoryState>,
}

impl MemorySettingsStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts or replaces the record for its tenant.
	pub fn insert(&self, record: EntitlementRecord) {
		self.state.lock().records.insert(record.tenant_id.clone(), record);
	}

	pub fn record(&self, tenant: &TenantId) -> Option<EntitlementRecord> {
		self.state.lock().records.get(tenant).cloned()
	}

	/// Makes every subsequent load fail with [`SettingsError::Unreachable`].
	pub fn set_unreachable(&self, unreachable: bool) {
		self.state.lock().unreachable = unreachable;
	}

	/// Makes every subsequent save fail with [`SettingsError::Unreachable`].
	pub fn set_fail_saves(&self, fail: bool) {
		self.state.lock().fail_saves = fail;
	}

	/// Number of successful active-mode saves.
	pub fn save_count(&self) -> usize {
		self.state.lock().saves
	}
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
	async fn load_settings(&self, tenant: &TenantId) -> Result<EntitlementRecord> {
		let state = self.state.lock();
		if state.unreachable {
			return Err(SettingsError::Unreachable("memory store offline".into()));
		}
		state.records.get(tenant).cloned().ok_or_else(|| SettingsError::NotFound(tenant.clone()))
	}

	async fn save_active_mode(&self, tenant: &TenantId, mode: AppMode) -> Result<()> {
		let mut state = self.state.lock();
		if state.fail_saves {
			return Err(SettingsError::Unreachable("memory store rejected write".into()));
		}
		let record = state.records.get_mut(tenant).ok_or_else(|| SettingsError::NotFound(tenant.clone()))?;
		record.active_mode = Some(mode);
		state.saves += 1;
		Ok(())
	}
}
