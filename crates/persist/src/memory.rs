use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::store::{PersistError, PersistKey, PersistStore};

/// In-memory [`PersistStore`].
///
/// Backs two things: tests, and session-only degradation when the real
/// substrate reports itself unavailable (the core swaps one of these in
/// so user edits survive at least until the session ends).
#[derive(Default)]
pub struct MemoryStore {
	blobs: Mutex<FxHashMap<PersistKey, serde_json::Value>>,
	unavailable: AtomicBool,
	fail_saves: AtomicBool,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes `available()` report `false` (test hook).
	pub fn set_unavailable(&self, unavailable: bool) {
		self.unavailable.store(unavailable, Ordering::Release);
	}

	/// Makes every subsequent `save_data` fail (test hook).
	pub fn set_fail_saves(&self, fail: bool) {
		self.fail_saves.store(fail, Ordering::Release);
	}

	/// Direct snapshot of a stored blob, bypassing the async contract.
	pub fn peek(&self, key: &PersistKey) -> Option<serde_json::Value> {
		self.blobs.lock().get(key).cloned()
	}

	/// Seeds a blob directly (test hook).
	pub fn put(&self, key: PersistKey, payload: serde_json::Value) {
		self.blobs.lock().insert(key, payload);
	}
}

#[async_trait::async_trait]
impl PersistStore for MemoryStore {
	async fn get_data(&self, key: &PersistKey) -> Result<Option<serde_json::Value>, PersistError> {
		Ok(self.blobs.lock().get(key).cloned())
	}

	async fn save_data(&self, key: &PersistKey, payload: serde_json::Value) -> Result<(), PersistError> {
		if self.fail_saves.load(Ordering::Acquire) {
			return Err(PersistError::Backend("simulated save failure".into()));
		}
		self.blobs.lock().insert(key.clone(), payload);
		Ok(())
	}

	async fn delete_data(&self, key: &PersistKey) -> Result<(), PersistError> {
		self.blobs.lock().remove(key);
		Ok(())
	}

	fn available(&self) -> bool {
		!self.unavailable.load(Ordering::Acquire)
	}
}
