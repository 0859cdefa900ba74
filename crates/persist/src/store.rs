use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ownership scope of a persisted layout blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
	/// Per-user overlay; lives for the user's lifetime.
	User,
	/// Per-entity overlay; destroyed when the entity's data is reset.
	Entity,
}

impl Scope {
	pub const fn as_str(self) -> &'static str {
		match self {
			Scope::User => "user",
			Scope::Entity => "entity",
		}
	}
}

/// Address of one persisted blob: scope plus the owning id
/// (user id for [`Scope::User`], entity id for [`Scope::Entity`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PersistKey {
	pub scope: Scope,
	pub id: String,
}

impl PersistKey {
	pub fn user(id: impl Into<String>) -> Self {
		Self { scope: Scope::User, id: id.into() }
	}

	pub fn entity(id: impl Into<String>) -> Self {
		Self { scope: Scope::Entity, id: id.into() }
	}
}

/// Errors crossing the persistence boundary.
#[derive(Debug, Error)]
pub enum PersistError {
	/// The substrate cannot serve this session at all (no privileged
	/// peer reachable, insufficient permission). Callers degrade to
	/// session-only in-memory layers.
	#[error("persistence unavailable: {reason}")]
	Unavailable { reason: String },
	/// A single read or write failed; the substrate is otherwise up.
	#[error("persistence backend error: {0}")]
	Backend(String),
	#[error("payload serialization failed")]
	Serialization(#[from] serde_json::Error),
}

/// Narrow contract the HUD core consumes for layout persistence.
///
/// Implementations must be idempotent per key: `save_data` followed by
/// `get_data` for the same key returns the saved payload. The core
/// issues writes only after an in-memory merge is complete, so an
/// implementation never sees interleaved partial writes for one key.
#[async_trait::async_trait]
pub trait PersistStore: Send + Sync {
	/// Fetches the stored payload for `key`, or `None` if absent.
	async fn get_data(&self, key: &PersistKey) -> Result<Option<serde_json::Value>, PersistError>;

	/// Stores `payload` under `key`, replacing any previous value.
	async fn save_data(&self, key: &PersistKey, payload: serde_json::Value) -> Result<(), PersistError>;

	/// Removes the payload stored under `key`, if any.
	async fn delete_data(&self, key: &PersistKey) -> Result<(), PersistError>;

	/// Whether the substrate can serve this session at all.
	///
	/// A `false` here is sticky for the session: the core notifies the
	/// user once and stops issuing writes.
	fn available(&self) -> bool {
		true
	}
}
