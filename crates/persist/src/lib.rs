//! Persistence boundary for the Sigil HUD engine.
//!
//! The HUD core never talks to the host's storage substrate (files,
//! document flags, privileged network peers) directly. It consumes a
//! narrow `get/save data for (scope, id)` contract, expressed here as
//! [`PersistStore`]. Implementations live with the host; this crate
//! ships only the contract, the error taxonomy, a lenient payload
//! decoder, and [`MemoryStore`] for tests and session-only degradation.
//!
//! # Failure policy
//!
//! Saves are never retried automatically. A failed save is the caller's
//! problem to surface; the in-memory tree remains the source of truth
//! until the next successful save or rebuild. Malformed stored payloads
//! decode as absent data, never as errors.

mod codec;
mod memory;
mod store;

pub use codec::decode_lenient;
pub use memory::MemoryStore;
pub use store::{PersistError, PersistKey, PersistStore, Scope};
