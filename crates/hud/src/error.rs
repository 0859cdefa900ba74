use thiserror::Error;

use crate::node::NestId;

/// Error taxonomy for HUD operations.
///
/// Most failure modes in this engine are deliberately *not* errors:
/// orphaned nodes are pruned, malformed payloads decode as absent,
/// failing discovery sources contribute nothing. What remains here is
/// the small set of failures a caller can act on.
#[derive(Debug, Error)]
pub enum HudError {
	#[error(transparent)]
	Persist(#[from] sigil_persist::PersistError),
	/// An edit operation addressed a node that is not in the tree.
	#[error("no node at path {0}")]
	UnknownNode(NestId),
	/// An edit operation arrived before any build produced a tree.
	#[error("no tree has been built yet")]
	NoTree,
	/// An edit operation could not take the build slot: the in-flight
	/// rebuild held it past the wait ceiling. The edit was not applied;
	/// the caller may retry.
	#[error("a rebuild held the build slot past the wait ceiling")]
	Busy,
	/// A discovery source failed; carried only inside the source
	/// fan-out, never propagated out of a rebuild.
	#[error("discovery source {source_name} failed: {message}")]
	Discovery { source_name: String, message: String },
}
