//! Action discovery extension point.
//!
//! Discovery plugins implement [`ActionSource`] and are registered as
//! an explicit list on the session; the fan-out invokes them by plain
//! iteration, in parallel, with per-source failure isolation. A source
//! that fails contributes nothing and never aborts the others.

use futures::future::join_all;

use crate::action::DiscoveredAction;
use crate::error::HudError;
use crate::node::NestId;

/// The entity the HUD is currently describing. Opaque to the engine
/// beyond its id; `system` is whatever the host's sources need.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityContext {
	pub entity_id: String,
	pub name: Option<String>,
	pub system: serde_json::Value,
}

impl EntityContext {
	pub fn new(entity_id: impl Into<String>) -> Self {
		Self {
			entity_id: entity_id.into(),
			name: None,
			system: serde_json::Value::Null,
		}
	}
}

/// Candidate actions grouped under a target node path.
///
/// If `nest` names a node missing from the seeded tree but whose parent
/// exists, the build creates it as a system-derived node named `name`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredGroup {
	pub nest: NestId,
	pub name: String,
	pub actions: Vec<DiscoveredAction>,
}

/// Capability interface for candidate-action producers.
///
/// Implementations must be idempotent: called twice with the same
/// context they return the same candidates.
#[async_trait::async_trait]
pub trait ActionSource: Send + Sync {
	/// Short identifier used in logs.
	fn name(&self) -> &str;

	async fn extend_candidate_actions(
		&self,
		ctx: &EntityContext,
	) -> Result<Vec<DiscoveredGroup>, HudError>;
}

/// Runs every source against `ctx` in parallel and flattens the
/// contributions. Source failures are logged at debug level and yield
/// an empty contribution.
pub async fn discover_all(
	sources: &[std::sync::Arc<dyn ActionSource>],
	ctx: &EntityContext,
) -> Vec<DiscoveredGroup> {
	let futures = sources.iter().map(|source| async move {
		match source.extend_candidate_actions(ctx).await {
			Ok(groups) => groups,
			Err(err) => {
				tracing::debug!(source = source.name(), %err, "discovery source failed, contributing nothing");
				Vec::new()
			}
		}
	});

	join_all(futures).await.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;

	struct Fixed(Vec<DiscoveredGroup>);

	#[async_trait::async_trait]
	impl ActionSource for Fixed {
		fn name(&self) -> &str {
			"fixed"
		}

		async fn extend_candidate_actions(
			&self,
			_ctx: &EntityContext,
		) -> Result<Vec<DiscoveredGroup>, HudError> {
			Ok(self.0.clone())
		}
	}

	struct Failing;

	#[async_trait::async_trait]
	impl ActionSource for Failing {
		fn name(&self) -> &str {
			"failing"
		}

		async fn extend_candidate_actions(
			&self,
			_ctx: &EntityContext,
		) -> Result<Vec<DiscoveredGroup>, HudError> {
			Err(HudError::Discovery {
				source_name: "failing".into(),
				message: "boom".into(),
			})
		}
	}

	#[tokio::test]
	async fn test_failing_source_does_not_abort_others() {
		let group = DiscoveredGroup {
			nest: NestId::root("combat"),
			name: "Combat".into(),
			actions: vec![DiscoveredAction::new("a1", "Attack")],
		};
		let sources: Vec<Arc<dyn ActionSource>> =
			vec![Arc::new(Failing), Arc::new(Fixed(vec![group.clone()]))];

		let found = discover_all(&sources, &EntityContext::new("e1")).await;
		assert_eq!(found, vec![group]);
	}
}
