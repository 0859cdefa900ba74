//! Sigil: a contextual action HUD engine.
//!
//! The host application owns entities, rendering, and raw storage.
//! This crate owns the hard part in between: a hierarchical
//! configuration tree of action groups merged from four layered
//! sources (system defaults, world-shared custom layout, per-user
//! overlay, per-entity overlay), kept consistent and
//! customization-preserving across high-frequency rebuild triggers.
//!
//! # Architecture
//!
//! - [`node`] / [`action`]: the tree data model. Nodes are addressed by
//!   path (`NestId`), never by object identity; actions derive their
//!   effective selection from persisted flags on every rebuild.
//! - [`reconciler`]: merges the four layers into one [`HudTree`] per
//!   rebuild, preserving every user edit that still has a valid anchor.
//! - [`registry`]: the rebuild-scoped candidate action universe and the
//!   selection reconciliation rules (`add_actions` / `update_actions`).
//! - [`scheduler`]: debounced, single-flight rebuild admission with a
//!   bounded wait for stragglers; at most one build ever runs.
//! - [`session`]: the top-level context object wiring triggers,
//!   discovery sources, persistence, and the renderer seam together.
//!
//! A full tree and registry are rebuilt from scratch on every accepted
//! trigger; only persisted scalar state carries forward.

pub mod action;
pub mod discovery;
pub mod error;
pub mod node;
pub mod notify;
pub mod reconciler;
pub mod registry;
pub mod scheduler;
pub mod session;

pub use action::{Action, ActionDelta, ActionInfo, DiscoveredAction};
pub use discovery::{ActionSource, DiscoveredGroup, EntityContext};
pub use error::HudError;
pub use node::{DisplaySettings, DisplayStyle, NestId, Node, NodeKind, NodeRecord, NodeSeed};
pub use notify::{Notice, NoticeLevel, NoticeQueue};
pub use reconciler::{HudTree, LayoutRecord};
pub use registry::{ActionRegistry, EditedEntry};
pub use scheduler::{Admission, BuildPhase, RebuildScheduler, SchedulerConfig};
pub use session::{BuildOutcome, HudRenderer, HudSession, HudSettings, HudTrigger};
