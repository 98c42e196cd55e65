//! Asynchronous scope tracking for contract call trees.
//!
//! This crate attributes every tracked asynchronous operation to the root
//! call that originated it, so a value attached to the root stays readable
//! from any descendant operation, and releases per-root storage when the
//! root operation terminates.
//!
//! # Operation Hierarchy
//!
//! ```text
//! Root operation (opened by run_in_new_scope)
//!   ├─ tracked future (track)
//!   │   └─ spawned task (spawn)
//!   └─ timer (sleep)
//! ```
//!
//! Every descendant maps directly to the root id, never to its immediate
//! parent, so resolution is a single lookup regardless of depth.
//!
//! # Usage
//!
//! 1. Create one `ScopeTracker` and hand clones to whatever needs it.
//! 2. Open a scope with `run_in_new_scope_with` (or `run_in_new_scope`).
//! 3. Schedule work through `track`, `spawn` and `sleep` so it is observed.
//! 4. Read the root's value anywhere below with `ContextStore::get_as`.

pub mod error;
pub mod operation;
pub mod store;
pub mod tracker;

pub use error::{Result, ScopeError};
pub use operation::{current_op, OpId, Tracked};
pub use store::{ContextStore, ContextValue};
pub use tracker::ScopeTracker;
