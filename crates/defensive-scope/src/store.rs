//! Per-root context storage.
//!
//! Each open root owns one slot. The slot is created when the scope opens
//! and dropped by the tracker in the same critical section that releases
//! the root's mappings.

use std::any::{type_name, Any};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{Result, ScopeError};
use crate::operation::{current_op, OpId};
use crate::tracker::ScopeTracker;

/// Opaque value attached to a root scope.
pub type ContextValue = Arc<dyn Any + Send + Sync>;

/// Storage slot of one open root.
pub(crate) struct ScopeSlot {
    pub(crate) value: Option<ContextValue>,
    pub(crate) opened_at: DateTime<Utc>,
}

impl ScopeSlot {
    pub(crate) fn open(value: Option<ContextValue>) -> Self {
        Self {
            value,
            opened_at: Utc::now(),
        }
    }

    /// Milliseconds since the scope opened.
    pub(crate) fn age_ms(&self) -> u64 {
        (Utc::now() - self.opened_at).num_milliseconds().max(0) as u64
    }
}

/// Handle to the context values of a tracker's open scopes.
#[derive(Clone)]
pub struct ContextStore {
    tracker: ScopeTracker,
}

impl ContextStore {
    pub(crate) fn new(tracker: ScopeTracker) -> Self {
        Self { tracker }
    }

    /// Associate `value` with an open root. Last write wins.
    pub fn set<T: Any + Send + Sync>(&self, root: OpId, value: T) -> Result<()> {
        self.set_value(root, Arc::new(value))
    }

    /// Associate an already shared value with an open root.
    pub fn set_value(&self, root: OpId, value: ContextValue) -> Result<()> {
        self.tracker.with_state(|state| match state.stores.get_mut(&root) {
            Some(slot) => {
                slot.value = Some(value);
                Ok(())
            }
            None => Err(ScopeError::UnknownRoot(root)),
        })
    }

    /// Value of the root the current operation belongs to.
    pub fn get(&self) -> Result<ContextValue> {
        let op = current_op().ok_or(ScopeError::NoContext)?;
        self.tracker.with_state(|state| {
            let root = state.roots.get(&op).ok_or(ScopeError::NoContext)?;
            state
                .stores
                .get(root)
                .and_then(|slot| slot.value.clone())
                .ok_or(ScopeError::NoContext)
        })
    }

    /// Typed variant of `get`.
    pub fn get_as<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        self.get()?
            .downcast::<T>()
            .map_err(|_| ScopeError::ContextType {
                expected: type_name::<T>(),
            })
    }
}
