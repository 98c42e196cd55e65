//! Root tracking for asynchronous operation trees.
//!
//! The tracker keeps two maps: every tracked operation to its root, and
//! every root to the list of descendants attributed to it. A child always
//! stores the *resolved* root of its trigger, so lookups never walk a
//! parent chain. Descendants are only ever removed in bulk, when their
//! root's destroy notification arrives; a sibling may still need to resolve
//! its root after another descendant has finished.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::operation::{current_op, enter, OpId, SyncOperation, Tracked};
use crate::store::{ContextStore, ContextValue, ScopeSlot};

#[derive(Default)]
pub(crate) struct TrackerState {
    /// Operation id to resolved root id
    pub(crate) roots: HashMap<OpId, OpId>,
    /// Root id to descendant ids
    pub(crate) groups: HashMap<OpId, Vec<OpId>>,
    /// Root id to its context slot
    pub(crate) stores: HashMap<OpId, ScopeSlot>,
}

struct TrackerInner {
    enabled: AtomicBool,
    state: Mutex<TrackerState>,
}

/// Tracks which root every observed operation belongs to.
///
/// Cloning is cheap and every clone shares the same state. All mutation and
/// lookup happens under one mutex, so lifecycle notifications from
/// different worker threads stay atomic relative to each other.
#[derive(Clone)]
pub struct ScopeTracker {
    inner: Arc<TrackerInner>,
}

impl Default for ScopeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScopeTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeTracker")
            .field("enabled", &self.is_enabled())
            .field("tracked", &self.tracked_count())
            .field("open_roots", &self.open_roots())
            .finish()
    }
}

impl ScopeTracker {
    /// Create an enabled tracker with no open scopes.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                enabled: AtomicBool::new(true),
                state: Mutex::new(TrackerState::default()),
            }),
        }
    }

    /// Resume observing spawn notifications.
    pub fn enable(&self) {
        self.inner.enabled.store(true, Ordering::SeqCst);
    }

    /// Stop observing spawn notifications. Roots that are already open
    /// are still released when they terminate.
    pub fn disable(&self) {
        self.inner.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Disable the tracker and drop every mapping, group and context value.
    pub fn shutdown(&self) {
        self.disable();
        let released = self.with_state(std::mem::take);
        tracing::debug!(
            roots = released.stores.len(),
            tracked = released.roots.len(),
            "Scope tracker shut down"
        );
    }

    /// Handle to the context values of this tracker's scopes.
    pub fn store(&self) -> ContextStore {
        ContextStore::new(self.clone())
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut TrackerState) -> R) -> R {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        // A panic while holding the lock cannot leave the maps half-updated
        // in a way later lookups would misread, so poisoning is ignored.
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mark `op` as a self-mapped root and open its context slot.
    pub fn register_root(&self, op: OpId) {
        self.register_root_with(op, None);
    }

    fn register_root_with(&self, op: OpId, value: Option<ContextValue>) {
        let mut state = self.lock();
        if state.roots.contains_key(&op) {
            tracing::warn!(op = %op, "Operation is already tracked, not registering it as a root");
            return;
        }
        state.roots.insert(op, op);
        state.groups.insert(op, Vec::new());
        state.stores.insert(op, ScopeSlot::open(value));
        tracing::trace!(op = %op, "Scope opened");
    }

    /// Notification that `child` was scheduled while `trigger` was current.
    pub fn observe_spawn(&self, child: OpId, trigger: Option<OpId>) {
        if !self.is_enabled() {
            return;
        }
        let Some(trigger) = trigger else {
            return;
        };
        let mut state = self.lock();
        let Some(&root) = state.roots.get(&trigger) else {
            return;
        };
        state.roots.insert(child, root);
        state.groups.entry(root).or_default().push(child);
        tracing::trace!(op = %child, trigger = %trigger, root = %root, "Operation attributed");
    }

    /// Notification that `op` reached its terminal event.
    ///
    /// Only a root's destruction has an effect: every descendant mapping is
    /// removed, the group is dropped and the context slot is closed.
    pub fn observe_destroy(&self, op: OpId) {
        let (members, slot) = {
            let mut state = self.lock();
            match state.roots.get(&op) {
                Some(&root) if root == op => {}
                _ => return,
            }
            let members = state.groups.remove(&op).unwrap_or_default();
            for id in &members {
                state.roots.remove(id);
            }
            state.roots.remove(&op);
            (members, state.stores.remove(&op))
        };

        // The context value is dropped here, outside the lock.
        tracing::debug!(
            root = %op,
            descendants = members.len(),
            open_ms = slot.as_ref().map(ScopeSlot::age_ms).unwrap_or_default(),
            "Scope released"
        );
    }

    /// True when the current operation has no tracked root, meaning the
    /// caller is outermost and must open a fresh scope.
    pub fn is_new_scope(&self) -> bool {
        match current_op() {
            Some(op) => self.root_of(op).is_none(),
            None => true,
        }
    }

    /// Resolved root of `op`, if tracked.
    pub fn root_of(&self, op: OpId) -> Option<OpId> {
        self.lock().roots.get(&op).copied()
    }

    /// Root of the current operation, if any.
    pub fn current_root(&self) -> Option<OpId> {
        current_op().and_then(|op| self.root_of(op))
    }

    /// Number of operations currently mapped to a root (roots included).
    pub fn tracked_count(&self) -> usize {
        self.lock().roots.len()
    }

    /// Number of scopes that have not been released yet.
    pub fn open_roots(&self) -> usize {
        self.lock().stores.len()
    }

    /// Run `future` as a new root operation. The scope is released when the
    /// returned future completes or is dropped.
    pub fn run_in_new_scope<F: Future>(&self, future: F) -> Tracked<F> {
        self.open(None, future)
    }

    /// Like `run_in_new_scope`, with `value` attached to the new scope.
    pub fn run_in_new_scope_with<F: Future>(&self, value: ContextValue, future: F) -> Tracked<F> {
        self.open(Some(value), future)
    }

    fn open<F: Future>(&self, value: Option<ContextValue>, future: F) -> Tracked<F> {
        let id = OpId::next();
        self.register_root_with(id, value);
        Tracked::new(id, self.clone(), future)
    }

    /// Run `f` as a new synchronous root operation. The scope is released
    /// when `f` returns or unwinds.
    pub fn run_in_new_scope_sync<R>(&self, f: impl FnOnce() -> R) -> R {
        self.open_sync(None, f)
    }

    /// Like `run_in_new_scope_sync`, with `value` attached to the new scope.
    pub fn run_in_new_scope_sync_with<R>(&self, value: ContextValue, f: impl FnOnce() -> R) -> R {
        self.open_sync(Some(value), f)
    }

    fn open_sync<R>(&self, value: Option<ContextValue>, f: impl FnOnce() -> R) -> R {
        let id = OpId::next();
        self.register_root_with(id, value);
        let operation = SyncOperation::new(id, self.clone());
        enter(operation.id(), f)
    }

    /// Wrap `future` as a child of the current operation.
    ///
    /// The spawn notification fires now, at creation, exactly like a
    /// runtime hook would fire when the work is scheduled.
    pub fn track<F: Future>(&self, future: F) -> Tracked<F> {
        let id = OpId::next();
        self.observe_spawn(id, current_op());
        Tracked::new(id, self.clone(), future)
    }

    /// Spawn `future` on the tokio runtime as a tracked child of the current
    /// operation.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(self.track(future))
    }

    /// Tracked timer.
    pub async fn sleep(&self, duration: Duration) {
        self.track(tokio::time::sleep(duration)).await
    }
}
