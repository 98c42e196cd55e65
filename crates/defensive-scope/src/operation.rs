//! Operations: the unit of scheduled work the tracker observes.
//!
//! An operation is either a `Tracked` future or a synchronous root section.
//! The id of the operation being polled is kept in a task-local, which is
//! how the tracker answers "who is running right now".

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use crate::tracker::ScopeTracker;

static NEXT_OP_ID: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    static CURRENT_OP: OpId;
}

/// Process-unique, monotonic operation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(u64);

impl OpId {
    /// Allocate the next id.
    pub(crate) fn next() -> Self {
        OpId(NEXT_OP_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw id. Only meaningful for ids previously read with `as_u64`.
    pub fn from_raw(raw: u64) -> Self {
        OpId(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Id of the operation currently executing, if any.
pub fn current_op() -> Option<OpId> {
    CURRENT_OP.try_with(|id| *id).ok()
}

/// Run `f` with `id` as the current operation.
pub(crate) fn enter<R>(id: OpId, f: impl FnOnce() -> R) -> R {
    CURRENT_OP.sync_scope(id, f)
}

/// A future observed by a `ScopeTracker`.
///
/// Every poll runs with this operation as the current one. The destroy
/// notification fires once: on completion, or on drop if the future never
/// completed.
#[must_use = "futures do nothing unless polled"]
pub struct Tracked<F> {
    id: OpId,
    tracker: ScopeTracker,
    future: Pin<Box<F>>,
    finished: bool,
}

impl<F> Tracked<F> {
    pub(crate) fn new(id: OpId, tracker: ScopeTracker, future: F) -> Self {
        Self {
            id,
            tracker,
            future: Box::pin(future),
            finished: false,
        }
    }

    /// Id of this operation.
    pub fn id(&self) -> OpId {
        self.id
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.tracker.observe_destroy(self.id);
        }
    }
}

impl<F: Future> Future for Tracked<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let future = &mut this.future;
        let poll = enter(this.id, || future.as_mut().poll(cx));
        if poll.is_ready() {
            this.finish();
        }
        poll
    }
}

impl<F> Drop for Tracked<F> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Synchronous counterpart of `Tracked`: fires destroy when dropped, so a
/// panicking root section still releases its scope.
pub(crate) struct SyncOperation {
    id: OpId,
    tracker: ScopeTracker,
}

impl SyncOperation {
    pub(crate) fn new(id: OpId, tracker: ScopeTracker) -> Self {
        Self { id, tracker }
    }

    pub(crate) fn id(&self) -> OpId {
        self.id
    }
}

impl Drop for SyncOperation {
    fn drop(&mut self) {
        self.tracker.observe_destroy(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let a = OpId::next();
        let b = OpId::next();
        assert!(b > a);
    }

    #[test]
    fn test_no_current_op_outside_operation() {
        assert_eq!(current_op(), None);
    }

    #[test]
    fn test_enter_sets_and_restores_current() {
        let outer = OpId::next();
        let inner = OpId::next();
        enter(outer, || {
            assert_eq!(current_op(), Some(outer));
            enter(inner, || assert_eq!(current_op(), Some(inner)));
            assert_eq!(current_op(), Some(outer));
        });
        assert_eq!(current_op(), None);
    }

    #[tokio::test]
    async fn test_tracked_future_sees_its_own_id() {
        let tracker = ScopeTracker::new();
        let op = tracker.track(async { current_op() });
        let id = op.id();
        assert_eq!(op.await, Some(id));
    }
}
