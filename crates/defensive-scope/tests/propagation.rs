//! Integration tests for context propagation across tracked operations
//!
//! Covers:
//! - Context visibility through nested futures, spawned tasks and timers
//! - Isolation between concurrently running roots
//! - Release of the scope when the root terminates

use std::sync::Arc;
use std::time::Duration;

use defensive_scope::{ScopeError, ScopeTracker};

#[derive(Debug, Clone, PartialEq)]
struct RequestContext {
    user: String,
}

fn ctx(user: &str) -> Arc<RequestContext> {
    Arc::new(RequestContext {
        user: user.to_string(),
    })
}

fn current_user(tracker: &ScopeTracker) -> Result<String, ScopeError> {
    tracker
        .store()
        .get_as::<RequestContext>()
        .map(|c| c.user.clone())
}

#[tokio::test]
async fn test_context_visible_in_deep_descendants() {
    let tracker = ScopeTracker::new();
    let t = tracker.clone();

    let user = tracker
        .run_in_new_scope_with(ctx("alice"), async move {
            let t2 = t.clone();
            let handle = t.spawn(async move {
                t2.sleep(Duration::from_millis(2)).await;
                let t3 = t2.clone();
                t2.track(async move { current_user(&t3) }).await
            });
            handle.await.expect("task panicked")
        })
        .await;

    assert_eq!(user, Ok("alice".to_string()));
    assert_eq!(tracker.open_roots(), 0);
}

#[tokio::test]
async fn test_concurrent_roots_are_isolated() {
    let tracker = ScopeTracker::new();

    let run = |name: &'static str, delay: u64| {
        let t = tracker.clone();
        tokio::spawn(tracker.run_in_new_scope_with(ctx(name), async move {
            let mut seen = Vec::new();
            for _ in 0..3 {
                t.sleep(Duration::from_millis(delay)).await;
                seen.push(current_user(&t).expect("context missing"));
            }
            seen
        }))
    };

    let a = run("alice", 1);
    let b = run("bob", 2);
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    assert!(a.iter().all(|u| u == "alice"));
    assert!(b.iter().all(|u| u == "bob"));
    assert_eq!(tracker.open_roots(), 0);
}

#[tokio::test]
async fn test_untracked_work_sees_no_context() {
    let tracker = ScopeTracker::new();
    let t = tracker.clone();

    let result = tracker
        .run_in_new_scope_with(ctx("alice"), async move {
            let t2 = t.clone();
            // A plain tokio::spawn is invisible to the tracker.
            tokio::spawn(async move { current_user(&t2) })
                .await
                .unwrap()
        })
        .await;

    assert_eq!(result, Err(ScopeError::NoContext));
}

#[tokio::test]
async fn test_descendant_outliving_root_loses_context() {
    let tracker = ScopeTracker::new();
    let t = tracker.clone();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let straggler = tracker
        .run_in_new_scope_with(ctx("alice"), async move {
            let t2 = t.clone();
            t.spawn(async move {
                let _ = rx.await;
                current_user(&t2)
            })
        })
        .await;

    // Root finished: its scope is gone even though the child still runs.
    assert_eq!(tracker.open_roots(), 0);
    tx.send(()).unwrap();
    assert_eq!(straggler.await.unwrap(), Err(ScopeError::NoContext));
    assert_eq!(tracker.tracked_count(), 0);
}

#[tokio::test]
async fn test_wide_fan_out_shares_one_root() {
    let tracker = ScopeTracker::new();
    let t = tracker.clone();

    let roots = tracker
        .run_in_new_scope(async move {
            let handles: Vec<_> = (0..50)
                .map(|_| {
                    let t2 = t.clone();
                    t.spawn(async move { t2.current_root() })
                })
                .collect();
            let root = t.current_root();
            let children = futures::future::join_all(handles).await;
            (root, children)
        })
        .await;

    let (root, children) = roots;
    assert!(root.is_some());
    assert!(children.into_iter().all(|c| c.unwrap() == root));
}
