//! Integration tests for dependencies requested from load phases.
//!
//! Covers:
//! - A parent stays `Loading` until a slow child is committed
//! - Child callbacks run before the parent commits
//! - Failure propagation under both dependency policies
//! - A child shared by several parents is loaded once

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{memory_source, scheduler_with, GatedParent, Manifest, Text};
use parking_lot::Mutex;
use prometheus_loader::core::{JobState, LoadError};
use prometheus_loader::{DependencyPolicy, LoaderConfig, LogicPath, MemorySource, Scheduler};

fn scheduler_with_policy(policy: DependencyPolicy, source: Arc<MemorySource>) -> Scheduler {
    common::init();
    Scheduler::builder(
        LoaderConfig::new()
            .with_worker_count(2)
            .with_dependency_policy(policy),
    )
    .with_source(source)
    .build()
    .unwrap()
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_parent_waits_for_late_child() {
    let scheduler = scheduler_with(2, memory_source(&[("child.txt", "late")]));
    let (open_gate, gate) = crossbeam_channel::unbounded();
    let order = Arc::new(Mutex::new(Vec::new()));

    let parent = scheduler
        .submit(
            "parent",
            GatedParent {
                child_gate: gate,
                order: Arc::clone(&order),
            },
        )
        .unwrap();

    wait_until(|| order.lock().contains(&"parent load returned"));
    let child_aspect = scheduler
        .registry()
        .aspect::<String>(&LogicPath::new("child.txt"))
        .unwrap();
    let child = child_aspect.active_job().unwrap();

    for _ in 0..3 {
        scheduler.finalize_pending();
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(parent.state(), JobState::Loading);
    assert!(child.state() < JobState::Ready);
    assert!(!parent.wait_timeout(Duration::from_millis(10)));

    open_gate.send(()).unwrap();
    scheduler.wait_for(&parent);

    assert_eq!(child.state(), JobState::Committed);
    assert_eq!(child_aspect.get().unwrap().as_str(), "late");
    assert_eq!(
        *order.lock(),
        vec!["parent load returned", "child done", "parent commit"]
    );
    assert!(parent.is_successful());
}

#[test]
fn test_manifest_sees_every_child_at_commit() {
    let source = memory_source(&[
        ("ui/theme.list", "colors.txt\n../fonts/mono.fnt\n/shared/icons.txt"),
        ("ui/colors.txt", "red"),
        ("fonts/mono.fnt", "mono"),
        ("shared/icons.txt", "icons"),
    ]);
    let scheduler = scheduler_with(3, source);
    let manifest = Manifest::new();
    let seen = Arc::clone(&manifest.seen_at_commit);

    let job = scheduler.submit("ui/theme.list", manifest).unwrap();
    scheduler.wait_all();

    assert!(job.is_successful());
    assert_eq!(*seen.lock(), Some(3));
    let aspect = scheduler
        .registry()
        .aspect::<Vec<String>>(job.path())
        .unwrap();
    let mut children = (*aspect.get().unwrap()).clone();
    children.sort();
    assert_eq!(children, vec!["icons", "mono", "red"]);
}

#[test]
fn test_failed_child_fails_parent_by_default() {
    let source = memory_source(&[("list.txt", "a.txt\nmissing.txt"), ("a.txt", "alpha")]);
    let scheduler = scheduler_with_policy(DependencyPolicy::Propagate, source);
    let manifest = Manifest::new();
    let seen = Arc::clone(&manifest.seen_at_commit);

    let parent = scheduler.submit("list.txt", manifest).unwrap();
    scheduler.wait_all();

    assert_eq!(parent.state(), JobState::Committed);
    assert!(!parent.is_successful());
    match parent.failure().as_deref() {
        Some(LoadError::Dependency { path, .. }) => assert_eq!(path.as_str(), "/missing.txt"),
        other => panic!("expected a dependency failure, got {other:?}"),
    }
    // Commit is skipped for a failed job.
    assert_eq!(*seen.lock(), None);
    let aspect = scheduler
        .registry()
        .aspect::<Vec<String>>(parent.path())
        .unwrap();
    assert!(!aspect.is_valid());

    let child = scheduler
        .registry()
        .aspect::<String>(&LogicPath::new("missing.txt"))
        .unwrap();
    assert!(!child.is_valid());
    assert_eq!(scheduler.stats().failed_jobs, 2);
}

#[test]
fn test_isolated_parent_ignores_failed_child() {
    let source = memory_source(&[("list.txt", "a.txt\nmissing.txt"), ("a.txt", "alpha")]);
    let scheduler = scheduler_with_policy(DependencyPolicy::Isolate, source);
    let manifest = Manifest::new();
    let seen = Arc::clone(&manifest.seen_at_commit);

    let parent = scheduler.submit("list.txt", manifest).unwrap();
    scheduler.wait_all();

    assert!(parent.is_successful());
    assert_eq!(*seen.lock(), Some(1));
    let aspect = scheduler
        .registry()
        .aspect::<Vec<String>>(parent.path())
        .unwrap();
    assert_eq!(aspect.get().unwrap().as_slice(), ["alpha".to_owned()]);
}

#[test]
fn test_shared_child_is_loaded_once() {
    let source = memory_source(&[
        ("one.list", "common.txt"),
        ("two.list", "common.txt"),
        ("common.txt", "shared"),
    ]);
    let scheduler = scheduler_with(2, source);

    let one = scheduler.submit("one.list", Manifest::new()).unwrap();
    let two = scheduler.submit("two.list", Manifest::new()).unwrap();
    scheduler.wait_all();

    assert!(one.is_successful());
    assert!(two.is_successful());
    // Two manifests, and the common child once or twice (a second request
    // after its commit gets a placeholder).
    let submitted = scheduler.stats().submitted_jobs;
    assert!((3..=4).contains(&submitted), "submitted {submitted}");
    for job in [&one, &two] {
        let aspect = scheduler
            .registry()
            .aspect::<Vec<String>>(job.path())
            .unwrap();
        assert_eq!(aspect.get().unwrap().as_slice(), ["shared".to_owned()]);
    }
}

#[test]
fn test_dependency_on_already_loaded_child() {
    let source = memory_source(&[("list.txt", "a.txt"), ("a.txt", "alpha")]);
    let scheduler = scheduler_with(1, source);
    scheduler.submit("a.txt", Text).unwrap();
    scheduler.wait_all();

    let parent = scheduler.submit("list.txt", Manifest::new()).unwrap();
    scheduler.wait_all();

    let aspect = scheduler
        .registry()
        .aspect::<Vec<String>>(parent.path())
        .unwrap();
    assert_eq!(aspect.get().unwrap().as_slice(), ["alpha".to_owned()]);
}
