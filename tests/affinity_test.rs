//! Integration tests for thread-affine loads, synchronous loads and reloads.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use common::{memory_source, scheduler_with, GatedText, Manifest, Text, ThreadLog, TracedText};
use parking_lot::Mutex;
use prometheus_loader::core::{Affinity, JobState, LoadContext, LoadError};
use prometheus_loader::{JobKind, LogicPath, SchedulerError};

fn affine(log: &ThreadLog) -> TracedText {
    TracedText {
        log: Arc::clone(log),
        affinity: Affinity::DesignatedThread,
    }
}

/// Worker-side load that requests a thread-affine child.
struct NeedsAffineChild {
    log: ThreadLog,
}

impl JobKind for NeedsAffineChild {
    type Output = String;
    type Staged = ();

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<(), LoadError> {
        ctx.request("gl/shader.txt", affine(&self.log), |_| {})?;
        Ok(())
    }

    fn commit(&mut self, (): ()) -> Result<String, LoadError> {
        Ok("material".to_owned())
    }
}

// ============================================================================
// THREAD-AFFINE LOADS
// ============================================================================

#[test]
fn test_affine_submit_on_designated_thread_loads_inline() {
    let scheduler = scheduler_with(2, memory_source(&[("gl/shader.txt", "void main() {}")]));
    let log: ThreadLog = Arc::new(Mutex::new(Vec::new()));

    let job = scheduler.submit("gl/shader.txt", affine(&log)).unwrap();

    assert_eq!(job.affinity(), Affinity::DesignatedThread);
    assert_eq!(job.state(), JobState::Ready);
    assert_eq!(scheduler.queued_len(), 0);
    assert_eq!(log.lock()[0].2, thread::current().id());

    scheduler.wait_all();
    assert!(job.is_successful());
}

#[test]
fn test_affine_submit_from_worker_side_never_touches_work_queue() {
    let scheduler = scheduler_with(2, memory_source(&[("gl/shader.txt", "void main() {}")]));
    let log: ThreadLog = Arc::new(Mutex::new(Vec::new()));

    let handle = scheduler.handle().clone();
    let remote_log = Arc::clone(&log);
    let job = thread::spawn(move || handle.submit("gl/shader.txt", affine(&remote_log)).unwrap())
        .join()
        .unwrap();

    assert_eq!(job.state(), JobState::Queued);
    assert_eq!(scheduler.queued_len(), 0);
    assert!(log.lock().is_empty());

    scheduler.wait_all();

    let designated = thread::current().id();
    assert!(job.is_successful());
    assert!(log.lock().iter().all(|(_, _, id)| *id == designated));
}

#[test]
fn test_affine_child_of_worker_load_runs_on_designated_thread() {
    let scheduler = scheduler_with(
        2,
        memory_source(&[("gl/shader.txt", "void main() {}"), ("material", "")]),
    );
    let log: ThreadLog = Arc::new(Mutex::new(Vec::new()));

    let parent = scheduler
        .submit(
            "material",
            NeedsAffineChild {
                log: Arc::clone(&log),
            },
        )
        .unwrap();
    scheduler.wait_all();

    assert!(parent.is_successful());
    let designated = thread::current().id();
    let log = log.lock();
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|(_, _, id)| *id == designated));
}

// ============================================================================
// SYNCHRONOUS LOADS
// ============================================================================

#[test]
fn test_submit_sync_on_designated_thread_commits() {
    let source = memory_source(&[("list.txt", "a.txt\nb.txt"), ("a.txt", "alpha"), ("b.txt", "beta")]);
    let scheduler = scheduler_with(1, source);
    let queued_before = scheduler.queued_len();

    let job = scheduler.submit_sync("list.txt", Manifest::new()).unwrap();

    assert_eq!(job.state(), JobState::Committed);
    assert!(job.is_successful());
    let aspect = scheduler
        .registry()
        .aspect::<Vec<String>>(job.path())
        .unwrap();
    assert_eq!(aspect.get().unwrap().len(), 2);
    assert_eq!(scheduler.queued_len(), queued_before);
    assert_eq!(scheduler.stats().outstanding_jobs, 0);
}

#[test]
fn test_submit_sync_affine_on_designated_thread() {
    let scheduler = scheduler_with(1, memory_source(&[("gl/shader.txt", "void main() {}")]));
    let log: ThreadLog = Arc::new(Mutex::new(Vec::new()));

    let job = scheduler.submit_sync("gl/shader.txt", affine(&log)).unwrap();

    assert_eq!(job.state(), JobState::Committed);
    assert_eq!(log.lock().len(), 2);
}

#[test]
fn test_submit_sync_off_thread_stops_at_ready() {
    let scheduler = scheduler_with(1, memory_source(&[("a.txt", "alpha")]));
    let handle = scheduler.handle().clone();

    let job = thread::spawn(move || handle.submit_sync("a.txt", Text).unwrap())
        .join()
        .unwrap();
    assert_eq!(job.state(), JobState::Ready);

    scheduler.wait_all();
    assert_eq!(job.state(), JobState::Committed);
    assert!(job.is_successful());
}

#[test]
fn test_submit_sync_affine_off_thread_is_refused() {
    let scheduler = scheduler_with(1, memory_source(&[("gl/shader.txt", "")]));
    let handle = scheduler.handle().clone();
    let log: ThreadLog = Arc::new(Mutex::new(Vec::new()));

    let result = thread::spawn(move || handle.submit_sync("gl/shader.txt", affine(&log)))
        .join()
        .unwrap();
    assert!(matches!(result, Err(SchedulerError::ThreadAffinity { .. })));
}

#[test]
fn test_submit_sync_on_busy_aspect_is_refused() {
    let scheduler = scheduler_with(1, memory_source(&[("a.txt", "alpha")]));
    let (open_gate, gate) = crossbeam_channel::unbounded();
    let background = scheduler.submit("a.txt", GatedText { gate }).unwrap();

    let result = scheduler.submit_sync("a.txt", Text);
    assert!(matches!(result, Err(SchedulerError::AspectBusy { .. })));

    drop(open_gate);
    scheduler.wait_all();
    assert!(background.is_successful());
}

/// Load phase that itself loads another aspect synchronously.
struct SyncFromWorker;

impl JobKind for SyncFromWorker {
    type Output = String;
    type Staged = ();

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<(), LoadError> {
        let inner = ctx
            .scheduler()
            .submit_sync("inner.list", Manifest::new())
            .map_err(|e| e.into_load_error(ctx.path()))?;
        assert!(!inner.is_placeholder());
        Ok(())
    }

    fn commit(&mut self, (): ()) -> Result<String, LoadError> {
        Ok("outer".to_owned())
    }
}

/// Text load that counts how often its load phase runs.
struct Counting {
    loads: Arc<AtomicUsize>,
}

impl JobKind for Counting {
    type Output = String;
    type Staged = String;

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<String, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        ctx.read_to_string()
    }

    fn commit(&mut self, staged: String) -> Result<String, LoadError> {
        Ok(staged)
    }
}

#[test]
fn test_submit_sync_from_worker_does_not_block_pool() {
    let source = memory_source(&[("inner.list", "leaf.txt"), ("leaf.txt", "leaf")]);
    let scheduler = scheduler_with(1, source);

    let outer = scheduler.submit("outer", SyncFromWorker).unwrap();
    scheduler.wait_all();

    assert!(outer.is_successful());
    let inner = scheduler
        .registry()
        .aspect::<Vec<String>>(&LogicPath::new("inner.list"))
        .unwrap();
    assert_eq!(inner.get().unwrap().as_slice(), ["leaf".to_owned()]);
    assert_eq!(scheduler.stats().outstanding_jobs, 0);
}

#[test]
fn test_submit_sync_in_callback_finishes_rest_of_batch() {
    let source = memory_source(&[("a.txt", "alpha"), ("b.txt", "beta"), ("c.list", "b.txt")]);
    let scheduler = scheduler_with(1, source);

    let a = scheduler.submit("a.txt", Text).unwrap();
    let b = scheduler.submit("b.txt", Text).unwrap();
    a.wait();
    b.wait();

    let nested = Arc::new(Mutex::new(None));
    {
        let handle = scheduler.handle().clone();
        let nested = Arc::clone(&nested);
        a.register_callback(move |_| {
            let job = handle.submit_sync("c.list", Manifest::new()).unwrap();
            *nested.lock() = Some(job);
        });
    }
    scheduler.wait_all();

    let nested = nested.lock().clone().unwrap();
    assert_eq!(nested.state(), JobState::Committed);
    assert!(nested.is_successful());
    assert_eq!(b.state(), JobState::Committed);
    let aspect = scheduler
        .registry()
        .aspect::<Vec<String>>(nested.path())
        .unwrap();
    assert_eq!(aspect.get().unwrap().as_slice(), ["beta".to_owned()]);
}

#[test]
fn test_submit_sync_on_loaded_aspect_skips_load() {
    let scheduler = scheduler_with(1, memory_source(&[("a.txt", "alpha")]));
    let loads = Arc::new(AtomicUsize::new(0));
    let counting = || Counting {
        loads: Arc::clone(&loads),
    };

    scheduler.submit("a.txt", counting()).unwrap();
    scheduler.wait_all();
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    let job = scheduler.submit_sync("a.txt", counting()).unwrap();
    assert!(job.is_placeholder());
    assert_eq!(job.state(), JobState::Committed);
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    let handle = scheduler.handle().clone();
    let remote_loads = Arc::clone(&loads);
    let remote = thread::spawn(move || {
        handle
            .submit_sync("a.txt", Counting { loads: remote_loads })
            .unwrap()
    })
    .join()
    .unwrap();
    assert!(remote.is_placeholder());
    assert_eq!(remote.state(), JobState::Ready);

    scheduler.wait_all();
    assert_eq!(remote.state(), JobState::Committed);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    let aspect = scheduler
        .registry()
        .aspect::<String>(&LogicPath::new("a.txt"))
        .unwrap();
    assert_eq!(aspect.get().unwrap().as_str(), "alpha");
    assert!(!aspect.is_loading());
}

// ============================================================================
// RELOAD AND RESET
// ============================================================================

#[test]
fn test_reload_moves_callbacks_from_placeholder() {
    let source = memory_source(&[("a.txt", "v1")]);
    let scheduler = scheduler_with(1, Arc::clone(&source));
    scheduler.submit("a.txt", Text).unwrap();
    scheduler.wait_all();

    let placeholder = scheduler.submit("a.txt", Text).unwrap();
    assert!(placeholder.is_placeholder());
    let fired = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(None));
    {
        let fired = Arc::clone(&fired);
        let seen = Arc::clone(&seen);
        placeholder.register_callback(move |job| {
            fired.fetch_add(1, Ordering::SeqCst);
            *seen.lock() = Some(job.id());
        });
    }

    source.insert("a.txt", "v2");
    let reloaded = scheduler.reload("a.txt", Text).unwrap();
    assert!(!reloaded.is_placeholder());
    assert!(!reloaded.same_job(&placeholder));

    // Reloading again while the load is in flight returns the same job.
    let again = scheduler.reload("a.txt", Text).unwrap();
    assert!(again.same_job(&reloaded));

    scheduler.wait_all();

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(*seen.lock(), Some(reloaded.id()));
    let aspect = scheduler
        .registry()
        .aspect::<String>(&LogicPath::new("a.txt"))
        .unwrap();
    assert_eq!(aspect.get().unwrap().as_str(), "v2");
    assert!(!aspect.is_loading());
}

#[test]
fn test_reset_allows_fresh_submission() {
    let source = memory_source(&[("a.txt", "v1")]);
    let scheduler = scheduler_with(1, Arc::clone(&source));
    let aspect = scheduler.registry().get_or_create_aspect::<String>("a.txt");

    let (open_gate, gate) = crossbeam_channel::unbounded();
    scheduler.submit_aspect(&aspect, GatedText { gate }).unwrap();
    assert!(matches!(aspect.reset(), Err(SchedulerError::AspectBusy { .. })));
    drop(open_gate);
    scheduler.wait_all();

    source.insert("a.txt", "v2");
    let old = aspect.reset().unwrap();
    assert_eq!(old.unwrap().as_str(), "v1");
    assert!(!aspect.is_valid());

    let job = scheduler.submit_aspect(&aspect, Text).unwrap();
    assert!(!job.is_placeholder());
    scheduler.wait_all();
    assert_eq!(aspect.get().unwrap().as_str(), "v2");
}
