//! Shared fixtures for the integration tests: real job kinds and scheduler setup.

#![allow(dead_code)]

use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use prometheus_loader::core::{Affinity, InMemoryEventSink, JobKind, LoadContext, LoadError};
use prometheus_loader::{LoaderConfig, MemorySource, Scheduler};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

pub fn init() {
    prometheus_loader::util::init_tracing();
}

pub fn memory_source(files: &[(&str, &str)]) -> Arc<MemorySource> {
    let source = MemorySource::new();
    for (path, text) in files {
        source.insert(*path, *text);
    }
    Arc::new(source)
}

pub fn scheduler_with(workers: usize, source: Arc<MemorySource>) -> Scheduler {
    init();
    Scheduler::builder(LoaderConfig::new().with_worker_count(workers))
        .with_source(source)
        .build()
        .expect("scheduler should build")
}

pub fn scheduler_with_events(
    workers: usize,
    source: Arc<MemorySource>,
) -> (Scheduler, InMemoryEventSink) {
    init();
    let sink = InMemoryEventSink::new(10_000);
    let scheduler = Scheduler::builder(LoaderConfig::new().with_worker_count(workers))
        .with_source(source)
        .with_event_sink(Arc::new(sink.clone()))
        .build()
        .expect("scheduler should build");
    (scheduler, sink)
}

/// Which thread ran which phase of which path.
pub type ThreadLog = Arc<Mutex<Vec<(String, &'static str, ThreadId)>>>;

// ============================================================================
// JOB KINDS - Real implementations for testing
// ============================================================================

/// Reads the resource as UTF-8 text.
pub struct Text;

impl JobKind for Text {
    type Output = String;
    type Staged = String;

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<String, LoadError> {
        ctx.read_to_string()
    }

    fn commit(&mut self, staged: String) -> Result<String, LoadError> {
        Ok(staged)
    }
}

/// Text load that sleeps first.
pub struct SlowText {
    pub delay: Duration,
}

impl JobKind for SlowText {
    type Output = String;
    type Staged = String;

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<String, LoadError> {
        thread::sleep(self.delay);
        ctx.read_to_string()
    }

    fn commit(&mut self, staged: String) -> Result<String, LoadError> {
        Ok(staged)
    }
}

/// Text load that blocks until the gate opens (a message arrives or the sender drops).
pub struct GatedText {
    pub gate: Receiver<()>,
}

impl JobKind for GatedText {
    type Output = String;
    type Staged = String;

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<String, LoadError> {
        let _ = self.gate.recv();
        ctx.read_to_string()
    }

    fn commit(&mut self, staged: String) -> Result<String, LoadError> {
        Ok(staged)
    }
}

/// Text load that logs the thread of each phase.
pub struct TracedText {
    pub log: ThreadLog,
    pub affinity: Affinity,
}

impl JobKind for TracedText {
    type Output = String;
    type Staged = String;

    fn affinity(&self) -> Affinity {
        self.affinity
    }

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<String, LoadError> {
        self.log
            .lock()
            .push((ctx.path().to_string(), "load", thread::current().id()));
        ctx.read_to_string()
    }

    fn commit(&mut self, staged: String) -> Result<String, LoadError> {
        self.log.lock().push((staged.clone(), "commit", thread::current().id()));
        Ok(staged)
    }
}

/// A manifest lists one child path per line. Each child is loaded as
/// [`Text`]; the committed output is the children's text in completion order.
pub struct Manifest {
    collected: Arc<Mutex<Vec<String>>>,
    pub seen_at_commit: Arc<Mutex<Option<usize>>>,
}

impl Manifest {
    pub fn new() -> Self {
        Self {
            collected: Arc::new(Mutex::new(Vec::new())),
            seen_at_commit: Arc::new(Mutex::new(None)),
        }
    }
}

impl JobKind for Manifest {
    type Output = Vec<String>;
    type Staged = usize;

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<usize, LoadError> {
        let listing = ctx.read_to_string()?;
        let children: Vec<&str> = listing.lines().filter(|l| !l.trim().is_empty()).collect();
        for child in &children {
            let collected = Arc::clone(&self.collected);
            ctx.request(child.trim(), Text, move |aspect| {
                if let Some(text) = aspect.get() {
                    collected.lock().push(text.as_str().to_owned());
                }
            })?;
        }
        Ok(children.len())
    }

    fn commit(&mut self, _requested: usize) -> Result<Vec<String>, LoadError> {
        let collected = self.collected.lock().clone();
        *self.seen_at_commit.lock() = Some(collected.len());
        Ok(collected)
    }
}

/// Manifest variant whose single child is gated.
pub struct GatedParent {
    pub child_gate: Receiver<()>,
    pub order: Arc<Mutex<Vec<&'static str>>>,
}

impl JobKind for GatedParent {
    type Output = String;
    type Staged = ();

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<(), LoadError> {
        let order = Arc::clone(&self.order);
        ctx.request(
            "child.txt",
            GatedText {
                gate: self.child_gate.clone(),
            },
            move |_| order.lock().push("child done"),
        )?;
        self.order.lock().push("parent load returned");
        Ok(())
    }

    fn commit(&mut self, (): ()) -> Result<String, LoadError> {
        self.order.lock().push("parent commit");
        Ok("parent".to_owned())
    }
}
