//! Loader worker threads.
//!
//! Each worker blocks on the shared work queue and runs the load phase of
//! whatever job it pops. Workers exit when they take a retire token (pool
//! shrink) or when the work queue is closed and drained (shutdown). There is
//! no polling: both waits are a blocking `select!` on two channels.

use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::select;
use tracing::{debug, error};

use crate::core::scheduler::SchedulerHandle;

struct Worker {
    id: usize,
    handle: JoinHandle<()>,
}

/// Handles of the worker threads owned by a scheduler.
pub(crate) struct WorkerPool {
    workers: Vec<Worker>,
    next_id: usize,
    stack_size: usize,
    name_prefix: String,
}

impl WorkerPool {
    pub(crate) const fn new(stack_size: usize, name_prefix: String) -> Self {
        Self {
            workers: Vec::new(),
            next_id: 0,
            stack_size,
            name_prefix,
        }
    }

    /// Start one more worker.
    pub(crate) fn spawn(&mut self, scheduler: &SchedulerHandle) -> io::Result<()> {
        let id = self.next_id;
        self.next_id += 1;
        let handle = spawn_worker(id, scheduler.clone(), self.stack_size, &self.name_prefix)?;
        self.workers.push(Worker { id, handle });
        Ok(())
    }

    /// Join workers that have exited. Returns how many of them panicked.
    pub(crate) fn reap(&mut self) -> usize {
        let (finished, running): (Vec<_>, Vec<_>) = self
            .workers
            .drain(..)
            .partition(|w| w.handle.is_finished());
        self.workers = running;
        finished.into_iter().map(join_worker).filter(|ok| !ok).count()
    }

    /// Join every worker. The work queue must already be closed.
    pub(crate) fn join_all(&mut self) -> usize {
        self.workers.drain(..).map(join_worker).filter(|ok| !ok).count()
    }

    /// Worker threads not yet joined, including ones still draining a retire token.
    pub(crate) fn live(&self) -> usize {
        self.workers.len()
    }
}

/// Join one worker. Returns `false` if it panicked.
fn join_worker(worker: Worker) -> bool {
    let name = worker.handle.thread().name().unwrap_or_default().to_owned();
    if worker.handle.join().is_ok() {
        debug!(worker_id = worker.id, thread = %name, "loader worker joined");
        true
    } else {
        error!(
            worker_id = worker.id,
            thread = %name,
            "loader worker panicked while loading; the job it was running will never become ready"
        );
        false
    }
}

fn spawn_worker(
    worker_id: usize,
    scheduler: SchedulerHandle,
    stack_size: usize,
    name_prefix: &str,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("{name_prefix}-{worker_id}"))
        .stack_size(stack_size)
        .spawn(move || {
            debug!(worker_id = worker_id, "loader worker started");
            let shared = scheduler.shared();
            let work = shared.work_receiver();
            let retire = shared.retire_receiver();
            loop {
                select! {
                    recv(retire) -> token => {
                        if token.is_ok() {
                            debug!(worker_id = worker_id, "loader worker retiring");
                        }
                        break;
                    }
                    recv(work) -> job => {
                        let Ok(job) = job else {
                            debug!(worker_id = worker_id, "work queue closed, loader worker exiting");
                            break;
                        };
                        debug!(worker_id = worker_id, job_id = %job.id(), path = %job.path(), "loading");
                        job.run_load(&scheduler);
                        debug!(worker_id = worker_id, job_id = %job.id(), "done loading");
                    }
                }
            }
            debug!(worker_id = worker_id, "loader worker exiting");
        })
}
