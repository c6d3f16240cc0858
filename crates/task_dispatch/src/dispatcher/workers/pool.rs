//! Worker pool implementation for parallel task dispatch.
//!
//! Provides a thread pool that manages worker lifecycle, task distribution,
//! and result collection for a single dispatch call.
//!
//! # Key features
//! - Bounded channels prevent memory bloat
//! - Release on drop: shutdown is signalled and every worker is joined
//! - Thread-local worker IDs for debugging
//! - Generic over task and output types
//!
//! Workers pull from one shared task queue, so a slow task never holds up the
//! tasks queued behind it on other workers.

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::dispatcher::common::thread::set_worker_id;

/// Thread pool scoped to one dispatch call.
///
/// Manages worker lifecycle and communication through bounded channels:
/// - Task channel: Caller -> Workers (work distribution)
/// - Output channel: Workers -> Caller (result collection)
/// - Shutdown flag: Enables graceful termination
///
/// # Type Parameters
/// - `Task`: Work items sent to workers
/// - `Output`: Results returned from workers
pub(crate) struct WorkerPool<Task, Output> {
    workers: Vec<thread::JoinHandle<()>>,
    task_tx: Option<Sender<Task>>,
    pub(crate) output_rx: Receiver<Output>,
    shutdown: Arc<AtomicBool>,
    abandoned: bool,
}

impl<Task, Output> WorkerPool<Task, Output>
where
    Task: Send + 'static,
    Output: Send + 'static,
{
    /// Creates a new worker pool with a shared task channel.
    ///
    /// `buffer_size` bounds both the task queue and the output queue. Callers
    /// keep at most `buffer_size` tasks in flight so neither side can block the
    /// other indefinitely.
    pub(crate) fn new<F>(num_workers: usize, buffer_size: usize, worker_fn: F) -> Result<Self>
    where
        F: Fn(Receiver<Task>, Sender<Output>, Arc<AtomicBool>) + Send + Sync + 'static,
    {
        if num_workers == 0 {
            return Err(anyhow!(
                "Cannot create WorkerPool with 0 workers. \
                Set num_workers > 0 or leave it unset to use host parallelism."
            ));
        }

        if buffer_size == 0 {
            return Err(anyhow!(
                "Cannot create WorkerPool with buffer_size 0. \
                Buffer size must be > 0 to prevent deadlocks."
            ));
        }

        let (task_tx, task_rx) = bounded(buffer_size);
        let (output_tx, output_rx) = bounded(buffer_size);

        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_fn = Arc::new(worker_fn);
        let mut workers = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let task_rx = task_rx.clone();
            let output_tx = output_tx.clone();
            let shutdown_clone = shutdown.clone();
            let worker_fn_clone = worker_fn.clone();

            let handle = thread::Builder::new()
                .name(format!("dispatch-worker-{}", worker_id))
                .spawn(move || {
                    set_worker_id(worker_id);
                    worker_fn_clone(task_rx, output_tx, shutdown_clone);
                })
                .with_context(|| format!("Failed to spawn worker thread {}", worker_id))?;

            workers.push(handle);
        }

        tracing::debug!(workers = num_workers, buffer_size, "worker pool acquired");

        Ok(Self {
            workers,
            task_tx: Some(task_tx),
            output_rx,
            shutdown,
            abandoned: false,
        })
    }
}

impl<Task, Output> WorkerPool<Task, Output> {
    /// Queues a task, blocking while the task channel is full.
    pub(crate) fn submit(&self, task: Task) -> Result<()> {
        let task_tx = self
            .task_tx
            .as_ref()
            .ok_or_else(|| anyhow!("Worker pool is shutting down"))?;

        task_tx
            .send(task)
            .map_err(|_| anyhow!("Task channel closed - all workers have exited"))
    }

    pub(crate) fn size(&self) -> usize {
        self.workers.len()
    }

    /// Stops the pool without waiting for running tasks.
    ///
    /// Used after a timeout or cancellation, where joining could block on a
    /// task that never returns. Workers still exit once their current task
    /// finishes, since the shutdown flag is set and the task channel closed.
    pub(crate) fn abandon(&mut self) {
        self.abandoned = true;
        self.shutdown.store(true, Ordering::Relaxed);
        self.task_tx.take();
    }
}

impl<Task, Output> Drop for WorkerPool<Task, Output> {
    fn drop(&mut self) {
        // Signal shutdown to all workers
        self.shutdown.store(true, Ordering::Relaxed);

        // Drop the task sender to close the channel
        self.task_tx.take();

        if self.abandoned {
            // Dropping the handles detaches the threads
            let detached = self.workers.drain(..).count();
            tracing::debug!(detached, "worker pool released without joining");
            return;
        }

        // Wait for workers to finish
        let joined = self.workers.len();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        tracing::debug!(joined, "worker pool released");
    }
}
