//! A single dispatch call running on its own worker pool.
//!
//! `DispatchRun` owns the pool, the not-yet-submitted tasks and the bookkeeping
//! for the in-flight window. Strategies pull completions from it one at a time;
//! it keeps the pipeline full between pulls.
//!
//! # Flow control
//! At most `window = workers * prefetch_factor` tasks are submitted but not yet
//! collected. Both pool channels are sized to the window, so a worker can always
//! deliver its output and the caller never blocks on submission. The first
//! window is submitted as soon as the pool is up, before any result is pulled.
//!
//! # Timeout
//! The timeout applies to each task from the moment a worker picks it up,
//! retries included. Time spent queued behind other tasks does not count.

use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::pool::WorkerPool;
use super::DispatchPhase;
use crate::dispatcher::arguments::{ArgumentStream, Task};
use crate::dispatcher::common::cancel::CancellationToken;
use crate::dispatcher::config::DispatchConfig;
use crate::error::DispatchError;

/// Outcome of one task, tagged with its submission index.
#[derive(Debug)]
pub struct Completion<R> {
    index: usize,
    outcome: Result<R>,
}

impl<R> Completion<R> {
    /// Position of the task's input in the primary sequence.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn into_result(self) -> Result<R, DispatchError> {
        self.outcome
            .map_err(|error| DispatchError::task(self.index, error))
    }
}

/// The running state of one dispatch call.
///
/// Created by `TaskDispatcher::dispatch` and handed to a `DispatchStrategy`,
/// which decides how completions are surfaced. Dropping the run releases the
/// worker pool.
pub struct DispatchRun<P, R> {
    pool: Option<WorkerPool<Task<P>, Completion<R>>>,
    queued: std::vec::IntoIter<Task<P>>,
    total: usize,
    in_flight: usize,
    completed: usize,
    window: usize,
    timeout: Option<Duration>,
    poll_interval: Duration,
    cancellation: Option<CancellationToken>,
    running: Option<Arc<RunningTasks>>,
}

/// Start times of the tasks workers are executing right now.
#[derive(Debug, Default)]
struct RunningTasks {
    started: Mutex<HashMap<usize, Instant>>,
}

impl RunningTasks {
    fn begin(&self, index: usize) {
        self.lock().insert(index, Instant::now());
    }

    fn end(&self, index: usize) {
        self.lock().remove(&index);
    }

    /// The longest-running task and when it started.
    fn oldest(&self) -> Option<(usize, Instant)> {
        self.lock()
            .iter()
            .min_by_key(|(_, started)| **started)
            .map(|(index, started)| (*index, *started))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<usize, Instant>> {
        // Tasks run outside the lock, so a poisoned map is still consistent
        self.started.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P, R> DispatchRun<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Acquires a pool for `arguments` and prepares the submission queue.
    ///
    /// An empty argument stream runs no tasks and acquires no pool.
    pub(crate) fn start<A, F>(
        function: F,
        arguments: ArgumentStream<P, A>,
        config: &DispatchConfig,
    ) -> Result<Self, DispatchError>
    where
        F: Fn(&P, &A) -> Result<R> + Send + Sync + 'static,
        A: Send + Sync + 'static,
    {
        let total = arguments.len();
        let empty = arguments.is_empty();
        let (queued, fixed) = arguments.into_tasks();

        let mut run = Self {
            pool: None,
            queued,
            total,
            in_flight: 0,
            completed: 0,
            window: 1,
            timeout: config.timeout,
            poll_interval: config.poll_interval,
            cancellation: config.cancellation.clone(),
            running: config.timeout.map(|_| Arc::new(RunningTasks::default())),
        };

        if empty {
            tracing::debug!(phase = ?DispatchPhase::Completed, "no tasks to dispatch");
            return Ok(run);
        }

        if config.is_cancelled() {
            tracing::debug!(phase = ?DispatchPhase::Failed, tasks = total, "cancelled before start");
            return Err(DispatchError::Cancelled {
                completed: 0,
                total,
            });
        }

        let workers = config.resolved_workers(total);
        let window = config.in_flight_window(workers);
        let max_retries = config.max_retries;
        let poll_interval = config.poll_interval;
        let cancellation = config.cancellation.clone();
        let running = run.running.clone();

        let pool = WorkerPool::new(
            workers,
            window,
            move |task_rx: Receiver<Task<P>>,
                  output_tx: Sender<Completion<R>>,
                  shutdown: Arc<AtomicBool>| {
                loop {
                    if shutdown.load(Ordering::Relaxed)
                        || cancellation
                            .as_ref()
                            .is_some_and(CancellationToken::is_cancelled)
                    {
                        break;
                    }

                    let (index, primary) = match task_rx.recv_timeout(poll_interval) {
                        Ok(task) => task,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    };

                    if let Some(running) = &running {
                        running.begin(index);
                    }
                    let outcome = execute(&function, &primary, fixed.as_ref(), index, max_retries);
                    if let Some(running) = &running {
                        running.end(index);
                    }
                    if output_tx.send(Completion { index, outcome }).is_err() {
                        break;
                    }
                }
            },
        )
        .map_err(DispatchError::pool)?;

        tracing::debug!(
            phase = ?DispatchPhase::PoolAcquired,
            workers = pool.size(),
            window,
            tasks = total,
            "dispatch started"
        );

        run.pool = Some(pool);
        run.window = window;
        run.fill()?;
        Ok(run)
    }
}

impl<P, R> DispatchRun<P, R> {
    /// Number of tasks in this dispatch.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of completions handed out so far.
    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn is_finished(&self) -> bool {
        self.completed == self.total
    }

    /// Blocks until the next task completes, in completion order.
    ///
    /// Returns `Ok(None)` once every task has been collected. Timeout,
    /// cancellation and pool failures abandon the pool and are returned as
    /// errors; task failures come back inside the `Completion`.
    pub fn next_completion(&mut self) -> Result<Option<Completion<R>>, DispatchError> {
        if self.is_finished() {
            return Ok(None);
        }

        self.fill()?;

        loop {
            if self.is_cancelled() {
                return Err(self.cancelled());
            }

            let oldest = self.running.as_ref().and_then(|running| running.oldest());
            let wait = match (self.timeout, oldest) {
                (Some(timeout), Some((index, started))) => {
                    let elapsed = started.elapsed();
                    if elapsed >= timeout {
                        return Err(self.timed_out(index, timeout));
                    }
                    (timeout - elapsed).min(self.poll_interval)
                }
                _ => self.poll_interval,
            };

            let received = match self.pool.as_ref() {
                Some(pool) => pool.output_rx.recv_timeout(wait),
                None => Err(RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(completion) => {
                    self.in_flight -= 1;
                    self.completed += 1;
                    if self.is_finished() {
                        tracing::debug!(
                            phase = ?DispatchPhase::Completed,
                            tasks = self.total,
                            "all tasks collected"
                        );
                    }
                    return Ok(Some(completion));
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    self.abandon();
                    return Err(DispatchError::pool(anyhow!(
                        "Worker channel disconnected with {} of {} tasks outstanding",
                        self.total - self.completed,
                        self.total
                    )));
                }
            }
        }
    }

    /// Keeps the pipeline full up to the in-flight window.
    fn fill(&mut self) -> Result<(), DispatchError> {
        if self.in_flight == 0 && self.completed == 0 && self.queued.len() == self.total {
            tracing::debug!(phase = ?DispatchPhase::Dispatching, tasks = self.total, "submitting tasks");
        }

        while self.in_flight < self.window {
            if self.is_cancelled() {
                return Err(self.cancelled());
            }

            let Some(task) = self.queued.next() else {
                break;
            };

            let submitted = match self.pool.as_ref() {
                Some(pool) => pool.submit(task),
                None => Err(anyhow!("No worker pool for pending tasks")),
            };

            if let Err(error) = submitted {
                self.abandon();
                return Err(DispatchError::pool(error));
            }
            self.in_flight += 1;
        }
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    fn cancelled(&mut self) -> DispatchError {
        tracing::debug!(
            phase = ?DispatchPhase::Failed,
            completed = self.completed,
            total = self.total,
            "dispatch cancelled"
        );
        self.abandon();
        DispatchError::Cancelled {
            completed: self.completed,
            total: self.total,
        }
    }

    fn timed_out(&mut self, index: usize, timeout: Duration) -> DispatchError {
        tracing::warn!(
            phase = ?DispatchPhase::Failed,
            index,
            ?timeout,
            in_flight = self.in_flight,
            "task exceeded timeout"
        );
        self.abandon();
        DispatchError::TaskTimeout {
            index,
            timeout,
            in_flight: self.in_flight,
        }
    }

    /// Stops submitting and lets the pool go without joining running tasks.
    fn abandon(&mut self) {
        self.queued = Vec::new().into_iter();
        if let Some(pool) = self.pool.as_mut() {
            pool.abandon();
        }
    }
}

impl<P, R> Drop for DispatchRun<P, R> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            drop(pool);
            tracing::debug!(
                phase = ?DispatchPhase::PoolReleased,
                completed = self.completed,
                total = self.total,
                "dispatch finished"
            );
        }
    }
}

/// Runs one task on the current worker, retrying returned errors.
///
/// A panic is caught and reported as a failure of this task only; the worker
/// keeps serving the queue.
fn execute<P, A, R, F>(
    function: &F,
    primary: &P,
    fixed: &A,
    index: usize,
    max_retries: usize,
) -> Result<R>
where
    F: Fn(&P, &A) -> Result<R>,
{
    let mut attempt = 0;
    loop {
        match panic::catch_unwind(AssertUnwindSafe(|| function(primary, fixed))) {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(error)) if attempt < max_retries => {
                attempt += 1;
                tracing::debug!(index, attempt, %error, "retrying failed task");
            }
            Ok(Err(error)) if attempt > 0 => {
                return Err(error.context(format!("gave up after {} attempts", attempt + 1)));
            }
            Ok(Err(error)) => return Err(error),
            Err(payload) => {
                return Err(anyhow!("task panicked: {}", panic_message(payload.as_ref())));
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
