//! Bounded-concurrency request queue.
//!
//! Operations are admitted in FIFO order and at most `max_concurrent` of them
//! run at once, each on its own tokio task. When an operation settles its slot
//! is released and the next pending operation is dispatched.
//!
//! Only one thread dispatches at a time: it dequeues each job and invokes its
//! closure before taking the next, so closures are invoked in submission order
//! even on the multi-threaded runtime. A dispatch request that arrives while
//! another thread holds the turn returns immediately; the holder re-checks the
//! slots under the lock before giving the turn up.
//!
//! The queue never retries, times out or cancels anything. Wrap the operation
//! before submitting it if you need that (see `orchestration::retry`).
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use uuid::Uuid;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Outcome of a submitted operation that did not succeed.
#[derive(Debug, Error)]
pub enum QueueError<E> {
    /// The operation itself failed; the error is passed through untouched.
    #[error("{0}")]
    Operation(E),
    /// The operation's task panicked or was dropped before it settled.
    #[error("operation was dropped before it settled")]
    Aborted,
}

struct Job {
    id: Uuid,
    run: Box<dyn FnOnce() -> BoxFuture + Send>,
}

struct QueueState {
    running: usize,
    pending: VecDeque<Job>,
    /// Set while some thread is inside the dispatch loop.
    dispatching: bool,
}

struct Shared {
    max_concurrent: usize,
    state: Mutex<QueueState>,
}

/// Cloneable handle to a queue; clones share the same slots and pending list.
#[derive(Clone)]
pub struct RequestQueue {
    shared: Arc<Shared>,
}

impl RequestQueue {
    /// Create a queue running at most `max_concurrent` operations at a time.
    /// Zero is clamped to one.
    pub fn new(max_concurrent: usize) -> Self {
        RequestQueue {
            shared: Arc::new(Shared {
                max_concurrent: max_concurrent.max(1),
                state: Mutex::new(QueueState {
                    running: 0,
                    pending: VecDeque::new(),
                    dispatching: false,
                }),
            }),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.shared.max_concurrent
    }

    /// Number of operations currently executing.
    pub fn running(&self) -> usize {
        self.lock().running
    }

    /// Number of admitted operations still waiting for a slot.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Admit `op` and return a future settling with its outcome.
    ///
    /// Admission happens before this returns, so dropping or delaying the
    /// returned future does not affect when `op` runs. Must be called from
    /// within a tokio runtime.
    pub fn submit<F, Fut, T, E>(
        &self,
        op: F,
    ) -> impl Future<Output = Result<T, QueueError<E>>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let id = Uuid::new_v4();
        let run: Box<dyn FnOnce() -> BoxFuture + Send> = Box::new(move || -> BoxFuture {
            let fut = op();
            Box::pin(async move {
                // The caller may have stopped waiting; the outcome is dropped then.
                let _ = tx.send(fut.await);
            })
        });

        {
            let mut state = self.lock();
            state.pending.push_back(Job { id, run });
            tracing::debug!(job = %id, pending = state.pending.len(), "admitted operation");
        }
        self.dispatch();

        async move {
            match rx.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(QueueError::Operation(e)),
                Err(_) => Err(QueueError::Aborted),
            }
        }
    }

    /// Start pending operations while slots are free.
    fn dispatch(&self) {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("no tokio runtime available; operations stay pending");
                return;
            }
        };

        {
            let mut state = self.lock();
            if state.dispatching {
                return;
            }
            state.dispatching = true;
        }

        while let Some(job) = self.next_job() {
            tracing::debug!(job = %job.id, "dispatching operation");
            let slot = Slot {
                queue: self.clone(),
                job: job.id,
            };
            // A panic while building the future drops the job's sender, so its
            // caller sees `Aborted`; the slot is handed back and the loop goes on.
            match panic::catch_unwind(AssertUnwindSafe(job.run)) {
                Ok(fut) => {
                    handle.spawn(async move {
                        let _slot = slot;
                        fut.await;
                    });
                }
                Err(_) => {
                    tracing::error!(job = %slot.job, "operation panicked before it started");
                    drop(slot);
                }
            }
        }
    }

    /// Pop the head of the pending list and claim a slot for it. When nothing
    /// can start, give up the dispatch turn under the same lock.
    fn next_job(&self) -> Option<Job> {
        let mut state = self.lock();
        if state.running < self.shared.max_concurrent {
            if let Some(job) = state.pending.pop_front() {
                state.running += 1;
                return Some(job);
            }
        }
        state.dispatching = false;
        None
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("RequestQueue")
            .field("max_concurrent", &self.shared.max_concurrent)
            .field("running", &state.running)
            .field("pending", &state.pending.len())
            .finish()
    }
}

/// Releases a running slot when the operation's task finishes, panics or is
/// dropped, then pulls the next pending operation.
struct Slot {
    queue: RequestQueue,
    job: Uuid,
}

impl Drop for Slot {
    fn drop(&mut self) {
        {
            let mut state = self.queue.lock();
            state.running = state.running.saturating_sub(1);
        }
        tracing::debug!(job = %self.job, "operation settled");
        self.queue.dispatch();
    }
}
