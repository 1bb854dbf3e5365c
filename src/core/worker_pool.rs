//! Bounded pool for blocking and CPU-bound work.
//!
//! Decoding, noise reduction, WAV encoding and inference all block. They are
//! submitted through [`WorkerPool::run`], which waits for one of `size`
//! permits and then executes the closure on tokio's blocking thread pool.
//! The permit moves into the closure, so a slot is only freed when the work
//! itself has finished, not when the awaiting request is cancelled.
//!
//! Requests that find every permit taken queue on the semaphore; this is the
//! backpressure point of the service.

use std::any::Any;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Errors from running a task on the pool.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkerError {
    /// The task panicked; the payload message is preserved when it was a string.
    #[error("worker task panicked: {0}")]
    Panicked(String),

    /// The blocking task was cancelled by the runtime (shutdown).
    #[error("worker task was cancelled")]
    Cancelled,

    /// The pool has been closed and accepts no more work.
    #[error("worker pool is closed")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool that runs at most `size` tasks at once (minimum 1).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of idle slots right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `task` on a blocking thread once a slot is free and await its result.
    pub async fn run<F, T>(&self, task: F) -> Result<T, WorkerError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::Closed)?;

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            task()
        });

        handle.await.map_err(|e| {
            if e.is_panic() {
                WorkerError::Panicked(panic_message(e.into_panic()))
            } else {
                WorkerError::Cancelled
            }
        })
    }

    /// Stop accepting new work. Tasks already running are unaffected.
    pub fn close(&self) {
        self.permits.close();
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(default_worker_threads())
    }
}

/// Available parallelism capped at 8.
pub fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8))
        .unwrap_or(4)
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
