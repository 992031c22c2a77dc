//! Cancellable task slot
//!
//! A [`TaskSlot`] holds at most one live background task. Spawning into the
//! slot cancels the previous task: it is aborted at its next await point and
//! its [`LiveToken`] reports `false`, so a result that was already computed
//! is discarded when the task checks its token before applying it.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::AbortHandle;

/// Liveness flag handed to a spawned task
#[derive(Debug, Clone)]
pub struct LiveToken {
    live: Arc<AtomicBool>,
}

impl LiveToken {
    /// Whether the task has not been cancelled
    #[inline]
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

/// Handle to a task spawned into a [`TaskSlot`]
#[derive(Debug, Clone)]
pub struct TaskHandle {
    generation: u64,
    live: Arc<AtomicBool>,
    abort: Arc<AbortHandle>,
}

impl TaskHandle {
    /// Sequence number of this task within its slot
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the task has not been cancelled
    #[inline]
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Whether the task ran to completion or was aborted
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }

    /// Cancel the task
    pub fn cancel(&self) {
        self.live.store(false, Ordering::Release);
        self.abort.abort();
    }
}

/// Slot holding the latest background task
#[derive(Debug, Default)]
pub struct TaskSlot {
    current: Mutex<Option<TaskHandle>>,
    generation: AtomicU64,
}

impl TaskSlot {
    /// Empty slot
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the current task and spawn a new one
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F, Fut>(&self, make: F) -> TaskHandle
    where
        F: FnOnce(LiveToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut current = self.current.lock();
        if let Some(previous) = current.take() {
            previous.cancel();
        }

        let live = Arc::new(AtomicBool::new(true));
        let token = LiveToken {
            live: Arc::clone(&live),
        };
        let join = tokio::spawn(make(token));
        let handle = TaskHandle {
            generation: self.generation.fetch_add(1, Ordering::AcqRel) + 1,
            live,
            abort: Arc::new(join.abort_handle()),
        };
        *current = Some(handle.clone());
        handle
    }

    /// Cancel the current task, if any
    pub fn cancel(&self) {
        if let Some(handle) = self.current.lock().take() {
            handle.cancel();
        }
    }

    /// Whether a live task is still running
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|h| h.is_live() && !h.is_finished())
    }

    /// Handle of the latest task
    #[must_use]
    pub fn current(&self) -> Option<TaskHandle> {
        self.current.lock().clone()
    }
}
