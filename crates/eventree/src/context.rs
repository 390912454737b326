//! Execution contexts for asynchronous listeners.
//!
//! An [`ExecutionContext`] is a "submit work" capability. The dispatch loop
//! hands it a boxed future and moves on; the context decides where and when the
//! future runs. Submission never blocks and is safe from any thread.

use crate::error::EmitterError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::trace;

/// A unit of asynchronous listener work.
pub type BoxTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Something that can accept asynchronous listener work.
pub trait Executor: Send + Sync + fmt::Debug + 'static {
    /// Hands `task` over without waiting for it to run.
    ///
    /// # Errors
    /// Returns [`EmitterError::ContextClosed`] if the executor no longer accepts work.
    fn submit(&self, task: BoxTask) -> Result<(), EmitterError>;
}

impl Executor for Handle {
    fn submit(&self, task: BoxTask) -> Result<(), EmitterError> {
        // `Handle::spawn` is thread-safe, whether or not the caller is a worker of this runtime.
        drop(self.spawn(task));
        Ok(())
    }
}

/// Shared handle to an [`Executor`], attachable to any emitter.
#[derive(Clone)]
pub struct ExecutionContext(Arc<dyn Executor>);

impl ExecutionContext {
    pub fn new(executor: impl Executor) -> Self {
        Self(Arc::new(executor))
    }

    /// Captures the Tokio runtime the calling thread is running on, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Submits `task` to the underlying executor.
    ///
    /// # Errors
    /// Propagates the executor's refusal, typically [`EmitterError::ContextClosed`].
    pub fn submit(&self, task: BoxTask) -> Result<(), EmitterError> {
        self.0.submit(task)
    }

    /// Whether both handles point at the same executor.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Handle> for ExecutionContext {
    fn from(handle: Handle) -> Self {
        Self::new(handle)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExecutionContext").field(&self.0).finish()
    }
}

/// Channel-backed executor: tasks are queued and run by whoever owns the
/// paired [`TaskReceiver`].
///
/// Useful when listener work must run on a specific thread or task, e.g. a
/// UI loop or a single-threaded runtime driven elsewhere.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<BoxTask>,
}

/// Receiving half of a [`TaskQueue`].
pub struct TaskReceiver {
    receiver: mpsc::UnboundedReceiver<BoxTask>,
}

impl TaskQueue {
    /// Creates a queue and the receiver that drains it.
    #[must_use]
    pub fn new() -> (Self, TaskReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, TaskReceiver { receiver })
    }

    /// Wraps a clone of this queue as an [`ExecutionContext`].
    #[must_use]
    pub fn context(&self) -> ExecutionContext {
        ExecutionContext::new(self.clone())
    }
}

impl Executor for TaskQueue {
    fn submit(&self, task: BoxTask) -> Result<(), EmitterError> {
        self.sender.send(task).map_err(|_| EmitterError::ContextClosed {
            message: "task receiver dropped".into(),
            context: None,
        })
    }
}

impl TaskReceiver {
    /// Runs queued tasks, one after another, until every sender is gone.
    pub async fn run(&mut self) {
        while let Some(task) = self.receiver.recv().await {
            task.await;
        }
    }

    /// Runs every task already queued and returns how many ran.
    ///
    /// Tasks queued by the tasks themselves are picked up too.
    pub async fn run_until_idle(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task.await;
            ran += 1;
        }
        trace!(ran, "Task queue drained");
        ran
    }

    /// Number of tasks waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl fmt::Debug for TaskReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskReceiver").field("pending", &self.pending()).finish()
    }
}
