//! # Runtime
//!
//! Dedicated [Tokio](https://tokio.rs) runtimes for asynchronous listeners.
//!
//! Emitters only *submit* asynchronous listener work; something has to run it.
//! A [`ListenerRuntime`] owns a multi-thread runtime built from a
//! [`RuntimeConfig`] and hands out the [`ExecutionContext`] to attach to an
//! emitter. Emitting threads never need to be inside a runtime themselves.
//!
//! ## Profiles
//! * **Listeners**: one worker per core, for listener-heavy services.
//! * **Lightweight**: half the workers and smaller stacks, for tools and tests.
//! * **Global**: a shared, lazily built runtime for the whole process.
//!
//! ## Example
//!
//! ```rust
//! use eventree::{EventArgs, Registry};
//! use eventree_runtime::{ListenerRuntime, RuntimeConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let runtime = ListenerRuntime::new(&RuntimeConfig::lightweight().with_worker_threads(1))?;
//! let registry = Registry::new();
//! runtime.attach(&registry.root());
//!
//! let jobs = registry.get_or_create("jobs")?;
//! jobs.on_async("done", |_args| async { /* runs on the runtime's workers */ })?;
//! jobs.emit("done", EventArgs::new())?;
//! # Ok(())
//! # }
//! ```

pub use anyhow::Result;

use anyhow::{Context as _, anyhow};
use eventree::{BoxTask, Emitter, EmitterError, ExecutionContext, Executor};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::available_parallelism;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info, warn};

/// Worker count used when parallelism cannot be detected.
const DEFAULT_WORKER_THREADS: usize = 4;
const MAX_WORKER_THREADS: usize = 1024;
/// Default stack size for worker threads (2 `MiB`).
const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;
const MIN_STACK_SIZE: usize = 512 * 1024;
const MAX_STACK_SIZE: usize = 16 * 1024 * 1024;
const THREAD_KEEP_ALIVE: Duration = Duration::from_secs(60);
const DEFAULT_THREAD_NAME: &str = "eventree-listener";

static WORKER_THREADS: OnceLock<usize> = OnceLock::new();

/// Worker count from `TOKIO_WORKER_THREADS`, falling back to the core count.
fn detected_worker_threads() -> usize {
    *WORKER_THREADS.get_or_init(|| {
        std::env::var("TOKIO_WORKER_THREADS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0 && n <= MAX_WORKER_THREADS)
            .unwrap_or_else(|| {
                available_parallelism().map(std::num::NonZero::get).unwrap_or(DEFAULT_WORKER_THREADS)
            })
    })
}

fn thread_name_or_default(name: String) -> String {
    if name.trim().is_empty() { DEFAULT_THREAD_NAME.to_owned() } else { name }
}

/// Settings for a listener runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub worker_threads: usize,
    pub stack_size: usize,
    pub thread_name: String,
    pub thread_keep_alive: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::listeners()
    }
}

impl RuntimeConfig {
    /// One worker per core, honouring `TOKIO_WORKER_THREADS`.
    #[must_use]
    pub fn listeners() -> Self {
        Self {
            worker_threads: detected_worker_threads(),
            stack_size: DEFAULT_STACK_SIZE,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            thread_keep_alive: THREAD_KEEP_ALIVE,
        }
    }

    /// Half the workers and 1 `MiB` stacks.
    #[must_use]
    pub fn lightweight() -> Self {
        Self {
            worker_threads: (detected_worker_threads() / 2).max(1),
            stack_size: 1024 * 1024,
            thread_name: "eventree-light".to_owned(),
            thread_keep_alive: Duration::from_secs(10),
        }
    }

    /// Clamped to `1..=1024`.
    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.clamp(1, MAX_WORKER_THREADS);
        self
    }

    /// Clamped to 512 `KiB` ..= 16 `MiB`.
    #[must_use]
    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = size.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE);
        self
    }

    /// A blank name falls back to `eventree-listener`.
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = thread_name_or_default(name.into());
        self
    }

    #[must_use]
    pub const fn with_thread_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.thread_keep_alive = keep_alive;
        self
    }

    /// Re-applies the clamps, for configs built through public fields.
    fn normalized(&self) -> Self {
        self.clone()
            .with_worker_threads(self.worker_threads)
            .with_stack_size(self.stack_size)
            .with_thread_name(self.thread_name.clone())
    }
}

/// Builds a multi-thread Tokio runtime from `config`.
///
/// # Errors
/// Fails when the OS refuses to start the worker threads.
pub fn build_runtime_with_config(config: &RuntimeConfig) -> Result<Runtime> {
    let config = config.normalized();
    debug!(config = ?config, "Building listener runtime");

    Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .thread_name(&config.thread_name)
        .thread_stack_size(config.stack_size)
        .thread_keep_alive(config.thread_keep_alive)
        .enable_all()
        .build()
        .with_context(|| format!("Failed to initialize runtime {:?}", config.thread_name))
}

/// Submits listener work to a [`ListenerRuntime`] until that runtime shuts down.
#[derive(Debug)]
struct RuntimeExecutor {
    handle: Handle,
    closed: Arc<AtomicBool>,
}

impl Executor for RuntimeExecutor {
    fn submit(&self, task: BoxTask) -> std::result::Result<(), EmitterError> {
        // A task racing a concurrent shutdown is cancelled by Tokio, not reported.
        if self.closed.load(Ordering::Acquire) {
            return Err(EmitterError::ContextClosed {
                message: "listener runtime shut down".into(),
                context: None,
            });
        }
        drop(self.handle.spawn(task));
        Ok(())
    }
}

/// A Tokio runtime dedicated to asynchronous listeners.
///
/// Dropping it shuts the runtime down and cancels unfinished listener tasks.
/// From then on its [`context`](Self::context) rejects work with
/// [`EmitterError::ContextClosed`]. Like any Tokio runtime it must not be
/// dropped from inside async code; use [`shutdown_timeout`](Self::shutdown_timeout)
/// or [`shutdown_background`](Self::shutdown_background) there.
#[derive(Debug)]
pub struct ListenerRuntime {
    /// `None` only while a shutdown method consumes it.
    runtime: Option<Runtime>,
    handle: Handle,
    closed: Arc<AtomicBool>,
    context: ExecutionContext,
}

impl ListenerRuntime {
    /// # Errors
    /// Fails when the runtime cannot be built.
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        let runtime = build_runtime_with_config(config)?;
        let handle = runtime.handle().clone();
        let closed = Arc::new(AtomicBool::new(false));
        let context =
            ExecutionContext::new(RuntimeExecutor { handle: handle.clone(), closed: Arc::clone(&closed) });
        Ok(Self { runtime: Some(runtime), handle, closed, context })
    }

    /// Whether the runtime has stopped accepting listener work.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&mut self) -> Option<Runtime> {
        self.closed.store(true, Ordering::Release);
        self.runtime.take()
    }

    /// The context that schedules work on this runtime.
    #[must_use]
    pub fn context(&self) -> ExecutionContext {
        self.context.clone()
    }

    /// Sets this runtime as `emitter`'s execution context, which its
    /// context-less descendants inherit.
    pub fn attach(&self, emitter: &Emitter) {
        emitter.set_execution_context(self.context());
    }

    #[must_use]
    pub const fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Runs `future` to completion on this runtime, blocking the caller.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.handle.block_on(future)
    }

    /// Stops accepting work, waits up to `timeout` for running listener tasks,
    /// then stops.
    pub fn shutdown_timeout(mut self, timeout: Duration) {
        info!(?timeout, "Shutting down listener runtime");
        if let Some(runtime) = self.close() {
            runtime.shutdown_timeout(timeout);
        }
    }

    /// Stops without waiting; safe to call from async code.
    pub fn shutdown_background(mut self) {
        if let Some(runtime) = self.close() {
            runtime.shutdown_background();
        }
    }
}

impl Drop for ListenerRuntime {
    fn drop(&mut self) {
        drop(self.close());
    }
}

static GLOBAL_RUNTIME: OnceLock<ListenerRuntime> = OnceLock::new();

/// The shared listener runtime, built with [`RuntimeConfig::listeners`] on first use.
///
/// # Errors
/// Fails when the runtime cannot be built. A later call retries.
pub fn global_runtime() -> Result<&'static ListenerRuntime> {
    if let Some(runtime) = GLOBAL_RUNTIME.get() {
        return Ok(runtime);
    }
    let config = RuntimeConfig::listeners();
    info!(threads = config.worker_threads, stack = config.stack_size, "Initializing global listener runtime");
    let runtime = ListenerRuntime::new(&config)?;
    if let Err(lost) = GLOBAL_RUNTIME.set(runtime) {
        // Another thread won the race; ours has never run anything.
        warn!("Global listener runtime initialized concurrently");
        lost.shutdown_background();
    }
    GLOBAL_RUNTIME.get().ok_or_else(|| anyhow!("global listener runtime missing after initialization"))
}

/// Execution context of the [`global_runtime`].
///
/// # Errors
/// Fails when the runtime cannot be built.
pub fn global_context() -> Result<ExecutionContext> {
    global_runtime().map(ListenerRuntime::context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_threads_clamped() {
        assert_eq!(RuntimeConfig::default().with_worker_threads(0).worker_threads, 1);
        assert_eq!(RuntimeConfig::default().with_worker_threads(2000).worker_threads, MAX_WORKER_THREADS);
    }

    #[test]
    fn test_stack_size_clamped() {
        assert_eq!(RuntimeConfig::default().with_stack_size(100).stack_size, MIN_STACK_SIZE);
        assert_eq!(RuntimeConfig::default().with_stack_size(100 * 1024 * 1024).stack_size, MAX_STACK_SIZE);
    }

    #[test]
    fn test_blank_thread_name_falls_back() {
        assert_eq!(RuntimeConfig::lightweight().with_thread_name("  ").thread_name, DEFAULT_THREAD_NAME);
    }

    #[test]
    fn test_presets() {
        let listeners = RuntimeConfig::listeners();
        let light = RuntimeConfig::lightweight();
        assert!(light.worker_threads <= listeners.worker_threads);
        assert!(light.worker_threads >= 1);
        assert!(light.stack_size < listeners.stack_size);
        assert_eq!(RuntimeConfig::default(), listeners);
    }

    #[test]
    fn test_normalized_applies_clamps_to_raw_fields() {
        let raw = RuntimeConfig {
            worker_threads: 0,
            stack_size: 1,
            thread_name: String::new(),
            thread_keep_alive: Duration::ZERO,
        };
        let fixed = raw.normalized();
        assert_eq!(fixed.worker_threads, 1);
        assert_eq!(fixed.stack_size, MIN_STACK_SIZE);
        assert_eq!(fixed.thread_name, DEFAULT_THREAD_NAME);
        assert_eq!(fixed.thread_keep_alive, Duration::ZERO);
    }

    #[test]
    fn test_global_runtime_singleton() {
        let first = global_runtime().unwrap() as *const ListenerRuntime;
        let second = global_runtime().unwrap() as *const ListenerRuntime;
        assert_eq!(first, second);
        assert!(global_context().unwrap().ptr_eq(&global_context().unwrap()));
    }

    #[test]
    fn test_close_rejects_submissions() {
        let mut runtime = ListenerRuntime::new(&RuntimeConfig::lightweight().with_worker_threads(1)).unwrap();
        let context = runtime.context();
        assert!(context.submit(Box::pin(async {})).is_ok());
        assert!(!runtime.is_closed());

        let inner = runtime.close();
        assert!(runtime.is_closed());
        let err = context.submit(Box::pin(async {})).unwrap_err();
        assert!(matches!(err, EmitterError::ContextClosed { .. }));
        drop(inner);
    }
}
