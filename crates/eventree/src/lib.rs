//! # Eventree
//!
//! Hierarchical, in-process event emitters.
//!
//! ## Overview
//!
//! Emitters are addressed by dotted names (`"app.http.client"`) and kept in a
//! [`Registry`]. Each emitter holds per-event listener lists; [`Emitter::emit`]
//! runs the listeners registered for an event with the given [`EventArgs`].
//!
//! ## Features
//!
//! * **Reentrancy-safe**: a listener may emit on its own emitter at any depth;
//!   nested emissions are queued and drained iteratively, so the stack never grows.
//! * **Snapshot rounds**: each round runs the listeners registered when it starts,
//!   in registration order. Listeners added or removed mid-round take effect
//!   from the next round.
//! * **Hierarchy**: an emitter's parent is its nearest existing ancestor, even
//!   when the ancestor is created after its descendants.
//! * **Async listeners**: scheduled onto the nearest [`ExecutionContext`] found
//!   on the emitter or its ancestors; never awaited by the dispatch loop.
//!
//! # Example
//!
//! ```rust
//! use eventree::{EventArgs, Registry};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! # fn main() -> Result<(), eventree::EmitterError> {
//! let registry = Registry::new();
//! let jobs = registry.get_or_create("worker.jobs")?;
//!
//! let done = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&done);
//! let emitter = jobs.clone();
//! jobs.on("finished", move |args| {
//!     let remaining = *args.get::<u32>(0).unwrap_or(&0);
//!     counter.fetch_add(1, Ordering::SeqCst);
//!     if remaining > 0 {
//!         // Queued, runs after this round on the outermost `emit`.
//!         emitter.emit("finished", EventArgs::new().arg(remaining - 1))?;
//!     }
//!     Ok(())
//! })?;
//!
//! assert!(jobs.emit("finished", EventArgs::new().arg(3_u32))?);
//! assert_eq!(done.load(Ordering::SeqCst), 4);
//! # Ok(())
//! # }
//! ```

mod args;
mod context;
mod deferral;
mod emitter;
mod error;
mod listener;
mod name;
mod registry;

pub use args::EventArgs;
pub use context::{BoxTask, ExecutionContext, Executor, TaskQueue, TaskReceiver};
pub use emitter::Emitter;
pub use error::{EmitterError, EmitterErrorExt, Result};
pub use listener::Listener;
pub use name::{EmitterName, EventName, ROOT_NAME};
pub use registry::Registry;

/// The emitter named `name` in the process-wide registry, created on first use.
///
/// `""` and `"root"` both return the root emitter.
///
/// # Errors
/// Returns [`EmitterError::MalformedName`] when a dot-separated segment is empty.
///
/// # Examples
/// ```rust
/// let root = eventree::get_emitter("")?;
/// assert_eq!(root, eventree::get_emitter("root")?);
/// assert_eq!(eventree::get_emitter("db")?.parent(), Some(root));
/// # Ok::<(), eventree::EmitterError>(())
/// ```
pub fn get_emitter(name: &str) -> Result<Emitter> {
    Registry::global().get_or_create(name)
}
