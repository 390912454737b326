use crate::args::EventArgs;
use crate::context::BoxTask;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type SyncFn = dyn Fn(&EventArgs) -> anyhow::Result<()> + Send + Sync;
type AsyncFn = dyn Fn(EventArgs) -> BoxTask + Send + Sync;

#[derive(Clone)]
enum Callable {
    Sync(Arc<SyncFn>),
    Async(Arc<AsyncFn>),
}

/// A callable registered against an `(emitter, event)` pair.
///
/// Listeners compare by identity: clones of one handle are equal, two handles
/// built from identical closures are not. Keep a clone around to remove it later.
///
/// ```rust
/// use eventree::{EventArgs, Listener};
///
/// let a = Listener::new(|_args: &EventArgs| Ok(()));
/// let b = a.clone();
/// assert_eq!(a, b);
/// assert_ne!(a, Listener::new(|_args: &EventArgs| Ok(())));
/// ```
#[derive(Clone)]
pub struct Listener {
    callable: Callable,
}

impl Listener {
    /// A listener that runs inline on the emitting thread.
    ///
    /// An `Err` returned from `f` propagates to the caller of `emit`.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&EventArgs) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self { callable: Callable::Sync(Arc::new(f)) }
    }

    /// A listener whose future is scheduled onto the nearest execution context
    /// instead of running inline.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(EventArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self { callable: Callable::Async(Arc::new(move |args| Box::pin(f(args)) as BoxTask)) }
    }

    /// Whether this listener is scheduled rather than called inline.
    #[must_use]
    pub const fn is_async(&self) -> bool {
        matches!(self.callable, Callable::Async(_))
    }

    pub(crate) fn invoke(&self, args: &EventArgs) -> Invocation {
        match &self.callable {
            Callable::Sync(f) => Invocation::Done(f(args)),
            Callable::Async(f) => Invocation::Scheduled(f(args.clone())),
        }
    }

    fn addr(&self) -> *const () {
        match &self.callable {
            Callable::Sync(f) => Arc::as_ptr(f).cast::<()>(),
            Callable::Async(f) => Arc::as_ptr(f).cast::<()>(),
        }
    }
}

/// Outcome of handing one emission to a listener.
pub(crate) enum Invocation {
    Done(anyhow::Result<()>),
    Scheduled(BoxTask),
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.addr(), other.addr())
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("async", &self.is_async())
            .field("addr", &self.addr())
            .finish()
    }
}
