use crate::args::EventArgs;
use crate::context::ExecutionContext;
use crate::deferral::{DeferralContext, Entry, Round};
use crate::error::{EmitterError, EmitterErrorExt};
use crate::listener::{Invocation, Listener};
use crate::name::{EmitterName, EventName, ROOT_NAME, SEPARATOR};
use crate::registry::{Registry, RegistryInner};
use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{trace, warn};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
struct NodeState {
    listeners: FxHashMap<EventName, Vec<Listener>>,
    context: Option<ExecutionContext>,
}

pub(crate) struct Node {
    id: u64,
    name: EmitterName,
    state: Mutex<NodeState>,
    parent: RwLock<Option<Emitter>>,
    registry: Weak<RegistryInner>,
}

/// A named holder of per-event listener lists.
///
/// Handles are cheap to clone and compare equal only when they refer to the
/// same registry node. Obtain one through [`get_emitter`](crate::get_emitter)
/// or [`Registry::get_or_create`].
///
/// No lock is held while a listener runs, so listeners may freely register,
/// remove, look up emitters, and emit again.
#[derive(Clone)]
pub struct Emitter {
    node: Arc<Node>,
}

impl Emitter {
    pub(crate) fn new(name: EmitterName, registry: Weak<RegistryInner>) -> Self {
        Self {
            node: Arc::new(Node {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                name,
                state: Mutex::new(NodeState::default()),
                parent: RwLock::new(None),
                registry,
            }),
        }
    }

    /// The dotted name this emitter is registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        self.node.name.as_str()
    }

    pub(crate) fn emitter_name(&self) -> &EmitterName {
        &self.node.name
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.node.name.is_root()
    }

    /// The nearest real ancestor; `None` only for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.node.parent.read().clone()
    }

    pub(crate) fn set_parent(&self, parent: Self) {
        *self.node.parent.write() = Some(parent);
    }

    /// Whether both handles refer to the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// The emitter named `"{self}.{suffix}"` in the same registry, created if needed.
    ///
    /// For the root, the suffix alone is used. The result is never `self`.
    ///
    /// # Errors
    /// Returns [`EmitterError::MalformedName`] for an empty or malformed suffix,
    /// and for `"root"` on the root.
    pub fn child(&self, suffix: &str) -> Result<Self, EmitterError> {
        if suffix.is_empty() || (self.is_root() && suffix == ROOT_NAME) {
            return Err(EmitterError::MalformedName {
                name: format!("{}{SEPARATOR}{suffix}", self.name()).into(),
                context: None,
            });
        }
        let registry = self.node.registry.upgrade().map(Registry::from_inner).ok_or_else(|| {
            EmitterError::Internal { message: "registry dropped".into(), context: None }
        })?;
        if self.is_root() {
            return registry.get_or_create(suffix);
        }
        registry.get_or_create(format!("{}{SEPARATOR}{suffix}", self.name()))
    }

    /// Appends `listener` to `event`'s list. Registering the same handle twice
    /// makes it run twice per round.
    ///
    /// # Errors
    /// Returns [`EmitterError::EmptyName`] for an empty event name.
    pub fn add_listener(&self, event: &str, listener: Listener) -> Result<Self, EmitterError> {
        let event = EventName::new(event)?;
        self.node.state.lock().listeners.entry(event).or_default().push(listener);
        Ok(self.clone())
    }

    /// Registers a synchronous closure and returns its handle for later removal.
    ///
    /// # Errors
    /// Returns [`EmitterError::EmptyName`] for an empty event name.
    pub fn on<F>(&self, event: &str, f: F) -> Result<Listener, EmitterError>
    where
        F: Fn(&EventArgs) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let listener = Listener::new(f);
        self.add_listener(event, listener.clone())?;
        Ok(listener)
    }

    /// Registers an asynchronous closure and returns its handle for later removal.
    ///
    /// # Errors
    /// Returns [`EmitterError::EmptyName`] for an empty event name.
    pub fn on_async<F, Fut>(&self, event: &str, f: F) -> Result<Listener, EmitterError>
    where
        F: Fn(EventArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = Listener::from_async(f);
        self.add_listener(event, listener.clone())?;
        Ok(listener)
    }

    /// Removes the first registration of `listener` for `event`.
    ///
    /// A listener that is not registered is reported with a warning and
    /// otherwise ignored.
    ///
    /// # Errors
    /// Returns [`EmitterError::EmptyName`] for an empty event name.
    pub fn remove_listener(&self, event: &str, listener: &Listener) -> Result<Self, EmitterError> {
        let event = EventName::new(event)?;
        let removed = {
            let mut state = self.node.state.lock();
            let list = state.listeners.get_mut(&event);
            let removed = list
                .and_then(|list| list.iter().position(|l| l == listener).map(|i| list.remove(i)));
            if state.listeners.get(&event).is_some_and(Vec::is_empty) {
                state.listeners.remove(&event);
            }
            removed.is_some()
        };
        if !removed {
            warn!(emitter = %self.node.name, %event, "Listener not found; nothing removed");
        }
        Ok(self.clone())
    }

    /// Drops every listener of `event` and returns how many there were.
    ///
    /// # Errors
    /// Returns [`EmitterError::EmptyName`] for an empty event name.
    pub fn remove_all_listeners(&self, event: &str) -> Result<usize, EmitterError> {
        let event = EventName::new(event)?;
        Ok(self.node.state.lock().listeners.remove(&event).map_or(0, |list| list.len()))
    }

    /// # Errors
    /// Returns [`EmitterError::EmptyName`] for an empty event name.
    pub fn listener_count(&self, event: &str) -> Result<usize, EmitterError> {
        let event = EventName::new(event)?;
        Ok(self.node.state.lock().listeners.get(&event).map_or(0, Vec::len))
    }

    /// A copy of `event`'s listeners in registration order.
    ///
    /// # Errors
    /// Returns [`EmitterError::EmptyName`] for an empty event name.
    pub fn listeners(&self, event: &str) -> Result<Vec<Listener>, EmitterError> {
        let event = EventName::new(event)?;
        Ok(self.snapshot(&event))
    }

    /// Events that currently have at least one listener, sorted.
    #[must_use]
    pub fn event_names(&self) -> Vec<EventName> {
        let mut names: Vec<_> = self.node.state.lock().listeners.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Attaches the context this emitter and its context-less descendants
    /// schedule asynchronous listeners on.
    pub fn set_execution_context(&self, context: impl Into<ExecutionContext>) {
        self.node.state.lock().context = Some(context.into());
    }

    /// Detaches this emitter's own context, returning it.
    pub fn clear_execution_context(&self) -> Option<ExecutionContext> {
        self.node.state.lock().context.take()
    }

    /// This emitter's own context, ignoring ancestors.
    #[must_use]
    pub fn execution_context(&self) -> Option<ExecutionContext> {
        self.node.state.lock().context.clone()
    }

    /// The nearest context configured on this emitter or any ancestor.
    ///
    /// # Errors
    /// Returns [`EmitterError::NoExecutionContext`] if the walk reaches the
    /// root without finding one.
    pub fn resolve_execution_context(&self) -> Result<ExecutionContext, EmitterError> {
        let mut current = self.clone();
        loop {
            if let Some(context) = current.execution_context() {
                return Ok(context);
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => {
                    return Err(EmitterError::NoExecutionContext {
                        emitter: self.name().to_owned().into(),
                        context: None,
                    });
                },
            }
        }
    }

    /// Emits `event` with `args` and reports whether it had listeners when called.
    ///
    /// Listeners run in registration order against a snapshot taken when their
    /// round starts. Synchronous listeners run inline; asynchronous ones are
    /// submitted to the nearest execution context.
    ///
    /// A call made from inside one of this emitter's listeners on the same
    /// thread is queued and returns immediately; the outermost call runs the
    /// queued rounds in FIFO order once the current round finishes, so nesting
    /// depth never grows the stack.
    ///
    /// # Errors
    /// * [`EmitterError::EmptyName`] for an empty event name.
    /// * [`EmitterError::Listener`] when a synchronous listener fails. The rest
    ///   of that round and every round still queued in this flow are abandoned.
    /// * [`EmitterError::NoExecutionContext`] or [`EmitterError::ContextClosed`]
    ///   when an asynchronous listener cannot be scheduled.
    ///
    /// # Examples
    /// ```rust
    /// use eventree::{EventArgs, Registry};
    ///
    /// # fn main() -> Result<(), eventree::EmitterError> {
    /// let registry = Registry::new();
    /// let ee = registry.get_or_create("app.http")?;
    /// ee.on("request", |args| {
    ///     assert_eq!(args.get::<&str>(0), Some(&"/health"));
    ///     Ok(())
    /// })?;
    ///
    /// assert!(ee.emit("request", EventArgs::new().arg("/health"))?);
    /// assert!(!ee.emit("shutdown", EventArgs::new())?);
    /// # Ok(())
    /// # }
    /// ```
    pub fn emit(&self, event: &str, args: EventArgs) -> Result<bool, EmitterError> {
        let event = EventName::new(event)?;
        let snapshot = self.snapshot(&event);
        let had_listeners = !snapshot.is_empty();

        let flow = match DeferralContext::enter(self.node.id, Round { event, args }) {
            Entry::Owner(flow) => flow,
            Entry::Deferred => {
                trace!(emitter = %self.node.name, "Emit deferred to active flow");
                return Ok(had_listeners);
            },
        };

        let mut first = Some(snapshot);
        while let Some(round) = flow.next_round() {
            let listeners = first.take().unwrap_or_else(|| self.snapshot(&round.event));
            self.dispatch(&round, &listeners)?;
        }
        Ok(had_listeners)
    }

    fn snapshot(&self, event: &EventName) -> Vec<Listener> {
        self.node.state.lock().listeners.get(event).cloned().unwrap_or_default()
    }

    fn dispatch(&self, round: &Round, listeners: &[Listener]) -> Result<(), EmitterError> {
        trace!(emitter = %self.node.name, event = %round.event, listeners = listeners.len(), "Dispatching round");

        let mut context = None;
        for listener in listeners {
            match listener.invoke(&round.args) {
                Invocation::Done(result) => result.context(format!(
                    "emitter {:?}, event {:?}",
                    self.name(),
                    round.event.as_str()
                ))?,
                Invocation::Scheduled(task) => {
                    if context.is_none() {
                        context = Some(self.resolve_execution_context()?);
                    }
                    context.as_ref().map_or(Ok(()), |context| context.submit(task))?;
                },
            }
        }
        Ok(())
    }
}

impl PartialEq for Emitter {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Emitter {}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parent = self.parent();
        f.debug_struct("Emitter")
            .field("name", &self.name())
            .field("parent", &parent.as_ref().map(Self::name))
            .finish_non_exhaustive()
    }
}
