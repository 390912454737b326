use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

type Value = Arc<dyn Any + Send + Sync>;

/// Data passed to every listener of one emission.
///
/// Holds positional values and keyword values of arbitrary `Send + Sync` types.
/// Cloning only bumps reference counts, so the same payload can be handed to
/// several listeners, deferred rounds, and asynchronous tasks. Builder calls
/// append in place while the payload is not shared; extending a clone copies
/// its values first. Keyword lookup is a linear scan.
///
/// ```rust
/// use eventree::EventArgs;
///
/// let args = EventArgs::new().arg(42_u32).arg("hello").kwarg("retry", true);
/// assert_eq!(args.get::<u32>(0), Some(&42));
/// assert_eq!(args.get::<&str>(1), Some(&"hello"));
/// assert_eq!(args.kwarg_value::<bool>("retry"), Some(&true));
/// ```
#[derive(Clone, Default)]
pub struct EventArgs {
    positional: Arc<Vec<Value>>,
    keyword: Arc<Vec<(Cow<'static, str>, Value)>>,
}

impl EventArgs {
    /// An empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional value.
    #[must_use]
    pub fn arg<T: Any + Send + Sync>(mut self, value: T) -> Self {
        Arc::make_mut(&mut self.positional).push(Arc::new(value));
        self
    }

    /// Sets a keyword value, replacing an earlier one with the same name.
    #[must_use]
    pub fn kwarg<T: Any + Send + Sync>(mut self, name: impl Into<Cow<'static, str>>, value: T) -> Self {
        let name = name.into();
        let keyword = Arc::make_mut(&mut self.keyword);
        keyword.retain(|(k, _)| *k != name);
        keyword.push((name, Arc::new(value) as Value));
        self
    }

    /// The positional value at `index`, if present and of type `T`.
    #[must_use]
    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        self.positional.get(index).and_then(|v| v.downcast_ref::<T>())
    }

    /// The keyword value named `name`, if present and of type `T`.
    #[must_use]
    pub fn kwarg_value<T: Any>(&self, name: &str) -> Option<&T> {
        self.keyword.iter().find(|(k, _)| k == name).and_then(|(_, v)| v.downcast_ref::<T>())
    }

    /// Number of positional values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positional.len()
    }

    /// Whether the payload carries neither positional nor keyword values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Keyword names in insertion order.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keyword.iter().map(|(k, _)| k.as_ref())
    }
}

impl fmt::Debug for EventArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventArgs")
            .field("positional", &self.positional.len())
            .field("keywords", &self.keywords().collect::<Vec<_>>())
            .finish()
    }
}

/// Builds [`EventArgs`] from positional values.
///
/// ```rust
/// let args = eventree::args![1_i32, "two"];
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! args {
    () => { $crate::EventArgs::new() };
    ($($value:expr),+ $(,)?) => { $crate::EventArgs::new()$(.arg($value))+ };
}
