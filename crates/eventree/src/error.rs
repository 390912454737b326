use std::borrow::Cow;

/// Errors surfaced by emitters, the registry and execution contexts.
#[eventree_derive::eventree_error]
pub enum EmitterError {
    /// An event name was empty.
    #[error("Event name must not be empty{}", format_context(.context))]
    EmptyName { context: Option<Cow<'static, str>> },

    /// An emitter name contains an empty dot-separated segment (`"a..b"`, `".a"`, `"a."`).
    #[error("Malformed emitter name{}: {name:?}", format_context(.context))]
    MalformedName { name: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// An asynchronous listener had to be scheduled but neither the emitter nor
    /// any of its ancestors has an execution context.
    #[error("No execution context configured{}: emitter {emitter:?}", format_context(.context))]
    NoExecutionContext { emitter: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The resolved execution context no longer accepts work.
    #[error("Execution context closed{}: {message}", format_context(.context))]
    ContextClosed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A synchronous listener returned an error; the remaining deferred rounds were abandoned.
    #[error("Listener failed{}: {source}", format_context(.context))]
    Listener { source: anyhow::Error, context: Option<Cow<'static, str>> },

    /// Invariant violations inside the registry.
    #[error("Internal emitter error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// `Result` specialised to [`EmitterError`].
pub type Result<T, E = EmitterError> = std::result::Result<T, E>;
