#![allow(dead_code, unreachable_pub)]

use eventree::{Emitter, EventArgs, Listener};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Records every call made to the listeners it hands out.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A listener that records `label` on each call.
    pub fn listener(&self, label: &str) -> Listener {
        let calls = Arc::clone(&self.calls);
        let label = label.to_owned();
        Listener::new(move |_| {
            calls.lock().push(label.clone());
            Ok(())
        })
    }

    /// Registers a recording listener on `emitter` for `event`.
    pub fn attach(&self, emitter: &Emitter, event: &str, label: &str) -> Listener {
        let listener = self.listener(label);
        emitter.add_listener(event, listener.clone()).expect("valid event name");
        listener
    }

    pub fn record(&self, label: impl Into<String>) {
        self.calls.lock().push(label.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, label: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == label).count()
    }
}

pub fn no_args() -> EventArgs {
    EventArgs::new()
}

/// Collects the targets of `WARN` events seen by the subscriber it is layered on.
#[derive(Debug, Clone, Default)]
pub struct WarnLog {
    targets: Arc<Mutex<Vec<String>>>,
}

impl WarnLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().clone()
    }
}

impl<S: Subscriber> Layer<S> for WarnLog {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.targets.lock().push(event.metadata().target().to_owned());
        }
    }
}
