//! # Logger
//!
//! One-call `tracing` setup for processes that host eventree emitters.
//!
//! Output goes to the console, to a rolling file, or both. Filtering starts
//! from a default level, honours `RUST_LOG`, and then applies any directives
//! given to the builder. [`LoggerBuilder::dispatch_tracing`] turns on the
//! emitters' own trace output (dispatch rounds, deferrals, hierarchy fix-ups).
//!
//! ## Example
//!
//! ```rust
//! use eventree_logger::{LevelFilter, Logger};
//!
//! let _logger = Logger::builder()
//!     .name("my-app")
//!     .level(LevelFilter::INFO)
//!     .dispatch_tracing(true)
//!     .init()
//!     .unwrap();
//! ```

mod error;

pub use crate::error::{LoggerError, LoggerErrorExt};
pub use tracing::level_filters::LevelFilter;
pub use tracing_appender::rolling::Rotation;

use private::Sealed;
use std::borrow::Cow;
use std::marker::PhantomData;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_MAX_FILES: usize = 10;
const LOG_FILE_SUFFIX: &str = "log";
/// Directive enabling every trace event the emitter library produces.
pub const DISPATCH_DIRECTIVE: &str = "eventree=trace";

/// How console lines are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleFormat {
    #[default]
    Compact,
    Pretty,
    /// Single-line with every field, as the default `fmt` layer prints.
    Full,
}

#[derive(Debug)]
struct LoggerConfig {
    console: Option<ConsoleFormat>,
    path: Option<PathBuf>,
    level: LevelFilter,
    rotation: Rotation,
    max_files: usize,
    json: bool,
    directives: Vec<String>,
    dispatch_tracing: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            console: Some(ConsoleFormat::default()),
            path: None,
            level: LevelFilter::INFO,
            rotation: Rotation::DAILY,
            max_files: DEFAULT_MAX_FILES,
            json: false,
            directives: Vec::new(),
            dispatch_tracing: false,
        }
    }
}

#[derive(Debug)]
pub struct Unnamed;
#[derive(Debug)]
pub struct Named(String);
#[derive(Debug)]
pub struct ConsoleOnly;
#[derive(Debug)]
pub struct WithFile;

mod private {
    pub trait Sealed {}
}
impl Sealed for Unnamed {}
impl Sealed for Named {}
impl Sealed for ConsoleOnly {}
impl Sealed for WithFile {}

/// Configures and installs the global subscriber.
///
/// A name is required before [`init`](LoggerBuilder::init) becomes available;
/// file-only options appear once [`path`](LoggerBuilder::path) has been set.
#[derive(Debug)]
pub struct LoggerBuilder<N: Sealed = Unnamed, F: Sealed = ConsoleOnly> {
    config: LoggerConfig,
    name: N,
    output: PhantomData<F>,
}

impl<F: Sealed> LoggerBuilder<Unnamed, F> {
    /// Names the process; also the prefix of rolling log files.
    pub fn name(self, name: impl Into<String>) -> LoggerBuilder<Named, F> {
        LoggerBuilder { name: Named(name.into()), config: self.config, output: PhantomData }
    }
}

impl LoggerBuilder<Named, WithFile> {
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn max_files(mut self, max: usize) -> Self {
        self.config.max_files = max;
        self
    }

    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn rotation(mut self, rotation: Rotation) -> Self {
        self.config.rotation = rotation;
        self
    }

    /// Writes file output as JSON lines.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn json(mut self) -> Self {
        self.config.json = true;
        self
    }
}

impl<F: Sealed> LoggerBuilder<Named, F> {
    /// Level applied to targets no directive mentions.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn level(mut self, level: LevelFilter) -> Self {
        self.config.level = level;
        self
    }

    /// Adds a filter directive such as `"my_app=debug"`.
    ///
    /// Directives are applied after `RUST_LOG`, so they win for the targets
    /// they name. Invalid directives make [`init`](Self::init) fail.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.config.directives.push(directive.into());
        self
    }

    /// Emits the library's trace events regardless of the default level.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn dispatch_tracing(mut self, enabled: bool) -> Self {
        self.config.dispatch_tracing = enabled;
        self
    }

    /// Toggles console output using the current format.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn console(mut self, enabled: bool) -> Self {
        self.config.console = enabled.then(|| self.config.console.unwrap_or_default());
        self
    }

    /// Enables console output with the given layout.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn console_format(mut self, format: ConsoleFormat) -> Self {
        self.config.console = Some(format);
        self
    }

    /// Adds rolling file output under `path`.
    pub fn path(self, path: impl Into<PathBuf>) -> LoggerBuilder<Named, WithFile> {
        let mut config = self.config;
        config.path = Some(path.into());
        LoggerBuilder { config, name: self.name, output: PhantomData }
    }

    /// Installs the global subscriber.
    ///
    /// Keep the returned [`Logger`] alive: dropping it flushes and stops the
    /// background file writer.
    ///
    /// # Errors
    /// * [`LoggerError::InvalidConfiguration`] for an empty name, `max_files == 0`,
    ///   or when no output is enabled.
    /// * [`LoggerError::InvalidDirective`] for a directive that does not parse.
    /// * [`LoggerError::Io`] or [`LoggerError::Appender`] when file output cannot be set up.
    /// * [`LoggerError::Subscriber`] if a global subscriber is already installed.
    pub fn init(self) -> Result<Logger, LoggerError> {
        let name = self.name.0;
        validate_config(&self.config, &name)?;
        let filter = build_env_filter(&self.config)?;

        let mut layers = Vec::new();
        match self.config.console {
            Some(ConsoleFormat::Compact) => layers.push(layer().compact().with_ansi(true).boxed()),
            Some(ConsoleFormat::Pretty) => layers.push(layer().pretty().with_ansi(true).boxed()),
            Some(ConsoleFormat::Full) => layers.push(layer().with_ansi(true).boxed()),
            None => {},
        }

        let guard = if let Some(path) = self.config.path {
            std::fs::create_dir_all(&path)
                .context(format!("creating {}", path.display()))?;

            let appender = RollingFileAppender::builder()
                .rotation(self.config.rotation)
                .filename_prefix(&name)
                .filename_suffix(LOG_FILE_SUFFIX)
                .max_log_files(self.config.max_files)
                .build(&path)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let file_layer = layer().with_writer(writer).with_ansi(false);
            layers.push(if self.config.json { file_layer.json().boxed() } else { file_layer.boxed() });
            Some(guard)
        } else {
            None
        };

        tracing_subscriber::registry().with(filter).with(layers).try_init()?;
        tracing::debug!(name = %name, file = guard.is_some(), "Logger initialized");

        Ok(Logger { guard })
    }
}

/// Handle to the installed logging system.
///
/// Holds the background file writer, if any. Drop it only at shutdown.
#[must_use = "Dropping this handle stops the background file writer."]
#[derive(Debug)]
pub struct Logger {
    guard: Option<WorkerGuard>,
}

impl Logger {
    /// Starts configuring the global subscriber.
    ///
    /// ```rust
    /// use eventree_logger::{ConsoleFormat, Logger};
    ///
    /// let _logger = Logger::builder()
    ///     .name("my-app")
    ///     .console_format(ConsoleFormat::Pretty)
    ///     .directive("my_app=debug")
    ///     .init()
    ///     .unwrap();
    /// ```
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder { config: LoggerConfig::default(), name: Unnamed, output: PhantomData }
    }

    /// Whether a file writer is attached.
    #[must_use]
    pub const fn has_file_output(&self) -> bool {
        self.guard.is_some()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.guard.is_some() {
            tracing::info!("Logging system shutting down, flushing buffers...");
        }
    }
}

fn validate_config(config: &LoggerConfig, name: &str) -> Result<(), LoggerError> {
    let problem: Option<Cow<'static, str>> = if name.trim().is_empty() {
        Some("Logger name cannot be empty".into())
    } else if config.path.is_some() && config.max_files == 0 {
        Some("max_files must be greater than zero".into())
    } else if config.console.is_none() && config.path.is_none() {
        Some("No output enabled. Enable the console or set a log path.".into())
    } else {
        None
    };
    problem.map_or(Ok(()), |message| Err(LoggerError::InvalidConfiguration { message, context: None }))
}

fn parse_directive(directive: &str) -> Result<Directive, LoggerError> {
    directive.parse().map_err(|e: tracing_subscriber::filter::ParseError| {
        LoggerError::InvalidDirective {
            directive: directive.to_owned().into(),
            message: e.to_string().into(),
            context: None,
        }
    })
}

fn build_env_filter(config: &LoggerConfig) -> Result<EnvFilter, LoggerError> {
    let mut filter =
        EnvFilter::builder().with_default_directive(config.level.into()).from_env_lossy();
    for directive in &config.directives {
        filter = filter.add_directive(parse_directive(directive)?);
    }
    if config.dispatch_tracing {
        filter = filter.add_directive(parse_directive(DISPATCH_DIRECTIVE)?);
    }
    Ok(filter)
}
