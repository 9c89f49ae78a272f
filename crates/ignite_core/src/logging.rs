//! Tracing subscriber configuration.
//!
//! [`TracingConfig`] describes how the process-wide `tracing` subscriber should
//! be set up and installs it with [`TracingConfig::install`]. Installation
//! uses `try_init`, so a second install (or one racing with a test harness
//! subscriber) is a no-op rather than a panic.
//!
//! The scheduler opens a `batch` span around every batch and a `system` span
//! around every spawned system. With span events on, each of those spans is
//! logged when it closes, carrying its busy and idle time, which is enough to
//! see where startup time goes.
//!
//! # Example
//!
//! ```
//! use ignite_core::{TracingConfig, TracingFormat};
//! use tracing::Level;
//!
//! // Local runs: pretty output with batch and system timings
//! let local = TracingConfig::default()
//!     .with_level(Level::DEBUG)
//!     .with_format(TracingFormat::Pretty)
//!     .with_span_events(true);
//!
//! // Deployed: JSON lines, scheduler progress only
//! let deployed = TracingConfig::default()
//!     .with_format(TracingFormat::Json)
//!     .with_env_filter("warn,ignite::events=info");
//! ```

use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// How installed output is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Multi-line, colored, with span context under each event.
    #[default]
    Pretty,
    /// One line per event. Used by the `startup` binary.
    Compact,
    /// Newline-delimited JSON objects.
    Json,
}

/// Settings for the subscriber installed by [`install`](Self::install).
///
/// Filtering is decided in this order:
///
/// 1. a directive string given to [`with_env_filter`](Self::with_env_filter)
/// 2. `RUST_LOG`, if set and parsable
/// 3. the configured level, applied to every target
#[derive(Debug, Clone)]
pub struct TracingConfig {
    level: Level,
    format: TracingFormat,
    env_filter: Option<String>,
    span_events: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingConfig {
    /// Same as [`Default::default`]: `INFO`, pretty, no span events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Level used when neither an explicit filter nor `RUST_LOG` applies.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Picks the output rendering.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Overrides `RUST_LOG` with the given directives, for example
    /// `"warn,ignite_graph=debug"`.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Logs every `batch` and `system` span as it closes, with its timing.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Fallback level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// Output rendering.
    #[must_use]
    pub fn format(&self) -> TracingFormat {
        self.format
    }

    /// Builds the filter this configuration resolves to.
    ///
    /// An unparsable explicit filter falls back to the configured level.
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        let by_level = || EnvFilter::new(self.level.as_str());
        match &self.env_filter {
            Some(filter) => EnvFilter::try_new(filter).unwrap_or_else(|_| by_level()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| by_level()),
        }
    }

    /// Span lifecycle events the output layer reports.
    #[must_use]
    pub fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn output_layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let layer = tracing_subscriber::fmt::layer().with_span_events(self.span_events());
        match self.format {
            TracingFormat::Pretty => layer.pretty().boxed(),
            TracingFormat::Compact => layer.compact().boxed(),
            TracingFormat::Json => layer.json().boxed(),
        }
    }

    /// Installs the filter and output layer as the global subscriber.
    ///
    /// Call this once at the top of `main`, before building the graph, so
    /// registration and planning logs are captured too. Returns `false` if
    /// a global subscriber was already set, in which case that one stays.
    pub fn install(&self) -> bool {
        let subscriber = tracing_subscriber::registry().with(self.env_filter());
        let installed = subscriber
            .with(self.output_layer())
            .try_init()
            .is_ok();

        if installed {
            tracing::debug!(
                level = %self.level,
                format = ?self.format,
                span_events = self.span_events,
                "subscriber installed"
            );
        }
        installed
    }
}
