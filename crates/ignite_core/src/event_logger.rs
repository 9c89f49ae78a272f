//! Structured logging of execution events.
//!
//! [`EventLogger`] turns every [`InitEvent`] raised by an
//! [`ExecutionContext`] into a `tracing` event under the `ignite::events`
//! target, so startup progress shows up in whatever subscriber is installed.
//!
//! ```ignore
//! let mut context = builder.build()?;
//! EventLogger::new().with_level(Level::DEBUG).attach(&context);
//! context.run(&cancel).await?;
//! ```

use ignite_graph::context::ExecutionContext;
use ignite_graph::events::InitEvent;
use ignite_system::id::SystemId;
use tracing::Level;

/// Emits one `tracing` event at the given level.
///
/// `tracing` macros need the level as a constant, so the runtime level is
/// dispatched here.
macro_rules! event_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            Level::TRACE => tracing::trace!(target: "ignite::events", $($arg)+),
            Level::DEBUG => tracing::debug!(target: "ignite::events", $($arg)+),
            Level::INFO => tracing::info!(target: "ignite::events", $($arg)+),
            Level::WARN => tracing::warn!(target: "ignite::events", $($arg)+),
            _ => tracing::error!(target: "ignite::events", $($arg)+),
        }
    };
}

/// Logs [`InitEvent`]s from an execution context.
///
/// System and batch events are logged at the configured level. Cancellation
/// is always logged at `WARN` and failures at `ERROR`.
#[derive(Debug, Clone, Copy)]
pub struct EventLogger {
    level: Level,
}

impl Default for EventLogger {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl EventLogger {
    /// Creates a logger at `INFO`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the level for progress events.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Returns the level for progress events.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// Registers this logger as an observer of `context`.
    pub fn attach(self, context: &ExecutionContext) {
        context.observe(move |event| self.log(event));
    }

    /// Logs a single event.
    pub fn log(&self, event: &InitEvent) {
        match event {
            InitEvent::RunStart {
                batch_count,
                system_count,
            } => event_at!(
                self.level,
                batches = batch_count,
                systems = system_count,
                "startup begins"
            ),
            InitEvent::BatchStart { index, systems } => {
                let names: Vec<&str> = systems.iter().map(SystemId::short_name).collect();
                event_at!(self.level, index, systems = ?names, "batch starting");
            }
            InitEvent::SystemStart { system } => {
                event_at!(self.level, system = %system.short_name(), "system starting");
            }
            InitEvent::SystemComplete { system } => {
                event_at!(self.level, system = %system.short_name(), "system ready");
            }
            InitEvent::BatchComplete { index, duration } => {
                event_at!(self.level, index, ?duration, "batch complete");
            }
            InitEvent::CriticalReady => event_at!(self.level, "critical systems ready"),
            InitEvent::RunComplete {
                systems_initialized,
                duration,
            } => event_at!(
                self.level,
                systems = systems_initialized,
                ?duration,
                "startup complete"
            ),
            InitEvent::RunCancelled { completed_batches } => {
                tracing::warn!(target: "ignite::events", completed_batches, "startup cancelled");
            }
            InitEvent::RunFailed { error } => {
                tracing::error!(target: "ignite::events", %error, "startup failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ignite_graph::builder::GraphBuilder;
    use ignite_system::CancellationToken;
    use ignite_system::system::{BoxFuture, InitError, Initializable};
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Collects formatted output for assertions.
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn with_capture(max: Level, f: impl FnOnce()) -> String {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(max)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        capture.contents()
    }

    struct Database;

    impl Initializable for Database {
        fn initialize<'a>(
            &'a self,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, Result<(), InitError>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[test]
    fn default_level_is_info() {
        assert_eq!(EventLogger::default().level(), Level::INFO);
        assert_eq!(
            EventLogger::new().with_level(Level::TRACE).level(),
            Level::TRACE
        );
    }

    #[test]
    fn progress_events_use_configured_level() {
        let logger = EventLogger::new().with_level(Level::DEBUG);
        let output = with_capture(Level::DEBUG, || {
            logger.log(&InitEvent::SystemStart {
                system: SystemId::of::<Database>(),
            });
        });
        assert!(output.contains("DEBUG"));
        assert!(output.contains("system starting"));
        assert!(output.contains("Database"));
    }

    #[test]
    fn progress_events_below_subscriber_level_are_dropped() {
        let logger = EventLogger::new().with_level(Level::DEBUG);
        let output = with_capture(Level::INFO, || logger.log(&InitEvent::CriticalReady));
        assert!(output.is_empty());
    }

    #[test]
    fn failures_are_logged_as_errors() {
        let logger = EventLogger::new().with_level(Level::TRACE);
        let output = with_capture(Level::ERROR, || {
            logger.log(&InitEvent::RunFailed {
                error: "disk full".to_string(),
            });
        });
        assert!(output.contains("ERROR"));
        assert!(output.contains("disk full"));
    }

    #[test]
    fn attached_logger_reports_a_full_run() {
        let mut builder = GraphBuilder::new();
        builder.register(Database).unwrap();
        let mut context = builder.build().unwrap();
        EventLogger::new().attach(&context);

        let output = with_capture(Level::INFO, || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            rt.block_on(context.run(&CancellationToken::new())).unwrap();
        });

        for message in [
            "startup begins",
            "batch starting",
            "system starting",
            "system ready",
            "batch complete",
            "critical systems ready",
            "startup complete",
        ] {
            assert!(output.contains(message), "missing '{message}' in:\n{output}");
        }
    }
}
