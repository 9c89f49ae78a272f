//! Context-level notifications.
//!
//! Every node's start/complete callbacks are re-broadcast by the
//! [`ExecutionContext`](crate::context::ExecutionContext) as [`InitEvent`]s,
//! alongside batch and run lifecycle events. Observers receive `&InitEvent`
//! and match on the variants they care about.
//!
//! # Example
//!
//! ```ignore
//! context.observe(|event: &InitEvent| match event {
//!     InitEvent::SystemStart { system } => tracing::info!(%system, "starting"),
//!     InitEvent::CriticalReady => tracing::info!("critical systems ready"),
//!     _ => {}
//! });
//! ```

use core::fmt;
use core::time::Duration;
use std::sync::Arc;

use ignite_system::id::SystemId;
use parking_lot::RwLock;
use tokio::sync::watch;

/// Events emitted while an execution context runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitEvent {
    // ─────────────────────────────────────────────────────────────────────────
    // Run-Level Events
    // ─────────────────────────────────────────────────────────────────────────
    /// Emitted before the first batch is launched.
    RunStart {
        /// Number of batches in the plan.
        batch_count: usize,
        /// Number of systems in the plan.
        system_count: usize,
    },

    /// Emitted after the last batch completed.
    RunComplete {
        /// Number of systems initialized.
        systems_initialized: usize,
        /// Total run duration.
        duration: Duration,
    },

    /// Emitted when the cancellation signal stopped the run.
    RunCancelled {
        /// Batches that fully completed.
        completed_batches: usize,
    },

    /// Emitted when a system failure or internal fault aborted the run.
    RunFailed {
        /// Error message.
        error: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Batch Events
    // ─────────────────────────────────────────────────────────────────────────
    /// Emitted before a batch's systems are launched.
    BatchStart {
        /// Zero-based batch index.
        index: usize,
        /// Systems in the batch.
        systems: Vec<SystemId>,
    },

    /// Emitted after every system of a batch completed.
    BatchComplete {
        /// Zero-based batch index.
        index: usize,
        /// Wall-clock duration of the batch.
        duration: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // System Events
    // ─────────────────────────────────────────────────────────────────────────
    /// Emitted when a system starts initializing.
    SystemStart {
        /// The starting system.
        system: SystemId,
    },

    /// Emitted when a system finished initializing.
    SystemComplete {
        /// The completed system.
        system: SystemId,
    },

    /// Emitted once, when the last critical system completed.
    CriticalReady,
}

/// Type-erased observer.
pub type BoxedObserver = Box<dyn Fn(&InitEvent) + Send + Sync>;

/// Shared observer registry.
///
/// Cloned into every node callback so events raised on worker tasks reach
/// observers registered after the graph was built. Observers must not register
/// further observers from inside a notification.
#[derive(Clone, Default)]
pub(crate) struct Observers {
    inner: Arc<RwLock<Vec<BoxedObserver>>>,
}

impl Observers {
    pub(crate) fn register(&self, observer: impl Fn(&InitEvent) + Send + Sync + 'static) {
        self.inner.write().push(Box::new(observer));
    }

    pub(crate) fn emit(&self, event: &InitEvent) {
        for observer in self.inner.read().iter() {
            observer(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.read().len()
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.len())
            .finish()
    }
}

/// Awaitable view of the "critical systems ready" signal.
///
/// Obtained from [`ExecutionContext::critical_ready`](crate::context::ExecutionContext::critical_ready)
/// before the run starts, then awaited from another task.
///
/// ```ignore
/// let ready = context.critical_ready();
/// tokio::spawn(async move {
///     if ready.wait().await {
///         serve_requests().await;
///     }
/// });
/// context.run(&cancel).await?;
/// ```
#[derive(Debug, Clone)]
pub struct CriticalReady {
    rx: watch::Receiver<bool>,
}

impl CriticalReady {
    pub(crate) fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// Returns true if the signal already fired.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits for the signal.
    ///
    /// Returns `false` if the context was dropped before it fired.
    pub async fn wait(mut self) -> bool {
        self.rx.wait_for(|ready| *ready).await.is_ok()
    }
}
