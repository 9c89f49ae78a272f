//! Batch-wise concurrent execution.
//!
//! An [`ExecutionContext`] is produced by [`GraphBuilder::build`](crate::builder::GraphBuilder::build)
//! and owns the frozen nodes, grouped into batches. [`run`](ExecutionContext::run)
//! launches every node of a batch as its own Tokio task, waits for the whole
//! batch, then moves on. Batches never overlap.
//!
//! # Cancellation
//!
//! The cancellation token is handed to every system and checked by the
//! scheduler at batch boundaries only. In-flight systems are never aborted by
//! the scheduler; once cancellation is observed no further batch is started.
//!
//! # Failures
//!
//! The first failing system ends the batch wait immediately and aborts the
//! run. Its siblings keep running detached; they are not force-cancelled.
//!
//! # Critical Systems
//!
//! The critical set captured at build time shrinks as critical systems
//! complete. The instant it becomes empty the "critical ready" signal fires,
//! exactly once.

use core::fmt;
use std::time::{Duration, Instant};

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use hashbrown::HashSet;
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info, info_span, warn};

use ignite_system::CancellationToken;
use ignite_system::id::SystemId;
use ignite_system::system::InitError;

use crate::error::RunError;
use crate::events::{CriticalReady, InitEvent, Observers};
use crate::node::Node;

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Number of batches executed.
    pub batches_executed: usize,
    /// Number of systems initialized.
    pub systems_initialized: usize,
    /// Total run duration.
    pub duration: Duration,
}

/// Lifecycle of an execution context.
///
/// Progresses linearly: `Ready` → `Running` → one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// Built and not yet run.
    #[default]
    Ready,
    /// `run()` is executing.
    Running,
    /// Every batch completed.
    Completed,
    /// Stopped at a batch boundary by the cancellation signal.
    Cancelled,
    /// Aborted by a system failure or an internal fault.
    Failed,
}

type CriticalCallback = Box<dyn FnOnce() + Send + 'static>;

/// The frozen execution plan and its runtime state.
pub struct ExecutionContext {
    /// Frozen nodes, one vector per batch.
    batches: Vec<Vec<Node>>,
    /// Critical systems that have not completed yet.
    critical: HashSet<SystemId>,
    /// Context-level observers, shared with node callbacks.
    observers: Observers,
    /// Awaitable side of the critical-ready signal.
    critical_tx: watch::Sender<bool>,
    /// One-shot critical-ready callbacks.
    critical_callbacks: Vec<CriticalCallback>,
    /// Whether the critical-ready signal already fired.
    critical_fired: bool,
    state: RunState,
}

impl ExecutionContext {
    pub(crate) fn new(mut batches: Vec<Vec<Node>>, critical: HashSet<SystemId>) -> Self {
        let observers = Observers::default();

        for node in batches.iter_mut().flatten() {
            let started = observers.clone();
            node.on_start(move |system| started.emit(&InitEvent::SystemStart { system }));
            let completed = observers.clone();
            node.on_complete(move |system| completed.emit(&InitEvent::SystemComplete { system }));
        }

        let (critical_tx, _) = watch::channel(false);

        Self {
            batches,
            critical,
            observers,
            critical_tx,
            critical_callbacks: Vec::new(),
            critical_fired: false,
            state: RunState::Ready,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the identities of every batch, in execution order.
    ///
    /// Empty once a run has completed.
    #[must_use]
    pub fn batches(&self) -> Vec<Vec<SystemId>> {
        self.batches
            .iter()
            .map(|batch| batch.iter().map(Node::id).collect())
            .collect()
    }

    /// Returns the number of batches in the plan.
    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Returns the number of systems in the plan.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// Returns the critical systems that have not completed yet.
    #[must_use]
    pub fn critical_systems(&self) -> Vec<SystemId> {
        self.critical.iter().copied().collect()
    }

    /// Returns the frozen node of `id`, if it is still held by the plan.
    #[must_use]
    pub fn node(&self, id: &SystemId) -> Option<&Node> {
        self.batches.iter().flatten().find(|node| node.id() == *id)
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Observation
    // ─────────────────────────────────────────────────────────────────────────

    /// Registers an observer for every [`InitEvent`].
    ///
    /// Observers run on whichever task raised the event, including node tasks.
    pub fn observe(&self, observer: impl Fn(&InitEvent) + Send + Sync + 'static) {
        self.observers.register(observer);
    }

    /// Registers a callback for every system start.
    pub fn on_system_started(&self, callback: impl Fn(SystemId) + Send + Sync + 'static) {
        self.observe(move |event| {
            if let InitEvent::SystemStart { system } = event {
                callback(*system);
            }
        });
    }

    /// Registers a callback for every system completion.
    pub fn on_system_completed(&self, callback: impl Fn(SystemId) + Send + Sync + 'static) {
        self.observe(move |event| {
            if let InitEvent::SystemComplete { system } = event {
                callback(*system);
            }
        });
    }

    /// Registers a one-shot callback for the critical-ready signal.
    ///
    /// Invoked immediately if the signal already fired.
    pub fn on_critical_ready(&mut self, callback: impl FnOnce() + Send + 'static) {
        if self.critical_fired {
            callback();
        } else {
            self.critical_callbacks.push(Box::new(callback));
        }
    }

    /// Returns an awaitable handle on the critical-ready signal.
    #[must_use]
    pub fn critical_ready(&self) -> CriticalReady {
        CriticalReady::new(self.critical_tx.subscribe())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Execution
    // ─────────────────────────────────────────────────────────────────────────

    /// Initializes every system, batch by batch.
    ///
    /// Must be called from within a Tokio runtime; each system runs on its own
    /// spawned task.
    ///
    /// # Errors
    ///
    /// - [`RunError::AlreadyExecuted`] if the context was already run
    /// - [`RunError::Cancelled`] if cancellation was observed at a batch boundary,
    ///   or a system stopped with [`InitError::Cancelled`] after the token fired
    /// - [`RunError::SystemFailed`] / [`RunError::Panicked`] for the first
    ///   failing system
    /// - [`RunError::InvariantViolation`] if critical bookkeeping is inconsistent
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<RunReport, RunError> {
        if self.state != RunState::Ready {
            return Err(RunError::AlreadyExecuted);
        }
        self.state = RunState::Running;

        let start = Instant::now();
        let batch_count = self.batch_count();
        let system_count = self.system_count();

        info!(
            batches = batch_count,
            systems = system_count,
            critical = self.critical.len(),
            "starting initialization"
        );
        self.observers.emit(&InitEvent::RunStart {
            batch_count,
            system_count,
        });

        if cancel.is_cancelled() {
            return Err(self.cancelled(0));
        }
        if self.critical.is_empty() {
            self.fire_critical_ready();
        }

        let mut systems_initialized = 0;
        for index in 0..batch_count {
            if cancel.is_cancelled() {
                return Err(self.cancelled(index));
            }

            let batch_start = Instant::now();
            let systems: Vec<SystemId> = self.batches[index].iter().map(Node::id).collect();
            self.observers.emit(&InitEvent::BatchStart {
                index,
                systems: systems.clone(),
            });

            let span = info_span!("batch", index, size = systems.len());
            let outcome = run_batch(&mut self.batches[index], cancel)
                .instrument(span)
                .await;
            if let Err(err) = outcome {
                if cancel.is_cancelled() && stopped_by_cancellation(&err) {
                    return Err(self.cancelled(index));
                }
                return Err(self.failed(err));
            }
            systems_initialized += systems.len();

            if cancel.is_cancelled() {
                return Err(self.cancelled(index + 1));
            }

            let duration = batch_start.elapsed();
            debug!(index, ?duration, "batch complete");
            self.observers
                .emit(&InitEvent::BatchComplete { index, duration });

            if let Err(err) = self.retire_critical(index) {
                return Err(self.failed(err));
            }
        }

        let duration = start.elapsed();
        self.state = RunState::Completed;
        self.batches.clear();
        self.critical.clear();
        self.critical_callbacks.clear();

        info!(systems = systems_initialized, ?duration, "initialization complete");
        self.observers.emit(&InitEvent::RunComplete {
            systems_initialized,
            duration,
        });

        Ok(RunReport {
            batches_executed: batch_count,
            systems_initialized,
            duration,
        })
    }

    /// Removes the critical members of a completed batch from the critical set.
    fn retire_critical(&mut self, index: usize) -> Result<(), RunError> {
        let retiring: Vec<SystemId> = self.batches[index]
            .iter()
            .filter(|node| node.is_critical())
            .map(Node::id)
            .collect();

        for system in retiring {
            if !self.critical.remove(&system) {
                return Err(RunError::InvariantViolation { system });
            }
            debug!(%system, remaining = self.critical.len(), "critical system ready");
            if self.critical.is_empty() {
                self.fire_critical_ready();
            }
        }
        Ok(())
    }

    fn fire_critical_ready(&mut self) {
        if self.critical_fired {
            return;
        }
        self.critical_fired = true;

        info!("critical systems initialized");
        self.critical_tx.send_replace(true);
        for callback in core::mem::take(&mut self.critical_callbacks) {
            callback();
        }
        self.observers.emit(&InitEvent::CriticalReady);
    }

    fn cancelled(&mut self, completed_batches: usize) -> RunError {
        self.state = RunState::Cancelled;
        warn!(completed_batches, "initialization cancelled");
        self.observers
            .emit(&InitEvent::RunCancelled { completed_batches });
        RunError::Cancelled { completed_batches }
    }

    fn failed(&mut self, err: RunError) -> RunError {
        self.state = RunState::Failed;
        error!(error = %err, "initialization aborted");
        self.observers.emit(&InitEvent::RunFailed {
            error: err.to_string(),
        });
        err
    }
}

/// Returns true if a system gave up because it observed the cancellation signal.
fn stopped_by_cancellation(err: &RunError) -> bool {
    matches!(
        err,
        RunError::SystemFailed {
            source: InitError::Cancelled,
            ..
        }
    )
}

/// Spawns one task per node and waits for all of them.
///
/// Returns on the first failure; remaining join handles are dropped, which
/// detaches their tasks instead of aborting them.
async fn run_batch(batch: &mut [Node], cancel: &CancellationToken) -> Result<(), RunError> {
    let mut pending: FuturesUnordered<_> = batch
        .iter_mut()
        .map(|node| {
            let system = node.id();
            let span = info_span!("system", name = system.short_name());
            let handle = tokio::spawn(node.initialize_task(cancel.clone()).instrument(span));
            async move { (system, handle.await) }
        })
        .collect();

    while let Some((system, joined)) = pending.next().await {
        match joined {
            Ok(Ok(())) => debug!(%system, "system initialized"),
            Ok(Err(source)) => return Err(RunError::SystemFailed { system, source }),
            Err(join_error) if join_error.is_panic() => {
                return Err(RunError::Panicked { system });
            }
            Err(_) => {
                return Err(RunError::SystemFailed {
                    system,
                    source: InitError::Cancelled,
                });
            }
        }
    }
    Ok(())
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("batches", &self.batches())
            .field("critical", &self.critical)
            .field("observers", &self.observers)
            .field("critical_fired", &self.critical_fired)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
