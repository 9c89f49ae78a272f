//! Build-time and run-time errors.
//!
//! [`BuildError`] covers everything detected while declaring and freezing the
//! graph. It is fail-fast: the builder performs no partial recovery.
//! [`RunError`] covers the outcomes of [`ExecutionContext::run`](crate::context::ExecutionContext::run)
//! other than full completion, including cancellation.

use ignite_system::id::SystemId;
use ignite_system::system::InitError;

/// Errors detected while declaring dependencies or building the batch plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// Two systems were registered under the same identity.
    #[error("system '{system}' was already added to the graph builder")]
    DuplicateSystem {
        /// The identity registered twice.
        system: SystemId,
    },

    /// A declared dependency does not denote an initializable system or capability.
    #[error("dependency '{dependency}' of '{system}' is not an initializable system or capability")]
    ConstraintViolation {
        /// The node the declaration was made on.
        system: SystemId,
        /// The rejected dependency identity.
        dependency: SystemId,
    },

    /// A node was mutated (or its dependencies resolved) after it was frozen.
    #[error(
        "node '{system}' has already been validated; {operation} is only allowed before the graph is built"
    )]
    Lifecycle {
        /// The frozen node.
        system: SystemId,
        /// The rejected operation.
        operation: &'static str,
    },

    /// A resolved dependency names an identity no registered system satisfies.
    #[error(
        "system '{system}' has dependency '{dependency}' which was not added to the graph builder"
    )]
    UnresolvedDependency {
        /// The dependent node.
        system: SystemId,
        /// The missing dependency.
        dependency: SystemId,
    },

    /// Batching stopped with nodes whose dependencies can never be satisfied.
    #[error("cyclic dependencies detected: {}", join_names(.systems))]
    CyclicDependency {
        /// Every node left with a positive in-degree.
        systems: Vec<SystemId>,
    },
}

/// Errors and early terminations of a run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The cancellation signal was observed at a batch boundary.
    #[error("initialization cancelled after {completed_batches} completed batch(es)")]
    Cancelled {
        /// Batches that fully completed before the run stopped.
        completed_batches: usize,
    },

    /// The context is single-use and was already run.
    #[error("execution context has already been run")]
    AlreadyExecuted,

    /// A completed critical node was missing from the critical set.
    ///
    /// Indicates a bookkeeping bug rather than a user error.
    #[error(
        "critical system '{system}' was not tracked; critical systems must be marked before initialization begins"
    )]
    InvariantViolation {
        /// The critical node that was not tracked.
        system: SystemId,
    },

    /// A system's initialization returned an error.
    #[error("system '{system}' failed to initialize: {source}")]
    SystemFailed {
        /// The failing system.
        system: SystemId,
        /// The error it reported.
        #[source]
        source: InitError,
    },

    /// A system's initialization task panicked.
    #[error("system '{system}' panicked during initialization")]
    Panicked {
        /// The panicking system.
        system: SystemId,
    },
}

impl RunError {
    /// Returns true if the run stopped because of the cancellation signal.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled { .. })
    }
}

fn join_names(systems: &[SystemId]) -> String {
    systems
        .iter()
        .map(SystemId::short_name)
        .collect::<Vec<_>>()
        .join(", ")
}
