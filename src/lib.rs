//! Dependency-ordered, batch-parallel startup for interdependent application systems.
//!
//! Register each system with a [`GraphBuilder`](ignite_graph::GraphBuilder),
//! declare what it depends on, then build and run the resulting
//! [`ExecutionContext`](ignite_graph::ExecutionContext). Systems with no ordering
//! relationship initialize concurrently; every dependency completes before its
//! dependents start.

/// Layer 1: The system contract.
pub use ignite_system;

/// Layer 2: Graph building and execution.
pub use ignite_graph;

/// Infrastructure: Tracing setup and event logging.
pub use ignite_core;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use ignite_core::{EventLogger, TracingConfig, TracingFormat};
    pub use ignite_graph::prelude::*;
}
