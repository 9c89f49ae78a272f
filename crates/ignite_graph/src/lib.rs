//! Dependency graph, batch planning and concurrent execution for Ignite (Layer 2).
//!
//! `ignite_graph` turns a set of [`Initializable`](ignite_system::system::Initializable)
//! systems and their declared dependencies into an ordered list of batches,
//! then initializes each batch concurrently.
//!
//! # Core Concepts
//!
//! - [`Node`] - A registered system plus its dependency declarations
//! - [`GraphBuilder`] - Registration, validation and batch planning
//! - [`ExecutionContext`] - The frozen plan and its single-use runner
//! - [`InitEvent`] - Run, batch and system notifications
//!
//! # Example
//!
//! ```ignore
//! use ignite_graph::prelude::*;
//!
//! let mut builder = GraphBuilder::new();
//! builder.register(Config::default())?;
//! builder.register(Database::default())?.depends_on::<Config>()?.set_critical()?;
//! builder.register(Api::default())?.depends_on::<Database>()?;
//!
//! let mut context = builder.build()?;
//! context.on_critical_ready(|| tracing::info!("ready to serve"));
//! let report = context.run(&CancellationToken::new()).await?;
//! ```
//!
//! # Architecture
//!
//! - **Layer 1** (`ignite_system`): System contract
//! - **Layer 2** (`ignite_graph`): Graph building and execution (this crate)
//! - **Infrastructure** (`ignite_core`): Tracing setup and event logging

/// Graph construction and batch planning.
pub mod builder;

/// Batch-wise concurrent execution.
pub mod context;

/// Build-time and run-time errors.
pub mod error;

/// Context-level notifications.
pub mod events;

/// Per-system dependency declarations.
pub mod node;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::builder::{GraphBuilder, UnresolvedPolicy};
    pub use crate::context::{ExecutionContext, RunReport, RunState};
    pub use crate::error::{BuildError, RunError};
    pub use crate::events::{BoxedObserver, CriticalReady, InitEvent};
    pub use crate::node::{Node, NodeCallback};
    pub use ignite_system::prelude::*;
}

// Re-export key types at crate root for convenience
pub use builder::{GraphBuilder, UnresolvedPolicy};
pub use context::{ExecutionContext, RunReport, RunState};
pub use error::{BuildError, RunError};
pub use events::{CriticalReady, InitEvent};
pub use node::Node;
