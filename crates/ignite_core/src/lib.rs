//! Core infrastructure for Ignite.
//!
//! This crate provides the ambient pieces most Ignite applications need:
//!
//! - [`TracingConfig`] - Subscriber setup for the `tracing` crate
//! - [`EventLogger`] - Logs every [`InitEvent`](ignite_graph::InitEvent) of a run
//!
//! # Example
//!
//! ```no_run
//! use ignite_core::{EventLogger, TracingConfig};
//! use ignite_graph::GraphBuilder;
//! use tracing::Level;
//!
//! TracingConfig::default().with_level(Level::DEBUG).install();
//!
//! let context = GraphBuilder::new().build().expect("empty graph builds");
//! EventLogger::new().attach(&context);
//! ```
//!
//! # Architecture
//!
//! - **Layer 1** (`ignite_system`): System contract
//! - **Layer 2** (`ignite_graph`): Graph building and execution
//! - **Infrastructure** (`ignite_core`): Tracing setup and event logging (this crate)

mod event_logger;
mod logging;

pub use event_logger::EventLogger;
pub use logging::{TracingConfig, TracingFormat};
