//! The system contract for Ignite (Layer 1).
//!
//! `ignite_system` defines what the startup orchestrator needs from each
//! component it brings up:
//!
//! - [`id`] - Type-based identities for systems and capabilities
//! - [`mod@system`] - The async [`Initializable`](system::Initializable) trait and
//!   the explicit [`DeclareDependencies`](system::DeclareDependencies) source
//!
//! # Architecture
//!
//! - **Layer 1** (`ignite_system`): System contract (this crate)
//! - **Layer 2** (`ignite_graph`): Dependency graph, batching and execution
//! - **Infrastructure** (`ignite_core`): Tracing setup and event logging

/// Identities for systems and capabilities.
pub mod id;

/// The initialization contract.
pub mod system;

/// The cancellation signal threaded through every initialization call.
pub use tokio_util::sync::CancellationToken;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::CancellationToken;
    pub use crate::id::*;
    pub use crate::system::*;
}
