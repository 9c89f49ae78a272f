//! The initialization contract implemented by every system.
//!
//! A system is a unit of application state that needs asynchronous setup
//! before the rest of the application may use it. The orchestrator only needs
//! two things from it: an identity (its type) and an async `initialize` routine
//! that honours a [`CancellationToken`].
//!
//! Dependencies are declared explicitly, either through the node handle
//! returned at registration or by implementing [`DeclareDependencies`].
//!
//! # Example
//!
//! ```
//! use ignite_system::id::SystemId;
//! use ignite_system::system::{BoxFuture, DeclareDependencies, InitError, Initializable};
//! use ignite_system::CancellationToken;
//!
//! struct Config;
//!
//! impl Initializable for Config {
//!     fn initialize<'a>(
//!         &'a self,
//!         _cancel: &'a CancellationToken,
//!     ) -> BoxFuture<'a, Result<(), InitError>> {
//!         Box::pin(async { Ok(()) })
//!     }
//! }
//!
//! struct Database;
//!
//! impl Initializable for Database {
//!     fn initialize<'a>(
//!         &'a self,
//!         cancel: &'a CancellationToken,
//!     ) -> BoxFuture<'a, Result<(), InitError>> {
//!         Box::pin(async move {
//!             if cancel.is_cancelled() {
//!                 return Err(InitError::Cancelled);
//!             }
//!             Ok(())
//!         })
//!     }
//! }
//!
//! impl DeclareDependencies for Database {
//!     fn declared_dependencies(&self) -> Vec<SystemId> {
//!         vec![SystemId::of::<Config>()]
//!     }
//! }
//! ```

use core::future::Future;
use core::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::id::SystemId;

/// Errors a system's initialization can complete with.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// The system reported a failure.
    #[error("initialization failed: {0}")]
    Failed(String),

    /// The system observed the cancellation signal and stopped.
    #[error("initialization cancelled")]
    Cancelled,

    /// An underlying error surfaced by the system.
    #[error(transparent)]
    Other(#[from] Box<dyn core::error::Error + Send + Sync>),
}

impl InitError {
    /// Creates an [`InitError::Failed`] from a message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A boxed future that is Send.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A component that must finish asynchronous setup before its dependents start.
///
/// # Implementing
///
/// `initialize` returns a [`BoxFuture`] rather than being an `async fn` so the
/// trait stays object safe; systems are stored as `Arc<dyn Initializable>`.
///
/// ```ignore
/// impl Initializable for Telemetry {
///     fn initialize<'a>(&'a self, cancel: &'a CancellationToken)
///         -> BoxFuture<'a, Result<(), InitError>>
///     {
///         Box::pin(async move {
///             tokio::select! {
///                 _ = cancel.cancelled() => Err(InitError::Cancelled),
///                 res = self.connect() => res,
///             }
///         })
///     }
/// }
/// ```
pub trait Initializable: Send + Sync + 'static {
    /// Runs the system's setup under the given cancellation signal.
    ///
    /// # Errors
    ///
    /// Returns [`InitError`] if setup fails or is abandoned after cancellation.
    fn initialize<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), InitError>>;

    /// Returns the system's name for logs.
    ///
    /// Default implementation returns the type name.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    /// Declares the capabilities this system type provides.
    ///
    /// A dependency on one of these capabilities is satisfied by this system,
    /// and removing one of them drops a declared dependency on this system.
    fn capabilities() -> Vec<SystemId>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

/// External declaration source for a system's dependencies.
///
/// Implemented by systems that know their own dependencies. The builder's
/// `register_declared` applies these identities right after registration,
/// through the same validation as handle-based declarations.
pub trait DeclareDependencies {
    /// Returns the identities this system must wait for.
    fn declared_dependencies(&self) -> Vec<SystemId>;
}
