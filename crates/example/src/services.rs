//! Simulated application services.
//!
//! Each service sleeps for a fixed setup time, honouring cancellation while it
//! waits. A service can be told to fail to show how a broken startup surfaces.

use std::time::Duration;

use ignite_system::CancellationToken;
use ignite_system::id::{Capability, SystemId};
use ignite_system::system::{BoxFuture, InitError, Initializable};

/// Anything that can serve as a key/value store.
pub struct KeyValueStore;
impl Capability for KeyValueStore {}

/// Waits for `setup`, or returns [`InitError::Cancelled`] if cancelled first.
async fn simulate(
    name: &str,
    setup: Duration,
    fail: bool,
    cancel: &CancellationToken,
) -> Result<(), InitError> {
    tokio::select! {
        () = cancel.cancelled() => return Err(InitError::Cancelled),
        () = tokio::time::sleep(setup) => {}
    }
    if fail {
        return Err(InitError::failed(format!("{name} could not start")));
    }
    tracing::debug!(service = name, ?setup, "service up");
    Ok(())
}

macro_rules! service {
    ($(#[$meta:meta])* $name:ident, $label:literal, $millis:literal $(, provides $cap:ty)?) => {
        $(#[$meta])*
        #[derive(Debug, Default)]
        pub struct $name {
            fail: bool,
        }

        impl $name {
            /// Creates the service; with `fail` set, initialization fails
            /// after the setup delay.
            #[must_use]
            pub fn with_failure(fail: bool) -> Self {
                Self { fail }
            }
        }

        impl Initializable for $name {
            fn initialize<'a>(
                &'a self,
                cancel: &'a CancellationToken,
            ) -> BoxFuture<'a, Result<(), InitError>> {
                Box::pin(simulate($label, Duration::from_millis($millis), self.fail, cancel))
            }

            fn name(&self) -> &str {
                $label
            }

            $(
                fn capabilities() -> Vec<SystemId> {
                    vec![SystemId::capability::<$cap>()]
                }
            )?
        }
    };
}

service!(
    /// Loads configuration.
    Config,
    "config",
    50
);
service!(
    /// Opens the primary database pool.
    Database,
    "database",
    200,
    provides KeyValueStore
);
service!(
    /// Connects to the cache cluster.
    Cache,
    "cache",
    120,
    provides KeyValueStore
);
service!(
    /// Starts the metrics exporter.
    Metrics,
    "metrics",
    80
);
service!(
    /// Binds the public HTTP listener.
    HttpServer,
    "http",
    100
);
