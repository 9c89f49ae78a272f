//! Example application bootstrap built with Ignite.
//!
//! Wires five simulated services into a startup graph:
//!
//! ```text
//!   config ──▶ database ─┐
//!          └─▶ cache ────┴─▶ http
//!   metrics ─────────────────▲
//! ```
//!
//! `database` is critical: the application may accept traffic once it is up,
//! even while the HTTP listener is still binding.

pub mod services;

use ignite_graph::{BuildError, ExecutionContext, GraphBuilder};
use services::{Cache, Config, Database, HttpServer, KeyValueStore, Metrics};

/// Builds the startup plan.
///
/// `failing` names a service (by its label) whose initialization should fail.
///
/// # Errors
///
/// Returns [`BuildError`] if the graph is invalid.
pub fn build_plan(failing: Option<&str>) -> Result<ExecutionContext, BuildError> {
    let fails = |label: &str| failing == Some(label);
    let mut builder = GraphBuilder::new();

    builder.register(Config::with_failure(fails("config")))?;
    builder.register(Metrics::with_failure(fails("metrics")))?;
    builder
        .register(Database::with_failure(fails("database")))?
        .depends_on::<Config>()?
        .set_critical()?;
    builder
        .register(Cache::with_failure(fails("cache")))?
        .depends_on::<Config>()?;
    builder
        .register(HttpServer::with_failure(fails("http")))?
        .depends_on_capability::<KeyValueStore>()?
        .depends_on::<Metrics>()?;

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ignite_graph::RunError;
    use ignite_system::CancellationToken;
    use ignite_system::id::SystemId;

    #[test]
    fn plan_has_three_batches() {
        let context = build_plan(None).unwrap();
        assert_eq!(
            context.batches(),
            vec![
                vec![SystemId::of::<Config>(), SystemId::of::<Metrics>()],
                vec![SystemId::of::<Database>(), SystemId::of::<Cache>()],
                vec![SystemId::of::<HttpServer>()],
            ]
        );
        assert_eq!(context.critical_systems(), vec![SystemId::of::<Database>()]);
    }

    #[tokio::test]
    async fn failing_service_aborts_startup() {
        let mut context = build_plan(Some("cache")).unwrap();
        let err = context.run(&CancellationToken::new()).await.unwrap_err();
        assert!(
            matches!(err, RunError::SystemFailed { system, .. } if system == SystemId::of::<Cache>())
        );
    }
}
