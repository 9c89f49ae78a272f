//! Example application startup CLI.
//!
//! Brings up a handful of simulated services in dependency order, logging
//! progress as it goes. Ctrl-C cancels the startup at the next batch boundary.
//!
//! # Usage
//!
//! ```bash
//! startup [--fail <service>]
//! ```
//!
//! # Example
//!
//! ```bash
//! RUST_LOG=debug startup --fail cache
//! ```

use example::build_plan;
use ignite_core::{EventLogger, TracingConfig, TracingFormat};
use ignite_system::CancellationToken;

#[tokio::main]
async fn main() {
    TracingConfig::default()
        .with_format(TracingFormat::Compact)
        .install();

    let args: Vec<String> = std::env::args().collect();
    let failing = match args.as_slice() {
        [_] => None,
        [_, flag, service] if flag == "--fail" => Some(service.as_str()),
        _ => {
            eprintln!("Usage: startup [--fail <service>]");
            eprintln!("Services: config, metrics, database, cache, http");
            std::process::exit(2);
        }
    };

    let mut context = match build_plan(failing) {
        Ok(context) => context,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    EventLogger::new().attach(&context);
    context.on_critical_ready(|| tracing::info!("accepting traffic"));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match context.run(&cancel).await {
        Ok(report) => tracing::info!(
            systems = report.systems_initialized,
            batches = report.batches_executed,
            duration = ?report.duration,
            "application started"
        ),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
