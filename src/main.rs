use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stream_relay::config::{Cli, RelayConfig, Role};
use stream_relay::supervisor::signals::wait_for_shutdown_signal;
use stream_relay::supervisor::ShutdownReport;
use stream_relay::Relay;

#[tokio::main]
async fn main() -> ExitCode {
    // RUST_LOG overrides the default filter, e.g. RUST_LOG=debug
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,stream_relay=debug")),
        )
        .init();

    exit_code(run(Cli::parse()).await)
}

async fn run(cli: Cli) -> anyhow::Result<ShutdownReport> {
    let config = RelayConfig::try_from(cli).context("could not create configuration")?;

    let role = match config.role {
        Role::Emit { .. } => "emitter",
        Role::Receive { .. } => "receiver",
    };
    tracing::info!(
        role,
        topic = %config.topic,
        healthz_address = %config.health.address,
        healthz_path = %config.health.path,
        "🚀 Starting stream relay"
    );

    let relay = Relay::connect(config).context("could not start stream relay")?;
    let report = relay
        .run(wait_for_shutdown_signal())
        .await
        .context("could not run stream relay")?;
    Ok(report)
}

/// Teardown problems are logged but still count as a clean exit.
fn exit_code(result: anyhow::Result<ShutdownReport>) -> ExitCode {
    match result {
        Ok(report) => {
            if !report.is_clean() {
                tracing::warn!(
                    teardown_errors = report.teardown_errors.len(),
                    grace_exceeded = ?report.grace_exceeded,
                    "Shutdown finished with errors"
                );
            }
            tracing::info!("🛑 Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Stream relay failed");
            ExitCode::FAILURE
        }
    }
}
