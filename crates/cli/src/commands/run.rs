//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_session(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(mode) = args.mode {
        info!(?mode, "Overriding session mode from CLI");
        blueprint.session.mode = mode.into();
    }
    if let Some(ref path) = args.replay {
        info!(path = %path.display(), "Overriding replay dataset from CLI");
        blueprint.replay = Some(contracts::ReplayConfig { path: path.clone() });
    }
    if args.mode.is_some() || args.replay.is_some() {
        config_loader::ConfigLoader::validate(&blueprint)
            .context("Configuration invalid after CLI overrides")?;
    }

    info!(
        mode = ?blueprint.session.mode,
        lidar = %blueprint.lidar.name,
        movement = blueprint.movement_sensor.as_ref().map(|m| m.name.as_str()),
        map = %blueprint.engine.map_name,
        "Configuration loaded"
    );

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        export_state: args.export_state.clone(),
    });

    if args.dry_run {
        pipeline.dry_run()?;
        info!("Dry run mode - configuration and sources are valid, exiting");
        println!("Configuration and sources are valid: {}", args.config.display());
        return Ok(());
    }

    info!("Starting ingestion...");
    let stats = pipeline.run(shutdown_signal()).await?;

    info!(
        complete = stats.report.is_complete(),
        accepted = stats.report.metrics.total_accepted,
        dropped = stats.report.metrics.total_dropped,
        duration_secs = stats.report.elapsed.as_secs_f64(),
        "Session finished"
    );
    stats.print_summary();

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
