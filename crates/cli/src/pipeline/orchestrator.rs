//! Session orchestrator - builds the sources, the engine facade and the ingestion
//! supervisor from a blueprint and drives one run to its end.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use contracts::IngestionBlueprint;
use ingestion::{IngestionConfig, IngestionSupervisor};
use mapping_facade::{EngineLibrary, InMemoryMapBuilder, LockedMappingFacade};
use sensor_sources::{SensorSources, SourceFactory};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::SessionStats;
use crate::error::CliError;

type Facade = LockedMappingFacade<InMemoryMapBuilder>;

/// Session configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The validated ingestion blueprint
    pub blueprint: IngestionBlueprint,

    /// Session timeout (None = run until the data ends or a signal arrives)
    pub timeout: Option<Duration>,

    /// Where to write the engine's internal state after the run
    pub export_state: Option<PathBuf>,
}

/// Everything a running session owns
struct Session {
    library: Arc<EngineLibrary>,
    facade: Arc<Facade>,
    supervisor: IngestionSupervisor,
}

/// Build the sources and the engine, then start ingesting
fn assemble(
    blueprint: &IngestionBlueprint,
    token: CancellationToken,
) -> crate::error::Result<Session> {
    let SensorSources { lidar, movement } = SourceFactory::build(blueprint)?;

    let library = Arc::new(EngineLibrary::init(blueprint.engine.clone())?);
    let facade = Arc::new(LockedMappingFacade::new(
        Arc::clone(&library),
        InMemoryMapBuilder::new(blueprint.engine.map_name.clone()),
    ));

    let config = IngestionConfig::from_blueprint(blueprint, Arc::clone(&facade), lidar, movement)?;
    let supervisor = IngestionSupervisor::start(config, token)?;

    Ok(Session {
        library,
        facade,
        supervisor,
    })
}

/// Main session orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Check that the sources and the engine can be built, without ingesting
    pub fn dry_run(&self) -> Result<()> {
        let blueprint = &self.config.blueprint;
        SourceFactory::build(blueprint).map_err(CliError::from)?;
        let library =
            EngineLibrary::init(blueprint.engine.clone()).map_err(CliError::from)?;
        library.terminate();
        Ok(())
    }

    /// Run one session to completion
    ///
    /// The session ends when every task is done, when `shutdown` resolves or when the
    /// configured timeout elapses; the last two cancel the shared token.
    pub async fn run<F>(self, shutdown: F) -> Result<SessionStats>
    where
        F: Future<Output = ()>,
    {
        let token = CancellationToken::new();
        let Session {
            library,
            facade,
            supervisor,
        } = assemble(&self.config.blueprint, token.clone()).context("Failed to start session")?;

        let deadline = async {
            match self.config.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let wait = supervisor.wait();
        tokio::pin!(wait);
        tokio::pin!(shutdown);
        tokio::pin!(deadline);

        let report = tokio::select! {
            report = &mut wait => report,
            _ = &mut shutdown => {
                warn!("Received shutdown signal, stopping ingestion...");
                token.cancel();
                (&mut wait).await
            }
            _ = &mut deadline => {
                info!(
                    timeout = ?self.config.timeout,
                    "Session timeout reached, stopping ingestion..."
                );
                token.cancel();
                (&mut wait).await
            }
        };

        let result = match report {
            Ok(report) => {
                let snapshot = facade.snapshot().await;
                if let Some(path) = &self.config.export_state {
                    export_state(&facade, path).await?;
                }
                Ok(SessionStats { report, snapshot })
            }
            Err(e) => {
                Err(anyhow::Error::new(CliError::from(e)).context("Ingestion failed"))
            }
        };

        library.terminate();
        result
    }
}

async fn export_state(facade: &Facade, path: &Path) -> Result<()> {
    let state = facade
        .internal_state()
        .await
        .context("Failed to serialize engine state")?;
    tokio::fs::write(path, &state)
        .await
        .with_context(|| format!("Failed to write engine state to {}", path.display()))?;
    info!(path = %path.display(), bytes = state.len(), "Engine state exported");
    Ok(())
}
