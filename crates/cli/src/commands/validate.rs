//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{IngestionBlueprint, IngestionMode, SourceKind};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    mode: IngestionMode,
    lidar: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    movement_sensor: Option<String>,
    map: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    mode: blueprint.session.mode,
                    lidar: blueprint.lidar.name.clone(),
                    movement_sensor: blueprint
                        .movement_sensor
                        .as_ref()
                        .map(|m| m.name.clone()),
                    map: blueprint.engine.map_name.clone(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &IngestionBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.movement_sensor.is_none() {
        warnings.push(
            "No movement sensor configured, the engine only receives lidar".to_string(),
        );
    }

    match blueprint.session.mode {
        IngestionMode::Offline => {
            if blueprint.lidar.data_frequency_hz.is_some()
                || blueprint
                    .movement_sensor
                    .as_ref()
                    .is_some_and(|m| m.data_frequency_hz.is_some())
            {
                warnings.push("data_frequency_hz is ignored in offline mode".to_string());
            }
        }
        IngestionMode::Online => {
            if let Some(hz) = blueprint.lidar.data_frequency_hz.filter(|hz| *hz > 0.0) {
                let interval_ms = 1000.0 / hz;
                if blueprint.session.submission_timeout_ms as f64 > interval_ms {
                    warnings.push(format!(
                        "submission_timeout_ms ({}) exceeds the lidar interval \
                         ({interval_ms:.1} ms), a slow engine will stall the loop",
                        blueprint.session.submission_timeout_ms
                    ));
                }
            }
            if blueprint.uses_replay() {
                warnings.push(
                    "Replay readings are dropped on contention in online mode".to_string(),
                );
            }
        }
    }

    if let Some(replay) = &blueprint.replay {
        let records = replay.path.join(sensor_sources::RECORD_FILE);
        if !records.exists() {
            warnings.push(format!(
                "Replay record file not found: {}",
                records.display()
            ));
        }
        if !blueprint.uses_replay() {
            warnings.push(
                "[replay] is set but no stream uses source = \"replay\"".to_string(),
            );
        }
    }

    if let Some(movement) = &blueprint.movement_sensor {
        if movement.source == SourceKind::Mock && blueprint.lidar.source == SourceKind::Replay {
            warnings.push(
                "Replayed lidar with a mock movement sensor, timestamps will not line up"
                    .to_string(),
            );
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Mode: {:?}", summary.mode);
            println!("  Lidar: {}", summary.lidar);
            if let Some(ref movement) = summary.movement_sensor {
                println!("  Movement sensor: {}", movement);
            }
            println!("  Map: {}", summary.map);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
