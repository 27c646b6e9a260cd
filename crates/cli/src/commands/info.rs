//! `info` command implementation.

use std::collections::HashMap;

use anyhow::{Context, Result};
use contracts::{IngestionBlueprint, IngestionMode, SourceKind};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    session: SessionInfo,
    streams: Vec<StreamInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    replay_path: Option<String>,
    engine: EngineInfo,
}

#[derive(Serialize)]
struct SessionInfo {
    mode: IngestionMode,
    submission_timeout_ms: u64,
}

#[derive(Serialize)]
struct StreamInfo {
    name: String,
    kind: &'static str,
    source: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_frequency_hz: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    capabilities: Vec<&'static str>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    attributes: HashMap<String, String>,
}

#[derive(Serialize)]
struct EngineInfo {
    map_name: String,
    final_optimization_timeout_ms: u64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &IngestionBlueprint, args: &InfoArgs) -> ConfigInfo {
    let attributes = |attrs: &HashMap<String, String>| {
        if args.attributes {
            attrs.clone()
        } else {
            HashMap::new()
        }
    };

    let mut streams = vec![StreamInfo {
        name: blueprint.lidar.name.clone(),
        kind: "lidar",
        source: blueprint.lidar.source,
        data_frequency_hz: blueprint.lidar.data_frequency_hz,
        capabilities: Vec::new(),
        attributes: attributes(&blueprint.lidar.attributes),
    }];

    if let Some(movement) = &blueprint.movement_sensor {
        let capabilities = movement.capabilities();
        let mut supported = Vec::new();
        if capabilities.imu_supported {
            supported.push("imu");
        }
        if capabilities.odometer_supported {
            supported.push("odometer");
        }
        streams.push(StreamInfo {
            name: movement.name.clone(),
            kind: "movement_sensor",
            source: movement.source,
            data_frequency_hz: movement.data_frequency_hz,
            capabilities: supported,
            attributes: attributes(&movement.attributes),
        });
    }

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        session: SessionInfo {
            mode: blueprint.session.mode,
            submission_timeout_ms: blueprint.session.submission_timeout_ms,
        },
        streams,
        replay_path: blueprint
            .replay
            .as_ref()
            .map(|replay| replay.path.display().to_string()),
        engine: EngineInfo {
            map_name: blueprint.engine.map_name.clone(),
            final_optimization_timeout_ms: blueprint.engine.final_optimization_timeout_ms,
        },
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("=== SLAM Ingest Configuration ===\n");

    println!("Session");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Mode: {:?}", info.session.mode);
    println!("   └─ Submission timeout: {} ms", info.session.submission_timeout_ms);

    println!("\nStreams ({})", info.streams.len());
    for (i, stream) in info.streams.iter().enumerate() {
        let is_last = i == info.streams.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let rate = stream
            .data_frequency_hz
            .map(|hz| format!("{hz} Hz"))
            .unwrap_or_else(|| "unpaced".to_string());
        println!(
            "   {} {} ({}, {:?}, {})",
            prefix, stream.name, stream.kind, stream.source, rate
        );
        if !stream.capabilities.is_empty() {
            println!("         capabilities: {}", stream.capabilities.join(", "));
        }
        let mut attributes: Vec<_> = stream.attributes.iter().collect();
        attributes.sort();
        for (key, value) in attributes {
            println!("         {key} = {value}");
        }
    }

    if let Some(ref path) = info.replay_path {
        println!("\nReplay dataset: {}", path);
    }

    println!("\nEngine");
    println!("   ├─ Map: {}", info.engine.map_name);
    println!(
        "   └─ Final optimization timeout: {} ms",
        info.engine.final_optimization_timeout_ms
    );
    println!();
}
