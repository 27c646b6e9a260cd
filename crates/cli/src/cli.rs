//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// SLAM Ingest - feeds sensor streams into the mapping engine
#[derive(Parser, Debug)]
#[command(
    name = "slam-ingest",
    author,
    version,
    about = "Sensor ingestion and ordering engine for the mapping engine",
    long_about = "Feeds lidar scans and IMU / odometer samples into the mapping engine.\n\n\
                  Online mode paces live sensors and drops what the engine cannot take;\n\
                  offline mode replays a recorded dataset in strict time order with no loss."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SLAM_INGEST_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SLAM_INGEST_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an ingestion session
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "ingest.toml", env = "SLAM_INGEST_CONFIG")]
    pub config: PathBuf,

    /// Override the session mode from configuration
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Override the replay dataset directory from configuration
    #[arg(long, env = "SLAM_INGEST_REPLAY")]
    pub replay: Option<PathBuf>,

    /// Stop the session after this many seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "SLAM_INGEST_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration, build the sources and exit without ingesting
    #[arg(long)]
    pub dry_run: bool,

    /// Write the engine's internal state (JSON) here after the run
    #[arg(long)]
    pub export_state: Option<PathBuf>,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "SLAM_INGEST_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "ingest.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "ingest.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show sensor attributes
    #[arg(long)]
    pub attributes: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

/// Session mode override
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    Online,
    Offline,
}

impl From<ModeArg> for contracts::IngestionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Online => contracts::IngestionMode::Online,
            ModeArg::Offline => contracts::IngestionMode::Offline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_args() {
        let cli = Cli::try_parse_from([
            "slam-ingest",
            "-vv",
            "run",
            "--config",
            "session.toml",
            "--mode",
            "offline",
            "--timeout",
            "30",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, PathBuf::from("session.toml"));
                assert_eq!(args.mode, Some(ModeArg::Offline));
                assert_eq!(args.timeout, 30);
                assert!(!args.dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["slam-ingest", "-q", "-v", "info"]).is_err());
    }

    #[test]
    fn test_log_format_maps_to_observability() {
        let format: observability::LogFormat = LogFormat::Compact.into();
        assert_eq!(format, observability::LogFormat::Compact);
    }
}
