//! CLI argument definitions for kubeguard-server.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Kubeguard scan orchestration server.
///
/// Serves the scan/inventory/metrics REST API and drives the
/// cluster vulnerability scan pipeline.
#[derive(Parser, Debug)]
#[command(name = "kubeguard-server")]
#[command(version, about, long_about = None)]
pub struct ServerCli {
    /// Path to kubeguard.toml configuration file.
    #[arg(short, long, default_value = "/etc/kubeguard/kubeguard.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}
