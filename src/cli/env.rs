use clap::Parser;
use std::path::PathBuf;

use super::commands::Commands;

#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Enable debug mode
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Connect to an already running browser instead of launching one
    #[arg(long, value_name = "WS_URL", global = true)]
    pub ws_url: Option<String>,

    /// Browser executable to launch
    #[arg(long, value_name = "PATH", global = true)]
    pub chrome_path: Option<PathBuf>,

    /// Show the browser window
    #[arg(long, global = true)]
    pub headful: bool,

    /// Navigate here before running the command
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Print protocol traffic metrics to stderr when the command finishes
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}
