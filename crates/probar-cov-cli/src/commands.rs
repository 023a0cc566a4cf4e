//! CLI command definitions using clap

use crate::config::ColorChoice;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// probar-cov: coverage-instrumenting test server and threshold checks
#[derive(Parser, Debug)]
#[command(name = "probar-cov")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve a directory with coverage instrumentation
    ///
    /// Browsers report coverage with `POST /__coverage/suite` and the run is
    /// finished with `POST /__coverage/run-end`.
    Serve(ServeArgs),

    /// Merge saved coverage files, write reports and check thresholds
    Check(CheckArgs),
}

/// Arguments for the serve command
#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    /// Directory to serve
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// HTTP port
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Coverage configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// URL prefix the served directory is mounted under
    #[arg(long, default_value = "/")]
    pub client_root: String,

    /// Package token: the URL segment naming the code under test
    #[arg(long, default_value = "")]
    pub package: String,

    /// Enable CORS
    #[arg(long)]
    pub cors: bool,

    /// Stop after the first run-end and exit with its result
    #[arg(long)]
    pub once: bool,
}

/// Arguments for the check command
#[derive(Parser, Debug, Clone)]
pub struct CheckArgs {
    /// Coverage configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Report directory (overrides the configured `dir`)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Coverage files: coverage maps or `{"__coverage__": ...}` payloads
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Color argument
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Auto-detect
    #[default]
    Auto,
    /// Always color
    Always,
    /// Never color
    Never,
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
