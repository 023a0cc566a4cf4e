//! probar-cov CLI library
//!
//! Command-line front end for `probar-cov`: a static test server whose
//! JavaScript is instrumented on the fly, and an offline threshold check.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;
pub mod server;

pub use commands::{CheckArgs, Cli, ColorArg, Commands, ServeArgs};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::Printer;
pub use server::{
    CoverageServer, CoverageServerConfig, CoverageServerConfigBuilder, RunEndEvent, RunOutcome,
    SuiteEvent, RUN_END_PATH, SUITE_PATH,
};
