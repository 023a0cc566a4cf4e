//! Command handlers
//!
//! Pure functions behind each subcommand; `main` only parses arguments and
//! sets up logging.

pub mod check;
pub mod serve;

use crate::error::CliResult;
use probar_cov::CoverageOptions;
use std::path::Path;

/// Options from `config`, or the defaults when no file is given
pub fn load_options(config: Option<&Path>) -> CliResult<CoverageOptions> {
    match config {
        Some(path) => Ok(CoverageOptions::from_file(path)?),
        None => Ok(CoverageOptions::default()),
    }
}
