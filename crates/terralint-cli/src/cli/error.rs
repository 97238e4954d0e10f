//! Errors that stop the tool before any report is produced

use terralint_core::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A `--var` flag not of the form `name=value`
    #[error("invalid variable '{0}', expected name=value")]
    InvalidVariable(String),

    #[error("{0} is not a directory")]
    NotADirectory(String),

    #[error("unable to write output: {0}")]
    Io(#[from] std::io::Error),
}
