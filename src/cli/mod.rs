//! Command-line surface of `adtech-sync`

pub mod commands;
pub mod error;
pub mod logging;

pub use error::CliError;
