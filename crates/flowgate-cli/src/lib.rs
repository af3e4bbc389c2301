#![forbid(unsafe_code)]

//! Library side of the `flowgate` binary: argument parsing, dispatch, logging
//! setup, and exit codes.

pub mod cli;
pub mod error;
pub mod logging;

pub use cli::{Cli, Commands, execute, load_config, run_from};
pub use error::{CliError, EXIT_DATA, EXIT_USAGE, Result};
