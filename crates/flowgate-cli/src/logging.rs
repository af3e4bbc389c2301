//! Subscriber setup for the `flowgate` binary.
//!
//! Level precedence: `--verbose`, then `RUST_LOG`, then `log.level` from the
//! configuration. Output always goes to stderr so reports on stdout stay
//! machine-readable.

use flowgate_workspace::LogFormat;
use flowgate_workspace::config::LogSection;
use tracing_subscriber::EnvFilter;

use crate::error::{CliError, Result};

/// Level implied by repeated `-v` flags, if any.
#[must_use]
pub fn verbosity_level(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Build the filter without installing anything.
pub fn filter(section: &LogSection, verbose: u8) -> Result<EnvFilter> {
    let directive = match verbosity_level(verbose) {
        Some(level) => level.to_string(),
        None => match std::env::var(EnvFilter::DEFAULT_ENV) {
            Ok(env) if !env.trim().is_empty() => env,
            _ => section.level.to_ascii_lowercase(),
        },
    };
    EnvFilter::try_new(&directive).map_err(|error| CliError::Logging {
        message: format!("invalid filter `{directive}`: {error}"),
    })
}

/// Install the global subscriber.
pub fn init(section: &LogSection, verbose: u8, format: Option<LogFormat>) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(section, verbose)?)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match format.unwrap_or(section.format) {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|error| CliError::Logging {
        message: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(verbosity_level(0), None);
        assert_eq!(verbosity_level(1), Some("debug"));
        assert_eq!(verbosity_level(4), Some("trace"));
    }

    #[test]
    fn verbose_flag_builds_filter() {
        let filter = filter(&LogSection::default(), 2).unwrap();
        assert_eq!(
            filter.max_level_hint(),
            Some(tracing_subscriber::filter::LevelFilter::TRACE)
        );
    }

    #[test]
    fn verbose_flag_overrides_configured_level() {
        let section = LogSection {
            level: "flowgate=[".into(),
            ..LogSection::default()
        };
        let filter = filter(&section, 1).unwrap();
        assert_eq!(
            filter.max_level_hint(),
            Some(tracing_subscriber::filter::LevelFilter::DEBUG)
        );
    }
}
