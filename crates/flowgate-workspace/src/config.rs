//! Analysis configuration.
//!
//! Every setting has a default, so an empty file (or no file) is a valid
//! configuration. Load from TOML or JSON:
//!
//! ```toml
//! # flowgate.toml
//! [walker]
//! channel_errors = "abort"
//!
//! [events]
//! delimiter = "\t"
//!
//! [report]
//! format = "json"
//! sort = true
//!
//! [execution]
//! parallel = false
//!
//! [log]
//! level = "debug"
//! format = "json"
//! ```

use std::path::Path;

use flowgate_core::{ChannelErrorPolicy, WalkerConfig};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkspaceError};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

// ---------------------------------------------------------------------------
// Top-level AnalysisConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub walker: WalkerSection,
    pub events: EventsSection,
    pub report: ReportSection,
    pub execution: ExecutionSection,
    pub log: LogSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkerSection {
    /// What an unknown channel does to a run.
    pub channel_errors: ChannelErrorPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsSection {
    /// Single-byte field delimiter of event tables.
    pub delimiter: String,
}

impl Default for EventsSection {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Csv,
    Json,
}

impl ReportFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSection {
    pub format: ReportFormat,
    /// Sort rows by `(ancestor_path, label)` instead of tree order.
    pub sort: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    /// Evaluate independent hierarchies on the rayon pool.
    pub parallel: bool,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self { parallel: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load from a file; `.json` files are JSON, anything else is TOML. The
    /// result is validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| WorkspaceError::io(path, source))?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content)?,
            _ => Self::from_toml_str(&content)?,
        };
        config.validated()
    }

    /// Returns a list of problems. An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.events.delimiter.len() != 1 {
            errors.push(format!(
                "events.delimiter must be a single byte, got {:?}",
                self.events.delimiter
            ));
        }

        if !LOG_LEVELS.contains(&self.log.level.to_ascii_lowercase().as_str()) {
            errors.push(format!(
                "log.level must be one of {}, got {:?}",
                LOG_LEVELS.join(", "),
                self.log.level
            ));
        }

        errors
    }

    pub fn validated(self) -> Result<Self> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(WorkspaceError::InvalidConfig(errors))
        }
    }

    /// Field delimiter for event tables. Falls back to `,` when the
    /// configured delimiter is not a single byte.
    #[must_use]
    pub fn delimiter(&self) -> u8 {
        match self.events.delimiter.as_bytes() {
            [byte] => *byte,
            _ => b',',
        }
    }

    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            channel_errors: self.walker.channel_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_validates_clean() {
        let errors = AnalysisConfig::default().validate();
        assert!(errors.is_empty(), "default should validate: {errors:?}");
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(
            AnalysisConfig::from_toml_str("").unwrap(),
            AnalysisConfig::default()
        );
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config = AnalysisConfig::from_toml_str(
            "[walker]\nchannel_errors = \"abort\"\n\n[events]\ndelimiter = \"\\t\"\n",
        )
        .unwrap();
        assert_eq!(config.walker.channel_errors, ChannelErrorPolicy::Abort);
        assert_eq!(config.delimiter(), b'\t');
        assert!(config.execution.parallel);
        assert_eq!(config.report.format, ReportFormat::Csv);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn json_sections_load() {
        let config =
            AnalysisConfig::from_json_str(r#"{"report": {"format": "json", "sort": true}}"#)
                .unwrap();
        assert_eq!(config.report.format, ReportFormat::Json);
        assert!(config.report.sort);
        assert_eq!(config.walker_config(), WalkerConfig::default());
    }

    #[test]
    fn multiple_validation_errors_collected() {
        let mut config = AnalysisConfig::default();
        config.events.delimiter = ";;".into();
        config.log.level = "loud".into();
        let errors = config.validate();
        assert_eq!(errors.len(), 2, "should catch both errors: {errors:?}");
        assert!(matches!(
            config.validated(),
            Err(WorkspaceError::InvalidConfig(list)) if list.len() == 2
        ));
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        assert!(matches!(
            AnalysisConfig::from_toml_str("[walker]\nchannel_errors = \"ignore\"\n"),
            Err(WorkspaceError::Toml(_))
        ));
    }
}
