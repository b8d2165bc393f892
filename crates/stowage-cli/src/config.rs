//! CLI configuration for `Stowage`.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Command-line flags take precedence over everything loaded here.

use std::path::PathBuf;

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Log level filter (e.g., `warn`, `debug`).
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// Default internal configuration document for `inject`.
    pub internal_file: Option<PathBuf>,
    /// Default service name for `{{INTERNAL:SERVICE}}`.
    pub service: Option<String>,
}

/// Supported log output formats. Logs always go to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

impl CliConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `STOWAGE_LOG_LEVEL` — log filter (default: `warn`, `RUST_LOG` wins if set)
    /// - `STOWAGE_LOG_FORMAT` — `text` or `json` (default: `text`)
    /// - `STOWAGE_INTERNAL_FILE` — internal configuration JSON (optional)
    /// - `STOWAGE_SERVICE` — service name for `{{INTERNAL:SERVICE}}` (optional)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let log_level = var("STOWAGE_LOG_LEVEL").unwrap_or_else(|| "warn".to_owned());

        let log_format = match var("STOWAGE_LOG_FORMAT")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let internal_file = var("STOWAGE_INTERNAL_FILE")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let service = var("STOWAGE_SERVICE").filter(|v| !v.is_empty());

        Self {
            log_level,
            log_format,
            internal_file,
            service,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> CliConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        CliConfig::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.internal_file.is_none());
        assert!(config.service.is_none());
    }

    #[test]
    fn reads_all_variables() {
        let config = load(&[
            ("STOWAGE_LOG_LEVEL", "debug"),
            ("STOWAGE_LOG_FORMAT", "JSON"),
            ("STOWAGE_INTERNAL_FILE", "/var/lib/stowage/internal.json"),
            ("STOWAGE_SERVICE", "wiki"),
        ]);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.internal_file,
            Some(PathBuf::from("/var/lib/stowage/internal.json"))
        );
        assert_eq!(config.service.as_deref(), Some("wiki"));
    }

    #[test]
    fn empty_values_are_unset() {
        let config = load(&[("STOWAGE_INTERNAL_FILE", ""), ("STOWAGE_SERVICE", "")]);
        assert!(config.internal_file.is_none());
        assert!(config.service.is_none());
    }
}
