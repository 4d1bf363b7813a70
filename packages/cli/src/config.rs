//! CLI configuration, populated from environment variables.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;

/// Serialisation format for documents written by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => Err(format!("unknown output format {other:?}, expected json or yaml")),
        }
    }
}

/// Runtime configuration for the `schemapack` binary.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `SCHEMAPACK_LOG` | `RUST_LOG`, else `schemapack=warn` | `tracing` filter directives |
/// | `SCHEMAPACK_OUTPUT` | `json` | Default document format (`json` or `yaml`) |
///
/// Command-line flags take precedence over these values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    pub log_filter: String,
    pub output_format: OutputFormat,
}

impl CliConfig {
    pub const DEFAULT_LOG_FILTER: &'static str = "schemapack=warn";

    /// Populate config from the process environment.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Populate config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let log_filter = lookup("SCHEMAPACK_LOG")
            .or_else(|| lookup("RUST_LOG"))
            .unwrap_or_else(|| Self::DEFAULT_LOG_FILTER.to_owned());

        let output_format = match lookup("SCHEMAPACK_OUTPUT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| format!("SCHEMAPACK_OUTPUT: {e}"))?,
            None => OutputFormat::default(),
        };

        Ok(Self {
            log_filter,
            output_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = CliConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.log_filter, "schemapack=warn");
        assert_eq!(config.output_format, OutputFormat::Json);
    }

    #[test]
    fn schemapack_log_wins_over_rust_log() {
        let config = CliConfig::from_lookup(lookup(&[
            ("RUST_LOG", "info"),
            ("SCHEMAPACK_LOG", "schemapack=debug"),
        ]))
        .unwrap();
        assert_eq!(config.log_filter, "schemapack=debug");

        let config = CliConfig::from_lookup(lookup(&[("RUST_LOG", "info")])).unwrap();
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn output_format_parsed() {
        let config = CliConfig::from_lookup(lookup(&[("SCHEMAPACK_OUTPUT", "YAML")])).unwrap();
        assert_eq!(config.output_format, OutputFormat::Yaml);

        let err = CliConfig::from_lookup(lookup(&[("SCHEMAPACK_OUTPUT", "xml")])).unwrap_err();
        assert!(err.contains("SCHEMAPACK_OUTPUT"));
    }
}
