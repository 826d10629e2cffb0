//! CLI configuration
//!
//! Loaded from an optional file (`qfilter.toml` unless `--config` names
//! another) and `QFILTER__*` environment variables, e.g.
//! `QFILTER__FILTER__MAX_DEPTH=32` or `QFILTER__LOGGING__JSON=true`.

use anyhow::Context;
use qfilter::FilterConfig;
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "qfilter";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub filter: FilterConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

impl Config {
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();

        let file = match path {
            Some(path) => config::File::with_name(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("QFILTER")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("filter.public_routes")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration sources")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.filter.validate()?;
        match self.logging.level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" | "off" => Ok(()),
            other => anyhow::bail!("Unknown log level '{other}'"),
        }
    }
}
