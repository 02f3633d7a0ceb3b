use std::{num::NonZeroUsize, path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};

use crate::generator::{parse_field_specs, FieldSpec};

// ---------------------------------------------------------------------------
// GeneratorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Run the synthetic feed inside the service.
    pub enabled: bool,
    pub interval: Duration,
    /// Format: `"name:min:max[:decimals]"`, comma-separated. Empty selects the
    /// station's default sensor set.
    pub fields: Vec<FieldSpec>,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    /// Maximum number of readings kept in the history.
    pub history_capacity: NonZeroUsize,
    /// When set, the current reading and history are mirrored to JSON files
    /// in this directory.
    pub data_dir: Option<PathBuf>,
    pub generator: GeneratorConfig,
    /// Submit endpoint used by the stand-alone simulator.
    pub simulator_target_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        let interval_secs: u64 = optional("GENERATOR_INTERVAL_SECS", "10")
            .parse()
            .context("GENERATOR_INTERVAL_SECS must be a positive integer")?;
        if interval_secs == 0 {
            bail!("GENERATOR_INTERVAL_SECS must be a positive integer");
        }

        Ok(Self {
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "5000")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            history_capacity: optional("HISTORY_CAPACITY", "100")
                .parse()
                .context("HISTORY_CAPACITY must be a positive integer")?,
            data_dir: lookup("DATA_DIR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            generator: GeneratorConfig {
                enabled: parse_bool(&optional("GENERATOR_ENABLED", "false"))
                    .context("GENERATOR_ENABLED must be true or false")?,
                interval: Duration::from_secs(interval_secs),
                fields: parse_field_specs(&optional("GENERATOR_FIELDS", ""))
                    .context("invalid GENERATOR_FIELDS")?,
            },
            simulator_target_url: optional(
                "SIMULATOR_TARGET_URL",
                "http://localhost:5000/readings",
            ),
        })
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("not a boolean: {other:?}"),
    }
}
