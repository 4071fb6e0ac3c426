use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::hsm::HSM_API_VERSION_1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub hsm: HsmConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HsmConfig {
    /// HSM API version requested from the library.
    pub api_version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

impl Default for HsmConfig {
    fn default() -> Self {
        Self { api_version: HSM_API_VERSION_1 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "hsmdump=info".to_string(), json: false }
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("HSMDUMP")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl Config {
    /// Load from an optional `hsmdump.*` file in the working directory and
    /// `HSMDUMP_*` environment variables (e.g. `HSMDUMP_LOGGING__JSON=true`).
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("hsmdump").required(false))
            .add_source(environment())
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load from an explicit file, still allowing environment overrides.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(environment())
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.hsm.api_version != HSM_API_VERSION_1 {
            anyhow::bail!(
                "hsm.api_version {} is not supported (expected {})",
                self.hsm.api_version,
                HSM_API_VERSION_1
            );
        }
        Ok(())
    }
}
