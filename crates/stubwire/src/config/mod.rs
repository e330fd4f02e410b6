//! Configuration types for the interceptor.

mod stubs;

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use stubs::StubDefinition;

fn default_delay_ms() -> u64 {
    1
}

fn default_failure_window_ms() -> u64 {
    500
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Virtual delay before a response is delivered (default: 1ms)
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// How long a `stub_failure` stub may go unmatched before its signal
    /// errors (default: 500ms)
    #[serde(default = "default_failure_window_ms")]
    pub failure_window_ms: u64,

    /// Log unmatched calls at warn instead of debug
    #[serde(default)]
    pub warn_on_unmatched: bool,

    /// Stubs registered when the interceptor is created and again after
    /// every uninstall
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stubs: Vec<StubDefinition>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            failure_window_ms: default_failure_window_ms(),
            warn_on_unmatched: false,
            stubs: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML or JSON file, picked by extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_yaml_str(&contents)
        };
        config.with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, anyhow::Error> {
        let config: EngineConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, anyhow::Error> {
        let config: EngineConfig = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.failure_window_ms == 0 {
            anyhow::bail!("failureWindowMs must be greater than zero");
        }

        for (index, stub) in self.stubs.iter().enumerate() {
            match (&stub.url, &stub.pattern) {
                (Some(_), Some(_)) => anyhow::bail!(
                    "Stub #{} ({}) sets both 'url' and 'pattern'; choose one",
                    index,
                    stub.label()
                ),
                (None, None) => anyhow::bail!(
                    "Stub #{} ({}) needs either 'url' or 'pattern'",
                    index,
                    stub.label()
                ),
                _ => {}
            }
            stub.matcher()
                .with_context(|| format!("Stub #{} ({}) is invalid", index, stub.label()))?;
        }

        Ok(())
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn failure_window(&self) -> Duration {
        Duration::from_millis(self.failure_window_ms)
    }
}
