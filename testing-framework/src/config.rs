// Harness configuration.
//
// Defaults suit a local test run: diffs are not printed on success, failures
// are always printed, no artifacts are written. A YAML file can override any
// field, and two environment variables override the file:
//
//   - SETT_HARNESS_PRINT
//       "1" | "true"  => print the before/after table after every operation
//       (other)       => do not
//
//   - SETT_HARNESS_ARTIFACT_DIR
//       (non-empty)   => write a JSON artifact into this directory whenever an
//                        invariant fails

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sett_common::{amount::DEFAULT_DECIMALS, config::HARVEST_EVENT};
use std::path::{Path, PathBuf};

use crate::snapshot::keys::SETT_PRICE_PER_FULL_SHARE;

pub const ENV_PRINT: &str = "SETT_HARNESS_PRINT";
pub const ENV_ARTIFACT_DIR: &str = "SETT_HARNESS_ARTIFACT_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Print the comparison table after every verified operation
    pub print_diffs: bool,
    /// Print kind, invariant and comparison before a failure propagates
    pub print_on_failure: bool,
    /// Directory for failure artifacts
    pub artifact_dir: Option<PathBuf>,
    /// Event name emitted by `harvest()`
    pub harvest_event: String,
    /// Fields the authoritative Harvest event must carry
    pub harvest_required_fields: Vec<String>,
    /// Scalar holding the vault share price
    pub share_price_key: String,
    /// Display precision of want and vault shares
    pub decimals: u8,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            print_diffs: false,
            print_on_failure: true,
            artifact_dir: None,
            harvest_event: HARVEST_EVENT.to_string(),
            harvest_required_fields: vec!["harvested".to_string()],
            share_price_key: SETT_PRICE_PER_FULL_SHARE.to_string(),
            decimals: DEFAULT_DECIMALS,
        }
    }
}

fn enabled(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "True")
}

impl HarnessConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse harness config")
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read harness config {}", path.display()))?;
        Self::from_yaml_str(&yaml)
    }

    /// Apply `SETT_HARNESS_*` variables from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply `SETT_HARNESS_*` variables from an arbitrary lookup
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_PRINT) {
            self.print_diffs = enabled(&value);
        }
        if let Some(dir) = lookup(ENV_ARTIFACT_DIR).filter(|dir| !dir.is_empty()) {
            self.artifact_dir = Some(PathBuf::from(dir));
        }
        self
    }

    pub fn with_print_diffs(mut self, enabled: bool) -> Self {
        self.print_diffs = enabled;
        self
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }
}
