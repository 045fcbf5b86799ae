use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::normality::JB_CRITICAL_VALUE;
use crate::analysis::outliers::{OutlierStrategy, OutlierThresholds};
use crate::analysis::periodicity::Period;

// ---------------------------------------------------------------------------
// Pipeline settings
// ---------------------------------------------------------------------------

/// Tunables for every stage. Missing keys in a config file fall back to
/// the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub jb_critical_value: f64,
    pub zscore_threshold: f64,
    pub iqr_multiplier: f64,
    pub outlier_strategy: OutlierStrategy,
    pub period: Period,
    /// Upper lag bound when `period` is `"auto"`.
    pub max_auto_period: usize,
    pub stl_robust_iterations: usize,
    pub vif_threshold: f64,
    pub bridge: BridgeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            jb_critical_value: JB_CRITICAL_VALUE,
            zscore_threshold: 3.5,
            iqr_multiplier: 1.5,
            outlier_strategy: OutlierStrategy::Interpolate,
            period: Period::Fixed(52),
            max_auto_period: 104,
            stl_robust_iterations: 6,
            vif_threshold: 10.0,
            bridge: BridgeConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn outlier_thresholds(&self) -> OutlierThresholds {
        OutlierThresholds {
            zscore: self.zscore_threshold,
            iqr_multiplier: self.iqr_multiplier,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Explicit engine root. When unset the working directory and its
    /// parents are probed.
    pub project_root: Option<PathBuf>,
    /// Seconds before the engine is killed; `null` waits forever.
    pub timeout_secs: Option<u64>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            project_root: None,
            timeout_secs: Some(300),
        }
    }
}

impl BridgeConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{"period": "auto", "outlier_strategy": "winsorize"}"#).unwrap();
        assert_eq!(cfg.period, Period::Auto);
        assert_eq!(cfg.outlier_strategy, OutlierStrategy::Winsorize);
        assert_eq!(cfg.vif_threshold, 10.0);
        assert_eq!(cfg.bridge.timeout(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn numeric_period_and_disabled_timeout() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{"period": 12, "bridge": {"timeout_secs": null}}"#).unwrap();
        assert_eq!(cfg.period, Period::Fixed(12));
        assert_eq!(cfg.bridge.timeout(), None);
    }

    #[test]
    fn rejects_unknown_strategy() {
        assert!(serde_json::from_str::<PipelineConfig>(r#"{"outlier_strategy": "clip"}"#).is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"jb_critical_value": 9.21}"#).unwrap();
        let cfg = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(cfg.jb_critical_value, 9.21);
        assert!(PipelineConfig::from_file(&dir.path().join("missing.json")).is_err());
    }
}
