//! Residual-based outlier detection and remediation of the original series.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// How flagged points of the original series are rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierStrategy {
    /// Replace with the median of the original series.
    Winsorize,
    /// Replace with the mean of the neighbouring (already fixed) values.
    Interpolate,
}

impl FromStr for OutlierStrategy {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "winsorize" => Ok(Self::Winsorize),
            "interpolate" => Ok(Self::Interpolate),
            other => Err(AnalysisError::Validation(format!(
                "unknown outlier strategy '{other}' (expected winsorize or interpolate)"
            ))),
        }
    }
}

impl fmt::Display for OutlierStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Winsorize => write!(f, "winsorize"),
            Self::Interpolate => write!(f, "interpolate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DetectionMethod {
    ZScore,
    Iqr,
}

/// Detection thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierThresholds {
    /// Flag `|r - mean| > zscore * sd` for normal residuals.
    pub zscore: f64,
    /// Flag outside `[q1 - k·IQR, q3 + k·IQR]` otherwise.
    pub iqr_multiplier: f64,
}

impl Default for OutlierThresholds {
    fn default() -> Self {
        Self {
            zscore: 3.5,
            iqr_multiplier: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierResult {
    /// Flagged positions, ascending.
    pub outlier_indices: Vec<usize>,
    pub method_used: DetectionMethod,
    pub clean_data: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

pub fn zscore_outliers(residuals: &[f64], threshold: f64) -> Vec<usize> {
    let n = residuals.len() as f64;
    if residuals.is_empty() {
        return Vec::new();
    }
    let mean = residuals.iter().sum::<f64>() / n;
    let sd = (residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
    residuals
        .iter()
        .enumerate()
        .filter(|&(_, &r)| (r - mean).abs() > threshold * sd)
        .map(|(i, _)| i)
        .collect()
}

/// Quartiles are read at floor-indexed 25th/75th percentile positions of
/// the sorted residuals.
pub fn iqr_outliers(residuals: &[f64], multiplier: f64) -> Vec<usize> {
    let n = residuals.len();
    if n == 0 {
        return Vec::new();
    }
    let mut sorted = residuals.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q1 = sorted[((n as f64 * 0.25) as usize).min(n - 1)];
    let q3 = sorted[((n as f64 * 0.75) as usize).min(n - 1)];
    let iqr = q3 - q1;
    let (lo, hi) = (q1 - multiplier * iqr, q3 + multiplier * iqr);
    residuals
        .iter()
        .enumerate()
        .filter(|&(_, &r)| r < lo || r > hi)
        .map(|(i, _)| i)
        .collect()
}

// ---------------------------------------------------------------------------
// Remediation
// ---------------------------------------------------------------------------

fn median(data: &[f64]) -> f64 {
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

fn remediate(original: &[f64], flagged: &[usize], strategy: OutlierStrategy) -> Vec<f64> {
    let mut clean = original.to_vec();
    match strategy {
        OutlierStrategy::Winsorize => {
            let m = median(original);
            for &i in flagged {
                clean[i] = m;
            }
        }
        OutlierStrategy::Interpolate => {
            for &i in flagged {
                let prev = i.checked_sub(1).map(|j| clean[j]);
                let next = clean.get(i + 1).copied();
                let neighbours: Vec<f64> = prev.into_iter().chain(next).filter(|v| v.is_finite()).collect();
                clean[i] = if neighbours.is_empty() {
                    0.0
                } else {
                    neighbours.iter().sum::<f64>() / neighbours.len() as f64
                };
            }
        }
    }
    clean
}

/// Flag anomalous residuals (Z-score if the column passed the normality
/// test, IQR otherwise) and rewrite those positions of `original`.
pub fn detect_and_fix(
    residuals: &[f64],
    is_normal: bool,
    original: &[f64],
    strategy: OutlierStrategy,
    thresholds: OutlierThresholds,
) -> Result<OutlierResult, AnalysisError> {
    if residuals.len() != original.len() {
        return Err(AnalysisError::Validation(format!(
            "residuals ({}) and original series ({}) differ in length",
            residuals.len(),
            original.len()
        )));
    }
    let (outlier_indices, method_used) = if is_normal {
        (zscore_outliers(residuals, thresholds.zscore), DetectionMethod::ZScore)
    } else {
        (iqr_outliers(residuals, thresholds.iqr_multiplier), DetectionMethod::Iqr)
    };
    let clean_data = remediate(original, &outlier_indices, strategy);
    Ok(OutlierResult {
        outlier_indices,
        method_used,
        clean_data,
    })
}
