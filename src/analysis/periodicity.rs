//! Dominant period estimation by autocorrelation peak search.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Seasonal period requested for decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PeriodRepr", into = "PeriodRepr")]
pub enum Period {
    /// Estimate with [`detect_period`].
    Auto,
    Fixed(usize),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PeriodRepr {
    Number(usize),
    Text(String),
}

impl TryFrom<PeriodRepr> for Period {
    type Error = AnalysisError;

    fn try_from(repr: PeriodRepr) -> Result<Self, Self::Error> {
        match repr {
            PeriodRepr::Number(p) => Ok(Period::Fixed(p)),
            PeriodRepr::Text(s) => s.parse(),
        }
    }
}

impl From<Period> for PeriodRepr {
    fn from(p: Period) -> Self {
        match p {
            Period::Auto => PeriodRepr::Text("auto".into()),
            Period::Fixed(n) => PeriodRepr::Number(n),
        }
    }
}

impl FromStr for Period {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Period::Auto);
        }
        s.parse::<usize>()
            .map(Period::Fixed)
            .map_err(|_| AnalysisError::Validation(format!("invalid period '{s}'")))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Auto => write!(f, "auto"),
            Period::Fixed(p) => write!(f, "{p}"),
        }
    }
}

/// Lag in `2..max_period` with the highest mean lagged product of the
/// centered series. Ties keep the smaller lag; returns 2 when no such lag
/// fits in the data.
pub fn detect_period(data: &[f64], max_period: usize) -> usize {
    let n = data.len();
    if n < 3 {
        return 2;
    }
    let mean = data.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = data.iter().map(|x| x - mean).collect();

    let mut best = (2, f64::NEG_INFINITY);
    for lag in 2..max_period.min(n) {
        let score = centered
            .iter()
            .zip(&centered[lag..])
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / (n - lag) as f64;
        if score > best.1 {
            best = (lag, score);
        }
    }
    best.0
}

/// Resolve a [`Period`] against a concrete series.
pub fn resolve_period(period: Period, data: &[f64], max_period: usize) -> usize {
    match period {
        Period::Fixed(p) => p,
        Period::Auto => detect_period(data, max_period),
    }
}
