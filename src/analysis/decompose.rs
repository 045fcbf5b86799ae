//! Safe STL parameters for a series of arbitrary length.

use serde::Serialize;

use super::stl::Stl;
use crate::error::AnalysisError;

/// Trend, seasonal and residual components plus the windows that produced
/// them. All component vectors have the input length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecompositionResult {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
    pub period: usize,
    pub seasonal_window: usize,
    pub trend_window: usize,
}

/// Odd window no wider than `n - 2`, at least 3.
fn bounded_odd_window(target: usize, n: usize) -> usize {
    let mut w = target.min(n.saturating_sub(2));
    if w % 2 == 0 {
        w = w.saturating_sub(1);
    }
    w.max(3)
}

/// Seasonal window for `period`: `10 * period + 1`, bounded.
pub fn seasonal_window(period: usize, n: usize) -> usize {
    bounded_odd_window(10 * period + 1, n)
}

/// Trend window for `period`: `round(1.5 * period) + 1`, bounded.
pub fn trend_window(period: usize, n: usize) -> usize {
    bounded_odd_window((1.5 * period as f64).round() as usize + 1, n)
}

/// Decompose `data` with STL using windows derived from `period` (clamped
/// to `[2, n - 1]`), two inner iterations and `robust_iterations` bisquare
/// passes.
pub fn decompose(
    data: &[f64],
    period: usize,
    robust_iterations: usize,
) -> Result<DecompositionResult, AnalysisError> {
    let n = data.len();
    if n < 4 {
        return Err(AnalysisError::Degenerate(format!(
            "series of {n} points is too short to decompose"
        )));
    }
    let period = period.clamp(2, n - 1);
    let seasonal_window = seasonal_window(period, n);
    let trend_window = trend_window(period, n);

    let fit = Stl::new(period)
        .with_seasonal_window(seasonal_window)
        .with_trend_window(trend_window)
        .with_inner_iterations(2)
        .with_robust_iterations(robust_iterations)
        .fit(data)?;

    Ok(DecompositionResult {
        trend: fit.trend,
        seasonal: fit.seasonal,
        residual: fit.remainder,
        period,
        seasonal_window,
        trend_window,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn windows_are_odd_and_bounded() {
        // period 52 on 300 points: 521 → 298 → 297
        assert_eq!(seasonal_window(52, 300), 297);
        assert_eq!(trend_window(52, 300), 79);
        // round(1.5 * 4) + 1 = 7
        assert_eq!(trend_window(4, 100), 7);
        // round(1.5 * 3) + 1 = 6 → 5
        assert_eq!(trend_window(3, 100), 5);
        assert_eq!(seasonal_window(2, 4), 3);
        for p in 2..40 {
            for n in 4..120 {
                let w = seasonal_window(p, n);
                assert!(w % 2 == 1 && w >= 3 && (w <= n - 2 || w == 3));
            }
        }
    }

    #[test]
    fn decomposition_keeps_length() {
        let data: Vec<f64> = (0..156)
            .map(|i| 100.0 + 0.2 * i as f64 + 5.0 * (2.0 * PI * i as f64 / 52.0).sin())
            .collect();
        let r = decompose(&data, 52, 2).unwrap();
        assert_eq!(r.period, 52);
        assert_eq!(r.trend.len(), data.len());
        assert_eq!(r.seasonal.len(), data.len());
        assert_eq!(r.residual.len(), data.len());
    }

    #[test]
    fn oversized_period_fails_per_column() {
        // Period clamps to n - 1 = 29, which leaves less than two cycles.
        let data: Vec<f64> = (0..30).map(|i| i as f64).collect();
        assert!(matches!(decompose(&data, 52, 0), Err(AnalysisError::Degenerate(_))));
        assert!(decompose(&[1.0, 2.0, 3.0], 2, 0).is_err());
    }
}
