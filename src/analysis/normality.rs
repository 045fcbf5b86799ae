//! Jarque–Bera normality test.

use serde::Serialize;

use crate::error::AnalysisError;

/// Chi-squared critical value, two degrees of freedom, α = 0.05.
pub const JB_CRITICAL_VALUE: f64 = 5.991;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JbResult {
    pub statistic: f64,
    pub is_normal: bool,
}

/// Population central moments (m2, m3, m4) about the mean.
fn central_moments(data: &[f64]) -> (f64, f64, f64) {
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for &x in data {
        let d = x - mean;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    (m2 / n, m3 / n, m4 / n)
}

/// JB = n/6 · (S² + (K − 3)² / 4), normal iff JB < `critical_value`.
///
/// Empty input and zero variance leave skewness and kurtosis undefined and
/// are reported as [`AnalysisError::Degenerate`].
pub fn jarque_bera(data: &[f64], critical_value: f64) -> Result<JbResult, AnalysisError> {
    if data.is_empty() {
        return Err(AnalysisError::Degenerate("empty series".into()));
    }
    let (m2, m3, m4) = central_moments(data);
    if m2 == 0.0 {
        return Err(AnalysisError::Degenerate("zero variance".into()));
    }
    let skewness = m3 / m2.powf(1.5);
    let kurtosis = m4 / (m2 * m2);
    let n = data.len() as f64;
    let statistic = (n / 6.0) * (skewness.powi(2) + (kurtosis - 3.0).powi(2) / 4.0);
    if !statistic.is_finite() {
        return Err(AnalysisError::Degenerate(
            "statistic is not finite (missing values?)".into(),
        ));
    }
    Ok(JbResult {
        statistic,
        is_normal: statistic < critical_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rand_distr::{Distribution, Normal};

    /// Box-Muller over a regular grid of (u1, u2): an evenly stratified
    /// standard normal sample.
    fn stratified_normal(radial: usize, angular: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(radial * angular);
        for i in 0..radial {
            let r = (-2.0 * ((i as f64 + 0.5) / radial as f64).ln()).sqrt();
            for j in 0..angular {
                let theta = 2.0 * std::f64::consts::PI * (j as f64 + 0.5) / angular as f64;
                out.push(r * theta.cos());
            }
        }
        out
    }

    #[test]
    fn normal_sample_passes() {
        let data = stratified_normal(100, 40);
        let r = jarque_bera(&data, JB_CRITICAL_VALUE).unwrap();
        assert!(r.is_normal, "JB = {}", r.statistic);
    }

    #[test]
    fn spike_in_noisy_sample_fails() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let normal = Normal::new(10.0, 2.0).unwrap();
        let mut data: Vec<f64> = (0..500).map(|_| normal.sample(&mut rng)).collect();
        data[250] = 200.0;
        let r = jarque_bera(&data, JB_CRITICAL_VALUE).unwrap();
        assert!(!r.is_normal, "JB = {}", r.statistic);
    }

    #[test]
    fn single_spike_fails() {
        let mut data = vec![1.0; 99];
        data.push(1000.0);
        let r = jarque_bera(&data, JB_CRITICAL_VALUE).unwrap();
        assert!(!r.is_normal);
        assert!(r.statistic > JB_CRITICAL_VALUE);
    }

    #[test]
    fn symmetric_two_point_sample() {
        // S = 0, K = 1 → JB = n/6 · 4/4
        let data = [-1.0, 1.0, -1.0, 1.0, -1.0, 1.0];
        let r = jarque_bera(&data, JB_CRITICAL_VALUE).unwrap();
        assert_relative_eq!(r.statistic, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn constant_series_is_degenerate() {
        assert!(matches!(
            jarque_bera(&[3.0; 10], JB_CRITICAL_VALUE),
            Err(AnalysisError::Degenerate(_))
        ));
        assert!(jarque_bera(&[], JB_CRITICAL_VALUE).is_err());
        assert!(jarque_bera(&[1.0, f64::NAN, 2.0], JB_CRITICAL_VALUE).is_err());
    }
}
