//! STL (Seasonal-Trend decomposition using LOESS).
//!
//! Additive model `y = trend + seasonal + remainder`, with the inner loop
//! of Cleveland et al. (1990) and optional bisquare robustness passes.
//! Windows are counted in observations and must be odd.

use crate::error::AnalysisError;

/// Output of [`Stl::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct StlFit {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub remainder: Vec<f64>,
}

/// STL configuration.
#[derive(Debug, Clone)]
pub struct Stl {
    period: usize,
    seasonal_window: usize,
    trend_window: usize,
    low_pass_window: usize,
    inner_iterations: usize,
    robust_iterations: usize,
}

fn odd(n: usize) -> usize {
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

impl Stl {
    pub fn new(period: usize) -> Self {
        let period = period.max(2);
        Self {
            period,
            seasonal_window: odd(10 * period + 1),
            trend_window: odd((1.5 * period as f64).round() as usize + 1),
            low_pass_window: odd(period),
            inner_iterations: 2,
            robust_iterations: 0,
        }
    }

    pub fn with_seasonal_window(mut self, w: usize) -> Self {
        self.seasonal_window = odd(w.max(3));
        self
    }

    pub fn with_trend_window(mut self, w: usize) -> Self {
        self.trend_window = odd(w.max(3));
        self
    }

    pub fn with_inner_iterations(mut self, n: usize) -> Self {
        self.inner_iterations = n.max(1);
        self
    }

    /// Number of robustness re-weighting passes after the first fit.
    pub fn with_robust_iterations(mut self, n: usize) -> Self {
        self.robust_iterations = n;
        self
    }

    pub fn fit(&self, series: &[f64]) -> Result<StlFit, AnalysisError> {
        let n = series.len();
        let period = self.period;
        if n < 2 * period {
            return Err(AnalysisError::Degenerate(format!(
                "STL needs at least two full periods ({} points), got {n}",
                2 * period
            )));
        }
        if series.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::Degenerate(
                "STL input contains NaN or infinite values".into(),
            ));
        }

        let mut trend = vec![0.0; n];
        let mut seasonal = vec![0.0; n];
        let mut weights = vec![1.0; n];

        for pass in 0..=self.robust_iterations {
            for _ in 0..self.inner_iterations {
                let detrended: Vec<f64> = series.iter().zip(&trend).map(|(y, t)| y - t).collect();
                let cycle = self.smooth_cycle_subseries(&detrended, &weights);
                let low = self.low_pass(&cycle);
                for i in 0..n {
                    seasonal[i] = cycle[i] - low[i];
                }
                let deseasonalized: Vec<f64> =
                    series.iter().zip(&seasonal).map(|(y, s)| y - s).collect();
                trend = loess(&deseasonalized, self.trend_window, &weights);
            }
            if pass < self.robust_iterations {
                let remainder: Vec<f64> = (0..n).map(|i| series[i] - seasonal[i] - trend[i]).collect();
                weights = robustness_weights(&remainder);
            }
        }

        let remainder = (0..n).map(|i| series[i] - seasonal[i] - trend[i]).collect();
        Ok(StlFit {
            trend,
            seasonal,
            remainder,
        })
    }

    /// Smooth each cycle-subseries (all points sharing a position in the
    /// seasonal cycle) and scatter the results back.
    fn smooth_cycle_subseries(&self, detrended: &[f64], weights: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; detrended.len()];
        for phase in 0..self.period {
            let idx: Vec<usize> = (phase..detrended.len()).step_by(self.period).collect();
            let values: Vec<f64> = idx.iter().map(|&i| detrended[i]).collect();
            let w: Vec<f64> = idx.iter().map(|&i| weights[i]).collect();
            let smoothed = loess(&values, self.seasonal_window, &w);
            for (&i, v) in idx.iter().zip(smoothed) {
                out[i] = v;
            }
        }
        out
    }

    /// MA(period) → MA(period) → MA(3) → LOESS.
    fn low_pass(&self, series: &[f64]) -> Vec<f64> {
        let ma = moving_average(series, self.period);
        let ma = moving_average(&ma, self.period);
        let ma = moving_average(&ma, 3);
        loess(&ma, self.low_pass_window, &vec![1.0; series.len()])
    }
}

/// Centered moving average, truncated at the edges so the length is kept.
fn moving_average(series: &[f64], window: usize) -> Vec<f64> {
    let n = series.len();
    let half = window / 2;
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            series[lo..hi].iter().sum::<f64>() / (hi - lo) as f64
        })
        .collect()
}

fn tricube(u: f64) -> f64 {
    if u >= 1.0 {
        0.0
    } else {
        (1.0 - u.powi(3)).powi(3)
    }
}

/// Local linear LOESS over equally spaced points, `window` nearest
/// neighbours, tricube distance weights times `robustness`.
fn loess(values: &[f64], window: usize, robustness: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let q = window.min(n);
    // A window wider than the data widens the bandwidth beyond the span.
    let extra = window.saturating_sub(n) as f64 / 2.0;

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(q / 2).min(n - q);
            let hi = lo + q;
            let h = ((i - lo).max(hi - 1 - i) as f64 + extra).max(1.0);
            let bandwidth = h * 1.001;

            let (mut sw, mut sx, mut sy) = (0.0, 0.0, 0.0);
            let mut w = Vec::with_capacity(q);
            for j in lo..hi {
                let wj = tricube((j as f64 - i as f64).abs() / bandwidth) * robustness[j];
                w.push(wj);
                sw += wj;
                sx += wj * j as f64;
                sy += wj * values[j];
            }
            if sw <= 0.0 {
                return values[i];
            }
            let (xm, ym) = (sx / sw, sy / sw);
            let (mut sxx, mut sxy) = (0.0, 0.0);
            for (k, j) in (lo..hi).enumerate() {
                let dx = j as f64 - xm;
                sxx += w[k] * dx * dx;
                sxy += w[k] * dx * (values[j] - ym);
            }
            if sxx > 1e-12 {
                ym + sxy / sxx * (i as f64 - xm)
            } else {
                ym
            }
        })
        .collect()
}

/// Bisquare weights with scale six times the median absolute remainder.
fn robustness_weights(remainder: &[f64]) -> Vec<f64> {
    let mut abs: Vec<f64> = remainder.iter().map(|r| r.abs()).collect();
    abs.sort_by(f64::total_cmp);
    let n = abs.len();
    let median = if n % 2 == 0 {
        (abs[n / 2 - 1] + abs[n / 2]) / 2.0
    } else {
        abs[n / 2]
    };
    let h = 6.0 * median;
    remainder
        .iter()
        .map(|r| {
            if h < 1e-12 {
                return 1.0;
            }
            let u = r.abs() / h;
            if u < 1.0 {
                (1.0 - u * u).powi(2)
            } else {
                0.0
            }
        })
        .collect()
}
