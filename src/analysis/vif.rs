//! Multicollinearity pruning by iterative variance-inflation-factor
//! elimination.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::Serialize;

use super::ols::{pearson, r_squared};
use crate::error::AnalysisError;

/// R² at or above this is treated as perfect collinearity.
const PERFECT_FIT_R2: f64 = 0.999_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// Every remaining VIF is at or below the threshold.
    BelowThreshold,
    /// Dropping left a single predictor, for which VIF is undefined.
    TooFewPredictors,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VifOutcome {
    /// Surviving predictor columns, ascending.
    pub kept: Vec<usize>,
    /// Removed predictor columns in removal order.
    pub dropped: Vec<usize>,
    /// VIF per column from the last evaluation.
    pub last_vifs: BTreeMap<usize, f64>,
    pub iterations: usize,
    pub stop_reason: StopReason,
}

/// VIF of each predictor against all the others.
pub fn variance_inflation_factors(predictors: &BTreeMap<usize, Vec<f64>>) -> BTreeMap<usize, f64> {
    predictors
        .iter()
        .map(|(&col, y)| {
            let others: Vec<&[f64]> = predictors
                .iter()
                .filter(|(&c, _)| c != col)
                .map(|(_, v)| v.as_slice())
                .collect();
            let r2 = r_squared(y, &others);
            let vif = if r2 >= PERFECT_FIT_R2 {
                f64::INFINITY
            } else {
                1.0 / (1.0 - r2)
            };
            (col, vif)
        })
        .collect()
}

fn validate(predictors: &BTreeMap<usize, Vec<f64>>, target: &[f64]) -> Result<(), AnalysisError> {
    if target.iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::Validation(
            "target contains NaN or infinite values".into(),
        ));
    }
    for (col, values) in predictors {
        if values.len() != target.len() {
            return Err(AnalysisError::Validation(format!(
                "predictor {col} has {} values, target has {}",
                values.len(),
                target.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::Validation(format!(
                "predictor {col} contains NaN or infinite values"
            )));
        }
    }
    Ok(())
}

/// Drop predictors until every VIF is at most `threshold`. Each round
/// removes the predictor least correlated (in absolute value) with the
/// target; ties go to the lowest column index.
pub fn reduce_by_vif(
    predictors: &BTreeMap<usize, Vec<f64>>,
    target: &[f64],
    threshold: f64,
) -> Result<VifOutcome, AnalysisError> {
    if predictors.len() < 2 {
        return Err(AnalysisError::Validation(format!(
            "VIF needs at least 2 predictors, got {}",
            predictors.len()
        )));
    }
    validate(predictors, target)?;

    let mut current = predictors.clone();
    let mut dropped = Vec::new();
    let mut iterations = 0;

    loop {
        iterations += 1;
        let vifs = variance_inflation_factors(&current);
        let max_vif = vifs.values().copied().fold(f64::NEG_INFINITY, f64::max);
        debug!("VIF round {iterations}: {vifs:?}");

        if max_vif <= threshold {
            info!(
                "VIF pruning done after {iterations} round(s); dropped {:?}",
                dropped
            );
            return Ok(VifOutcome {
                kept: current.keys().copied().collect(),
                dropped,
                last_vifs: vifs,
                iterations,
                stop_reason: StopReason::BelowThreshold,
            });
        }

        let mut weakest: Option<(usize, f64)> = None;
        for (&col, values) in &current {
            let r = pearson(values, target).abs();
            if weakest.map_or(true, |(_, best)| r < best) {
                weakest = Some((col, r));
            }
        }
        if let Some((col, r)) = weakest {
            debug!("dropping column {col} (|r| = {r:.4}, max VIF = {max_vif:.2})");
            current.remove(&col);
            dropped.push(col);
        }

        if current.len() < 2 {
            info!("VIF pruning stopped with a single predictor; dropped {dropped:?}");
            return Ok(VifOutcome {
                kept: current.keys().copied().collect(),
                dropped,
                last_vifs: vifs,
                iterations,
                stop_reason: StopReason::TooFewPredictors,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predictors(cols: &[(usize, &[f64])]) -> BTreeMap<usize, Vec<f64>> {
        cols.iter().map(|(c, v)| (*c, v.to_vec())).collect()
    }

    const X: [f64; 5] = [1.0, 2.0, 3.0, 4.0, 5.0];
    const X3: [f64; 5] = [2.0, 1.0, 4.0, 3.0, 6.0];
    const Y: [f64; 5] = [2.5, 1.2, 4.1, 3.3, 6.0];

    #[test]
    fn duplicate_columns_have_infinite_vif() {
        let vifs = variance_inflation_factors(&predictors(&[(1, &X[..]), (2, &X[..]), (3, &X3[..])]));
        assert!(vifs[&1].is_infinite());
        assert!(vifs[&2].is_infinite());
        assert!(vifs[&3].is_finite());
    }

    #[test]
    fn drops_exactly_one_duplicate() {
        let out = reduce_by_vif(&predictors(&[(1, &X[..]), (2, &X[..]), (3, &X3[..])]), &Y, 5.0).unwrap();
        // Equal correlation with the target: the first column goes.
        assert_eq!(out.dropped, vec![1]);
        assert_eq!(out.kept, vec![2, 3]);
        assert_eq!(out.iterations, 2);
        assert_eq!(out.stop_reason, StopReason::BelowThreshold);
    }

    #[test]
    fn already_below_threshold_is_unchanged() {
        let out = reduce_by_vif(&predictors(&[(0, &X[..]), (4, &X3[..])]), &Y, 5.0).unwrap();
        assert_eq!(out.kept, vec![0, 4]);
        assert!(out.dropped.is_empty());
        assert_eq!(out.iterations, 1);
    }

    #[test]
    fn two_duplicates_stop_with_one_predictor() {
        let out = reduce_by_vif(&predictors(&[(1, &X[..]), (2, &X[..])]), &Y, 10.0).unwrap();
        assert_eq!(out.kept, vec![2]);
        assert_eq!(out.stop_reason, StopReason::TooFewPredictors);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(reduce_by_vif(&predictors(&[(1, &X[..])]), &Y, 5.0).is_err());
        let mut bad = X;
        bad[2] = f64::NAN;
        assert!(matches!(
            reduce_by_vif(&predictors(&[(1, &bad[..]), (2, &X3[..])]), &Y, 5.0),
            Err(AnalysisError::Validation(_))
        ));
        assert!(reduce_by_vif(&predictors(&[(1, &X[..]), (2, &X3[..])]), &[f64::INFINITY; 5], 5.0).is_err());
    }
}
