//! Linear gap filling for numeric columns.

use log::{debug, warn};

use crate::data::model::Dataset;
use crate::error::AnalysisError;

/// Fill `NaN` runs in place.
///
/// A run with known values on both sides is interpolated linearly; a leading
/// run takes the first known value and a trailing run the last one. A series
/// with no known value is left untouched.
pub fn fill_gaps(data: &mut [f64]) {
    let n = data.len();
    let mut i = 0;
    while i < n {
        if !data[i].is_nan() {
            i += 1;
            continue;
        }
        let mut end = i;
        while end < n && data[end].is_nan() {
            end += 1;
        }
        match (i.checked_sub(1), end < n) {
            (Some(start), true) => {
                let (a, b) = (data[start], data[end]);
                let step = (b - a) / (end - start) as f64;
                for (k, slot) in data[i..end].iter_mut().enumerate() {
                    *slot = a + step * (k + 1) as f64;
                }
            }
            (Some(start), false) => {
                let last = data[start];
                data[i..].fill(last);
            }
            (None, true) => {
                let first = data[end];
                data[..end].fill(first);
            }
            (None, false) => {}
        }
        i = end;
    }
}

/// Interpolate the selected columns and return the updated dataset.
/// Text columns are skipped.
pub fn interpolate(dataset: &Dataset, columns: &[usize]) -> Result<Dataset, AnalysisError> {
    let mut out = dataset.clone();
    for &col in columns {
        if col >= dataset.width() {
            return Err(AnalysisError::Validation(format!(
                "column index {col} out of range"
            )));
        }
        if !dataset.is_numeric(col) {
            warn!(
                "skipping interpolation of text column '{}'",
                dataset.column_names()[col]
            );
            continue;
        }
        let mut values = out.column_values(col)?;
        let gaps = values.iter().filter(|v| v.is_nan()).count();
        if gaps == 0 {
            continue;
        }
        fill_gaps(&mut values);
        debug!("column '{}': filled {gaps} gaps", dataset.column_names()[col]);
        out = out.with_column_values(col, &values)?;
    }
    Ok(out)
}
