use std::collections::BTreeSet;

use super::model::{Cell, Dataset};
use crate::error::AnalysisError;

// ---------------------------------------------------------------------------
// Row filter: keep observations whose key column equals a value
// ---------------------------------------------------------------------------

/// Sorted distinct values of a column, rendered as text. Missing cells are
/// skipped.
pub fn unique_values(dataset: &Dataset, column: usize) -> BTreeSet<String> {
    dataset
        .rows()
        .iter()
        .filter_map(|row| row.get(column))
        .filter(|cell| !cell.is_missing())
        .map(Cell::to_string)
        .collect()
}

/// Return indices of rows whose `column` cell renders as `value`.
pub fn matching_rows(dataset: &Dataset, column: usize, value: &str) -> Vec<usize> {
    dataset
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| row.get(column).is_some_and(|c| c.to_string() == value))
        .map(|(i, _)| i)
        .collect()
}

/// Build a new dataset holding only the rows that match. Column kinds are
/// re-inferred for the reduced matrix.
pub fn filter_rows(dataset: &Dataset, column: usize, value: &str) -> Result<Dataset, AnalysisError> {
    if column >= dataset.width() {
        return Err(AnalysisError::Validation(format!(
            "filter column {column} out of range"
        )));
    }
    let keep = matching_rows(dataset, column, value);
    if keep.is_empty() {
        return Err(AnalysisError::Validation(format!(
            "no rows where '{}' = '{value}'",
            dataset.column_names()[column]
        )));
    }
    let rows = keep.into_iter().map(|i| dataset.rows()[i].clone()).collect();
    Dataset::new(dataset.column_names().to_vec(), rows)
}
