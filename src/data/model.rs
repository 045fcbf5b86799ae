use std::collections::BTreeSet;
use std::fmt;

use crate::error::AnalysisError;

/// Text values treated as a missing numeric observation.
const MISSING_MARKERS: &[&str] = &["na", "n/a", "nan", "null", "-"];

// ---------------------------------------------------------------------------
// Cell – a single value of the matrix
// ---------------------------------------------------------------------------

/// A single dataset cell. Missing numeric observations are `Numeric(NaN)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Numeric(f64),
    Text(String),
}

impl Cell {
    /// Classify a raw CSV field.
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim();
        if s.is_empty() || MISSING_MARKERS.iter().any(|m| s.eq_ignore_ascii_case(m)) {
            return Cell::Numeric(f64::NAN);
        }
        match s.parse::<f64>() {
            Ok(v) => Cell::Numeric(v),
            Err(_) => Cell::Text(s.to_string()),
        }
    }

    /// Numeric view of the cell; text that does not parse becomes `NaN`.
    pub fn as_f64(&self) -> f64 {
        match self {
            Cell::Numeric(v) => *v,
            Cell::Text(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        }
    }

    fn is_numeric_like(&self) -> bool {
        match self {
            Cell::Numeric(_) => true,
            Cell::Text(s) => s.trim().parse::<f64>().is_ok(),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Numeric(v) if v.is_nan())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Numeric(v) if v.is_nan() => write!(f, "NaN"),
            Cell::Numeric(v) => write!(f, "{v}"),
            Cell::Text(s) => write!(f, "{s}"),
        }
    }
}

// ---------------------------------------------------------------------------
// ColumnKind – inferred once per column
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
}

fn infer_kind(rows: &[Vec<Cell>], col: usize) -> ColumnKind {
    if rows.iter().all(|row| row[col].is_numeric_like()) {
        ColumnKind::Numeric
    } else {
        ColumnKind::Text
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// Rectangular, column-typed table. Column kinds are computed at
/// construction and stay valid for the dataset's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    column_names: Vec<String>,
    rows: Vec<Vec<Cell>>,
    kinds: Vec<ColumnKind>,
}

impl Dataset {
    /// Build a dataset, checking name uniqueness and row widths.
    pub fn new(column_names: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, AnalysisError> {
        let mut seen = BTreeSet::new();
        for name in &column_names {
            if !seen.insert(name.as_str()) {
                return Err(AnalysisError::Validation(format!(
                    "duplicate column name '{name}'"
                )));
            }
        }
        let width = column_names.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(AnalysisError::Validation(format!(
                "row {i} has {} cells, expected {width}",
                row.len()
            )));
        }
        let kinds = (0..width).map(|c| infer_kind(&rows, c)).collect();
        Ok(Self {
            column_names,
            rows,
            kinds,
        })
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn column_name(&self, index: usize) -> Option<&str> {
        self.column_names.get(index).map(String::as_str)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names.iter().position(|n| n == name)
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn kind(&self, col: usize) -> Option<ColumnKind> {
        self.kinds.get(col).copied()
    }

    pub fn is_numeric(&self, col: usize) -> bool {
        self.kind(col) == Some(ColumnKind::Numeric)
    }

    /// Indices of all numeric columns, in column order.
    pub fn numeric_columns(&self) -> Vec<usize> {
        (0..self.width()).filter(|&c| self.is_numeric(c)).collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.column_names.len()
    }

    /// A numeric column as `f64` values (`NaN` for missing cells).
    pub fn column_values(&self, col: usize) -> Result<Vec<f64>, AnalysisError> {
        match self.kind(col) {
            None => Err(AnalysisError::Validation(format!(
                "column index {col} out of range (dataset has {} columns)",
                self.width()
            ))),
            Some(ColumnKind::Text) => Err(AnalysisError::Validation(format!(
                "column '{}' is not numeric",
                self.column_names[col]
            ))),
            Some(ColumnKind::Numeric) => Ok(self.rows.iter().map(|r| r[col].as_f64()).collect()),
        }
    }

    /// Copy of the dataset with one numeric column replaced. Column kinds
    /// are unchanged since the replacement is numeric.
    pub fn with_column_values(&self, col: usize, values: &[f64]) -> Result<Self, AnalysisError> {
        if !self.is_numeric(col) {
            return Err(AnalysisError::Validation(format!(
                "cannot write numeric values into column {col}"
            )));
        }
        if values.len() != self.len() {
            return Err(AnalysisError::Validation(format!(
                "column has {} rows, got {} values",
                self.len(),
                values.len()
            )));
        }
        let mut next = self.clone();
        for (row, &v) in next.rows.iter_mut().zip(values) {
            row[col] = Cell::Numeric(v);
        }
        Ok(next)
    }

    /// Number of missing cells in a column.
    pub fn missing_count(&self, col: usize) -> usize {
        self.rows
            .iter()
            .filter(|r| r.get(col).is_some_and(Cell::is_missing))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(raw: &[&str]) -> Vec<Cell> {
        raw.iter().map(|s| Cell::parse(s)).collect()
    }

    #[test]
    fn parse_classifies_fields() {
        assert_eq!(Cell::parse(" 3.5 "), Cell::Numeric(3.5));
        assert!(Cell::parse("").is_missing());
        assert!(Cell::parse("NA").is_missing());
        assert!(Cell::parse("null").is_missing());
        assert_eq!(Cell::parse("Lithuania"), Cell::Text("Lithuania".into()));
    }

    #[test]
    fn kinds_are_inferred_per_column() {
        let ds = Dataset::new(
            vec!["country".into(), "gdp".into()],
            vec![cells(&["LT", "1.0"]), cells(&["LV", ""]), cells(&["EE", "3"])],
        )
        .unwrap();
        assert_eq!(ds.kind(0), Some(ColumnKind::Text));
        assert_eq!(ds.kind(1), Some(ColumnKind::Numeric));
        assert_eq!(ds.numeric_columns(), vec![1]);
        assert_eq!(ds.missing_count(1), 1);
    }

    #[test]
    fn text_parseable_cells_count_as_numeric() {
        let ds = Dataset::new(
            vec!["x".into()],
            vec![vec![Cell::Text("1.5".into())], vec![Cell::Numeric(2.0)]],
        )
        .unwrap();
        assert!(ds.is_numeric(0));
        assert_eq!(ds.column_values(0).unwrap(), vec![1.5, 2.0]);
    }

    #[test]
    fn rejects_duplicate_names_and_ragged_rows() {
        assert!(Dataset::new(vec!["a".into(), "a".into()], vec![]).is_err());
        assert!(Dataset::new(vec!["a".into(), "b".into()], vec![cells(&["1"])]).is_err());
    }

    #[test]
    fn text_column_values_is_an_error() {
        let ds = Dataset::new(vec!["c".into()], vec![cells(&["LT"])]).unwrap();
        assert!(matches!(ds.column_values(0), Err(AnalysisError::Validation(_))));
        assert!(ds.column_values(5).is_err());
    }
}
