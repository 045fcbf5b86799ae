use std::path::Path;

use anyhow::{Context, Result, bail};
use log::info;
use serde_json::Value as JsonValue;

use super::model::{Cell, Dataset};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a tabular dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`  – header row followed by one observation per line
/// * `.json` – `[{ "date": "...", "gdp": 1.2, ... }, ...]`
pub fn load_file(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "csv" => load_csv(path)?,
        "json" => load_json(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };
    info!(
        "loaded {}: {} rows, {} columns ({} numeric)",
        path.display(),
        dataset.len(),
        dataset.width(),
        dataset.numeric_columns().len()
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, comma-delimited, fields trimmed.
/// Every field goes through [`Cell::parse`], so blanks and `NA` become `NaN`.
pub fn load_csv(path: &Path) -> Result<Dataset> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .context("opening CSV")?;
    read_csv(reader)
}

/// Parse CSV text already held in memory.
pub fn parse_csv(text: &str) -> Result<Dataset> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    read_csv(reader)
}

fn read_csv<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Dataset> {
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        rows.push(record.iter().map(Cell::parse).collect());
    }

    Ok(Dataset::new(headers, rows)?)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "country": "LT", "gdp": 1.5, "cpi": null },
///   ...
/// ]
/// ```
///
/// Columns are the keys of the first record, in the order they appear;
/// keys missing from later records read as `NaN`.
fn load_json(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    parse_json(&text)
}

pub fn parse_json(text: &str) -> Result<Dataset> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let Some(first) = records.first() else {
        bail!("JSON array is empty");
    };
    let columns: Vec<String> = first
        .as_object()
        .context("Row 0 is not a JSON object")?
        .keys()
        .cloned()
        .collect();

    let mut rows = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        rows.push(
            columns
                .iter()
                .map(|c| obj.get(c).map_or(Cell::Numeric(f64::NAN), json_to_cell))
                .collect(),
        );
    }

    Ok(Dataset::new(columns, rows)?)
}

fn json_to_cell(val: &JsonValue) -> Cell {
    match val {
        JsonValue::Number(n) => n
            .as_f64()
            .map_or_else(|| Cell::Text(n.to_string()), Cell::Numeric),
        JsonValue::String(s) => Cell::parse(s),
        JsonValue::Null => Cell::Numeric(f64::NAN),
        other => Cell::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::ColumnKind;

    #[test]
    fn csv_gaps_become_nan() {
        let ds = parse_csv("date,country,gdp\n2020-01,LT,1.5\n2020-02,LT,\n2020-03,LT,NA\n").unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.kind(1), Some(ColumnKind::Text));
        let gdp = ds.column_values(2).unwrap();
        assert_eq!(gdp[0], 1.5);
        assert!(gdp[1].is_nan() && gdp[2].is_nan());
    }

    #[test]
    fn csv_rejects_ragged_rows() {
        assert!(parse_csv("a,b\n1,2\n3\n").is_err());
    }

    #[test]
    fn json_records_load() {
        let ds = parse_json(r#"[{"gdp": 1.0, "country": "LT"}, {"gdp": null, "country": "LV"}]"#)
            .unwrap();
        let gdp = ds.column_index("gdp").unwrap();
        assert!(ds.is_numeric(gdp));
        assert!(ds.column_values(gdp).unwrap()[1].is_nan());
    }

    #[test]
    fn json_columns_keep_record_order() {
        let ds = parse_json(r#"[{"week": 1, "gdp": 2.0, "cpi": 3.0, "country": "LT"}]"#).unwrap();
        assert_eq!(ds.column_names(), ["week", "gdp", "cpi", "country"]);
    }

    #[test]
    fn unsupported_extension_fails() {
        assert!(load_file(Path::new("data.xlsx")).is_err());
    }
}
