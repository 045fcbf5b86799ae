/// Data layer: typed cells, loading, and row filtering.
///
/// Architecture:
/// ```text
///  .csv / .json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Dataset (Cell matrix, cached column kinds)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Dataset  │  column names, rows, ColumnKind per column
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  keep rows matching a column value → new Dataset
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
