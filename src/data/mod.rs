/// Data layer: core types, loading, normalization and segregation.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → RawTable
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  schema   │  canonical columns, timestamps → RunTable + warnings
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  identifier markers → linearity / drift / unknown
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod schema;
