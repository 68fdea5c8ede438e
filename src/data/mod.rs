/// Data layer: core types, loading, filtering and the ranking table.
///
/// Architecture:
/// ```text
///  <Direction>_<City>.parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → MovementDataset
///   └──────────┘
///        │
///        ├───────────────────────────┐
///        ▼                           ▼
///   ┌──────────┐               ┌──────────┐
///   │  filter   │  years →     │  table    │  all years → subject row
///   │           │  Aggregated  │           │  + top 10 by moves
///   └──────────┘  Dataset      └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod table;
