//! tally-ingest: CSV loading, header standardization and export.

pub mod export;
pub mod loader;
pub mod parsers;
pub mod schema;
pub mod types;

pub use export::{to_csv_string, write_csv, write_csv_path};
pub use loader::{load, load_str, read_raw};
pub use schema::{ColumnMapping, detect_columns, standardize};
pub use types::{HeaderFallback, IngestError, LoadOptions, StandardizeOptions};
