//! Data module - CSV loading and querying

#[cfg(test)]
pub mod fixtures;
mod loader;
mod processor;
pub mod schema;

pub use loader::{DataLoader, DatasetSummary, LoaderError};
pub use processor::{compare_nan_last, DataProcessor, GroupMean, PivotTable, QueryError, Selection};
