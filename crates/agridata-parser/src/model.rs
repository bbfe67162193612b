use std::path::PathBuf;

use polars::prelude::DataFrame;
use serde::Serialize;

/// Where a raw table came from and what it looked like before cleaning.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceMetadata {
    pub path: Option<PathBuf>,
    /// blake3 digest of the raw bytes, hex encoded.
    pub content_hash: String,
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone)]
pub struct RawTable {
    pub metadata: SourceMetadata,
    pub df: DataFrame,
}

impl RawTable {
    /// Raw column labels in their original order.
    pub fn labels(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }
}
