use std::io::Cursor;
use std::path::Path;

use blake3::Hasher;
use polars::prelude::*;
use tracing::debug;

use crate::errors::ParserError;
use crate::model::{RawTable, SourceMetadata};

/// Reads a district-level CSV export from disk.
///
/// The whole file is buffered so the content hash and the parsed table are
/// derived from the same bytes; the handle is released before parsing starts.
pub fn read_raw_csv(path: &Path) -> Result<RawTable, ParserError> {
    if !path.exists() {
        return Err(ParserError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }

    let bytes = std::fs::read(path).map_err(|source| ParserError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut table = parse_bytes(&bytes)?;
    table.metadata.path = Some(path.to_path_buf());
    debug!(
        path = %path.display(),
        rows = table.metadata.rows,
        columns = table.metadata.columns,
        "read raw csv"
    );
    Ok(table)
}

pub fn parse_raw_csv(content: &str) -> Result<RawTable, ParserError> {
    parse_bytes(content.as_bytes())
}

fn parse_bytes(bytes: &[u8]) -> Result<RawTable, ParserError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;

    if df.width() == 0 {
        return Err(ParserError::EmptyHeader);
    }

    let metadata = SourceMetadata {
        path: None,
        content_hash: compute_hash(bytes),
        rows: df.height(),
        columns: df.width(),
    };

    Ok(RawTable { metadata, df })
}

fn compute_hash(contents: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(contents);
    hasher.finalize().to_hex().to_string()
}
