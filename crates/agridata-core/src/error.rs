// crates/agridata-core/src/error.rs

use std::path::Path;

use agridata_parser::ParserError;
use thiserror::Error;

use crate::outputs::OutputError;

#[derive(Error, Debug)]
pub enum CleaningError {
    #[error("could not load source table: {0}")]
    Source(#[from] ParserError),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("required column `{column}` is missing")]
    MissingColumn { column: String },

    #[error("year value {value:?} in record {record} is not an integer")]
    InvalidYear { record: usize, value: String },

    #[error("could not persist outputs: {0}")]
    Output(#[from] OutputError),

    #[error("stage `{stage}` failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<CleaningError>,
    },
}

impl CleaningError {
    /// Attributes the error to a pipeline stage. Already attributed errors
    /// keep their original stage.
    pub fn in_stage(self, stage: &'static str) -> Self {
        match self {
            CleaningError::Stage { .. } => self,
            other => CleaningError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    pub fn stage(&self) -> Option<&'static str> {
        match self {
            CleaningError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The underlying error with any stage attribution removed.
    pub fn root(&self) -> &CleaningError {
        match self {
            CleaningError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Path of the input file when the run failed because it does not exist.
    pub fn missing_source(&self) -> Option<&Path> {
        match self.root() {
            CleaningError::Source(ParserError::SourceNotFound { path }) => Some(path.as_path()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CleaningError>;
