pub mod analysis;
pub mod config;
pub mod db;
pub mod deduplication;
pub mod derived_columns;
pub mod error;
pub mod missing_values;
pub mod observer;
pub mod outputs;
pub mod pipelines;
pub mod projector;
pub mod record_filters;
pub mod report;
pub mod standardize;
mod table;
pub mod type_validation;
pub mod warehouse;

pub use error::{CleaningError, Result};
pub use pipelines::{CleanedDataset, CleaningPipeline};
pub use report::{CleaningReport, FinalizedReport};
