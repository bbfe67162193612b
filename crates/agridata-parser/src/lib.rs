pub mod columns;
pub mod errors;
pub mod model;
mod reader;
pub mod registry;

pub use columns::{standardize_label, standardize_labels, IDENTIFIER_COLUMNS};
pub use errors::ParserError;
pub use model::{RawTable, SourceMetadata};
pub use reader::{parse_raw_csv, read_raw_csv};
pub use registry::{ColumnMap, Crop, Measure, SemanticKey, SynonymRegistry};
