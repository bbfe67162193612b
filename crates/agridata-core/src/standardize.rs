use agridata_parser::standardize_labels;
use polars::prelude::*;

use crate::error::Result;
use crate::pipelines::{CleaningStage, StageOutput};
use crate::report::CleaningReport;
use crate::table::column_names;

pub struct StandardizeColumns;

impl CleaningStage for StandardizeColumns {
    fn name(&self) -> &'static str {
        "standardize_columns"
    }

    fn apply(&self, table: &DataFrame, report: CleaningReport) -> Result<StageOutput> {
        Ok(StageOutput {
            table: standardize_columns(table)?,
            report,
        })
    }
}

/// Renames every column to its canonical lower-snake-case label.
pub fn standardize_columns(df: &DataFrame) -> PolarsResult<DataFrame> {
    let renamed = standardize_labels(&column_names(df));
    let mut output = df.clone();
    output.set_column_names(renamed.iter().map(String::as_str))?;
    Ok(output)
}
