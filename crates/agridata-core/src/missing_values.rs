use polars::prelude::*;
use tracing::warn;

use crate::error::Result;
use crate::pipelines::{CleaningStage, StageOutput};
use crate::report::CleaningReport;
use crate::table::has_column;

/// Placeholder for missing location names.
pub const UNKNOWN: &str = "UNKNOWN";

pub const NAME_COLUMNS: [&str; 2] = ["state_name", "district_name"];

pub const CODE_COLUMNS: [&str; 2] = ["district_code", "state_code"];

pub struct HandleMissingValues;

impl CleaningStage for HandleMissingValues {
    fn name(&self) -> &'static str {
        "handle_missing_values"
    }

    fn apply(&self, table: &DataFrame, report: CleaningReport) -> Result<StageOutput> {
        let (table, filled) = fill_missing_values(table)?;
        Ok(StageOutput {
            table,
            report: report.with_missing_values_handled(filled),
        })
    }
}

/// Fills location names and codes with [`UNKNOWN`] and numeric nulls with
/// zero.
///
/// Returns the filled table and the number of null cells that were filled.
/// Blank or whitespace-only names are replaced too but are not nulls, so
/// they are not counted.
pub fn fill_missing_values(df: &DataFrame) -> PolarsResult<(DataFrame, usize)> {
    let mut output = df.clone();
    let mut filled = 0usize;

    for name in NAME_COLUMNS {
        if !has_column(df, name) {
            warn!(column = name, "name column absent; filling with placeholder");
            output.with_column(Series::new(name.into(), vec![UNKNOWN; df.height()]))?;
            continue;
        }

        let series = df
            .column(name)?
            .as_materialized_series()
            .cast(&DataType::String)?;
        filled += series.null_count();
        let names: Vec<&str> = series
            .str()?
            .into_iter()
            .map(|value| match value {
                Some(text) if !text.trim().is_empty() => text,
                _ => UNKNOWN,
            })
            .collect();
        output.with_column(Series::new(name.into(), names))?;
    }

    // Codes are identifiers even when the reader infers them as integers;
    // a zero would read as a real code.
    for name in CODE_COLUMNS {
        if !has_column(df, name) {
            continue;
        }
        let column = df.column(name)?;
        let nulls = column.null_count();
        if nulls == 0 {
            continue;
        }

        let text = column.as_materialized_series().cast(&DataType::String)?;
        let codes: Vec<&str> = text
            .str()?
            .into_iter()
            .map(|value| value.unwrap_or(UNKNOWN))
            .collect();
        output.with_column(Series::new(name.into(), codes))?;
        filled += nulls;
    }

    for column in df.get_columns() {
        let name = column.name().as_str();
        if NAME_COLUMNS.contains(&name)
            || CODE_COLUMNS.contains(&name)
            || !column.dtype().is_primitive_numeric()
        {
            continue;
        }

        let nulls = column.null_count();
        if nulls == 0 {
            continue;
        }

        let series = column
            .as_materialized_series()
            .fill_null(FillNullStrategy::Zero)?;
        output.with_column(series)?;
        filled += nulls;
    }

    Ok((output, filled))
}
