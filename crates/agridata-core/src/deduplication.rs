use polars::prelude::*;

use crate::error::Result;
use crate::pipelines::{CleaningStage, StageOutput};
use crate::report::CleaningReport;

pub struct RemoveDuplicates;

impl CleaningStage for RemoveDuplicates {
    fn name(&self) -> &'static str {
        "remove_duplicates"
    }

    fn apply(&self, table: &DataFrame, report: CleaningReport) -> Result<StageOutput> {
        let (table, removed) = remove_duplicate_rows(table)?;
        Ok(StageOutput {
            table,
            report: report.with_duplicates_removed(removed),
        })
    }
}

/// Drops rows equal to an earlier row in every column, keeping the first
/// occurrence and the original row order.
pub fn remove_duplicate_rows(df: &DataFrame) -> PolarsResult<(DataFrame, usize)> {
    if df.height() < 2 {
        return Ok((df.clone(), 0));
    }

    let deduplicated = df.unique_stable(None, UniqueKeepStrategy::First, None)?;
    let removed = df.height() - deduplicated.height();
    Ok((deduplicated, removed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_occurrence_in_order() -> PolarsResult<()> {
        let df = df!(
            "district_name" => ["A", "B", "A", "C", "B"],
            "year" => [1970i64, 1970, 1970, 1971, 1971],
        )?;

        let (deduplicated, removed) = remove_duplicate_rows(&df)?;

        assert_eq!(removed, 1);
        let districts: Vec<Option<&str>> = deduplicated
            .column("district_name")?
            .str()?
            .into_iter()
            .collect();
        assert_eq!(districts, vec![Some("A"), Some("B"), Some("C"), Some("B")]);
        Ok(())
    }

    #[test]
    fn rows_differing_in_one_column_are_kept() -> PolarsResult<()> {
        let df = df!(
            "district_name" => ["A", "A"],
            "rice_production_1000_tons" => [100.0, 100.5],
        )?;

        let (deduplicated, removed) = remove_duplicate_rows(&df)?;
        assert_eq!(removed, 0);
        assert_eq!(deduplicated.height(), 2);
        Ok(())
    }
}
