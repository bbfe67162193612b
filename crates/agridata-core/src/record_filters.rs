use polars::prelude::*;

use crate::error::Result;
use crate::missing_values::UNKNOWN;
use crate::pipelines::{CleaningStage, StageOutput};
use crate::report::CleaningReport;
use crate::table::{column_names, float_values, is_production_column};

pub struct FilterInvalidRecords;

impl CleaningStage for FilterInvalidRecords {
    fn name(&self) -> &'static str {
        "filter_invalid_records"
    }

    fn apply(&self, table: &DataFrame, report: CleaningReport) -> Result<StageOutput> {
        let (table, removed) = filter_invalid_records(table)?;
        Ok(StageOutput {
            table,
            report: report.with_invalid_records_removed(removed),
        })
    }
}

/// Per-row sum of every production column, with nulls counted as zero.
pub fn production_totals(df: &DataFrame) -> PolarsResult<Vec<f64>> {
    let mut totals = vec![0.0f64; df.height()];
    for name in column_names(df) {
        if !is_production_column(&name) {
            continue;
        }
        for (total, value) in totals.iter_mut().zip(float_values(df, &name)?) {
            *total += value.unwrap_or(0.0);
        }
    }
    Ok(totals)
}

/// Drops rows that have neither a known state nor any recorded production.
pub fn filter_invalid_records(df: &DataFrame) -> PolarsResult<(DataFrame, usize)> {
    let states = df.column("state_name")?.str()?;
    let totals = production_totals(df)?;

    let keep: Vec<bool> = states
        .into_iter()
        .zip(totals)
        .map(|(state, total)| !(state == Some(UNKNOWN) && total == 0.0))
        .collect();

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    let filtered = df.filter(&mask)?;
    let removed = df.height() - filtered.height();
    Ok((filtered, removed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_only_unknown_states_without_production() -> PolarsResult<()> {
        let df = df!(
            "state_name" => [UNKNOWN, UNKNOWN, "Bihar", "Bihar"],
            "district_name" => ["A", "B", "C", "D"],
            "rice_production_1000_tons" => [0.0, 12.0, 0.0, 5.0],
            "wheat_production_1000_tons" => [0.0, 0.0, 0.0, 1.0],
            "rice_area_1000_ha" => [40.0, 0.0, 0.0, 0.0],
        )?;

        let (filtered, removed) = filter_invalid_records(&df)?;

        assert_eq!(removed, 1);
        let districts: Vec<Option<&str>> =
            filtered.column("district_name")?.str()?.into_iter().collect();
        assert_eq!(districts, vec![Some("B"), Some("C"), Some("D")]);
        Ok(())
    }

    #[test]
    fn any_production_keeps_unknown_state() -> PolarsResult<()> {
        let df = df!(
            "state_name" => [UNKNOWN],
            "rice_production_1000_tons" => [0.5],
            "maize_production_1000_tons" => [0.0],
        )?;
        let totals = production_totals(&df)?;
        assert_eq!(totals, vec![0.5]);
        let (_, removed) = filter_invalid_records(&df)?;
        assert_eq!(removed, 0);
        Ok(())
    }
}
