use polars::prelude::*;

use crate::error::Result;
use crate::pipelines::{CleaningStage, StageOutput};
use crate::report::CleaningReport;

/// First year counted as recent.
pub const RECENT_FROM_YEAR: i64 = 2015;

pub struct AddDerivedColumns;

impl CleaningStage for AddDerivedColumns {
    fn name(&self) -> &'static str {
        "add_derived_columns"
    }

    fn apply(&self, table: &DataFrame, report: CleaningReport) -> Result<StageOutput> {
        Ok(StageOutput {
            table: add_derived_columns(table)?,
            report,
        })
    }
}

pub fn decade_of(year: i64) -> i64 {
    year.div_euclid(10) * 10
}

pub fn is_recent(year: i64) -> bool {
    year >= RECENT_FROM_YEAR
}

/// Adds `decade` and `is_recent`, replacing earlier versions of either.
/// Expects `year` to already be an integer column.
pub fn add_derived_columns(df: &DataFrame) -> PolarsResult<DataFrame> {
    let years = df.column("year")?.i64()?;

    let decades: Vec<Option<i64>> = years.into_iter().map(|year| year.map(decade_of)).collect();
    let recent: Vec<Option<bool>> = years.into_iter().map(|year| year.map(is_recent)).collect();

    let mut output = df.clone();
    output.with_column(Series::new("decade".into(), decades))?;
    output.with_column(Series::new("is_recent".into(), recent))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decade_floors_to_multiple_of_ten() {
        assert_eq!(decade_of(1966), 1960);
        assert_eq!(decade_of(1970), 1970);
        assert_eq!(decade_of(2019), 2010);
        assert_eq!(decade_of(-5), -10);
    }

    #[test]
    fn recent_threshold_is_inclusive() {
        assert!(!is_recent(2014));
        assert!(is_recent(2015));
    }

    #[test]
    fn adds_columns_once_even_when_rerun() -> PolarsResult<()> {
        let df = df!("year" => [1966i64, 2015, 2017])?;

        let derived = add_derived_columns(&df)?;
        let rerun = add_derived_columns(&derived)?;

        assert_eq!(rerun.width(), 3);
        let decades: Vec<Option<i64>> = rerun.column("decade")?.i64()?.into_iter().collect();
        assert_eq!(decades, vec![Some(1960), Some(2010), Some(2010)]);
        let recent: Vec<Option<bool>> = rerun.column("is_recent")?.bool()?.into_iter().collect();
        assert_eq!(recent, vec![Some(false), Some(true), Some(true)]);
        Ok(())
    }
}
