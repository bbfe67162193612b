use polars::prelude::*;
use tracing::debug;

use crate::error::{CleaningError, Result};
use crate::missing_values::{CODE_COLUMNS, UNKNOWN};
use crate::pipelines::{CleaningStage, StageOutput};
use crate::report::CleaningReport;
use crate::table::{column_names, has_column, is_measure_column};

pub struct ValidateTypes;

impl CleaningStage for ValidateTypes {
    fn name(&self) -> &'static str {
        "validate_types"
    }

    fn apply(&self, table: &DataFrame, report: CleaningReport) -> Result<StageOutput> {
        let (table, coerced) = validate_types(table)?;
        Ok(StageOutput {
            table,
            report: report.with_numeric_values_coerced(coerced),
        })
    }
}

/// Coerces `year` to integers, codes to text and measure columns to floats.
///
/// A year that is not an integer aborts the run. Measure cells that are
/// missing, unparseable or negative become `0.0`; the number of such cells
/// is returned alongside the table.
pub fn validate_types(df: &DataFrame) -> Result<(DataFrame, usize)> {
    if !has_column(df, "year") {
        return Err(CleaningError::MissingColumn {
            column: "year".to_string(),
        });
    }

    let mut output = df.clone();
    output.with_column(coerce_year(df.column("year")?.as_materialized_series())?)?;

    for name in CODE_COLUMNS {
        if has_column(df, name) {
            let codes = coerce_code(df.column(name)?.as_materialized_series())?;
            output.with_column(codes)?;
        }
    }

    let mut coerced = 0usize;
    for name in column_names(df) {
        if !is_measure_column(&name) {
            continue;
        }
        let (values, replaced) = coerce_measure(df.column(&name)?.as_materialized_series())?;
        if replaced > 0 {
            debug!(column = %name, replaced, "measure cells coerced to zero");
        }
        coerced += replaced;
        output.with_column(values)?;
    }

    Ok((output, coerced))
}

fn coerce_year(series: &Series) -> Result<Series> {
    let name = series.name().clone();

    let years: Vec<i64> = match series.dtype() {
        DataType::String => series
            .str()?
            .into_iter()
            .enumerate()
            .map(|(record, value)| {
                value
                    .and_then(parse_year)
                    .ok_or_else(|| invalid_year(record, value))
            })
            .collect::<Result<_>>()?,
        DataType::Float32 | DataType::Float64 => series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .enumerate()
            .map(|(record, value)| match value {
                Some(year) if year.is_finite() => Ok(year.trunc() as i64),
                other => Err(invalid_year(record, other.map(|v| v.to_string()).as_deref())),
            })
            .collect::<Result<_>>()?,
        _ => {
            let cast = series.strict_cast(&DataType::Int64).map_err(|_| {
                invalid_year(0, Some(&format!("column of type {}", series.dtype())))
            })?;
            cast.i64()?
                .into_iter()
                .enumerate()
                .map(|(record, value)| value.ok_or_else(|| invalid_year(record, None)))
                .collect::<Result<_>>()?
        }
    };

    Ok(Series::new(name, years))
}

fn parse_year(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    trimmed.parse::<i64>().ok().or_else(|| {
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|year| year.is_finite() && year.fract() == 0.0)
            .map(|year| year as i64)
    })
}

fn invalid_year(record: usize, value: Option<&str>) -> CleaningError {
    CleaningError::InvalidYear {
        record,
        value: value.unwrap_or("<null>").to_string(),
    }
}

fn coerce_code(series: &Series) -> PolarsResult<Series> {
    let name = series.name().clone();
    let text = series.cast(&DataType::String)?;
    let codes: Vec<&str> = text
        .str()?
        .into_iter()
        .map(|value| match value {
            Some(code) if !code.trim().is_empty() => code,
            _ => UNKNOWN,
        })
        .collect();
    Ok(Series::new(name, codes))
}

/// Returns the measure as non-negative floats and how many cells were
/// replaced by zero.
fn coerce_measure(series: &Series) -> PolarsResult<(Series, usize)> {
    let name = series.name().clone();
    let mut replaced = 0usize;
    let mut keep_or_zero = |value: Option<f64>| match value {
        Some(number) if number.is_finite() && number >= 0.0 => number,
        _ => {
            replaced += 1;
            0.0
        }
    };

    let values: Vec<f64> = match series.dtype() {
        DataType::String => series
            .str()?
            .into_iter()
            .map(|value| keep_or_zero(value.and_then(|text| text.trim().parse::<f64>().ok())))
            .collect(),
        _ => series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(&mut keep_or_zero)
            .collect(),
    };

    Ok((Series::new(name, values), replaced))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_text_is_parsed_and_trimmed() -> Result<()> {
        let df = df!("year" => [" 1970", "1971.0", "2016"])?;
        let (validated, _) = validate_types(&df)?;
        let years: Vec<Option<i64>> = validated.column("year")?.i64()?.into_iter().collect();
        assert_eq!(years, vec![Some(1970), Some(1971), Some(2016)]);
        Ok(())
    }

    #[test]
    fn non_numeric_year_names_the_value() -> PolarsResult<()> {
        let df = df!("year" => ["1970", "abc"])?;
        match validate_types(&df) {
            Err(CleaningError::InvalidYear { record, value }) => {
                assert_eq!(record, 1);
                assert_eq!(value, "abc");
            }
            other => panic!("expected InvalidYear, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn fractional_year_text_is_rejected() -> PolarsResult<()> {
        let df = df!("year" => ["1970.5"])?;
        assert!(matches!(
            validate_types(&df),
            Err(CleaningError::InvalidYear { .. })
        ));
        Ok(())
    }

    #[test]
    fn missing_year_column_is_an_error() -> PolarsResult<()> {
        let df = df!("state_name" => ["Bihar"])?;
        assert!(matches!(
            validate_types(&df),
            Err(CleaningError::MissingColumn { .. })
        ));
        Ok(())
    }

    #[test]
    fn codes_become_text() -> Result<()> {
        let df = df!(
            "year" => [1970i64, 1971],
            "state_code" => [14i64, 15],
            "district_code" => [Some("7"), None],
        )?;
        let (validated, _) = validate_types(&df)?;

        let states: Vec<Option<&str>> = validated.column("state_code")?.str()?.into_iter().collect();
        assert_eq!(states, vec![Some("14"), Some("15")]);
        let districts: Vec<Option<&str>> =
            validated.column("district_code")?.str()?.into_iter().collect();
        assert_eq!(districts, vec![Some("7"), Some(UNKNOWN)]);
        Ok(())
    }

    #[test]
    fn unparseable_and_negative_measures_become_zero() -> Result<()> {
        let df = df!(
            "year" => [1970i64, 1971, 1972],
            "rice_area_1000_ha" => ["12.5", "n/a", " 3 "],
            "wheat_yield_kg_per_ha" => [Some(-1.0), Some(1500.0), None],
            "district_name" => ["A", "B", "C"],
        )?;

        let (validated, coerced) = validate_types(&df)?;

        assert_eq!(coerced, 3);
        let rice: Vec<Option<f64>> = validated.column("rice_area_1000_ha")?.f64()?.into_iter().collect();
        assert_eq!(rice, vec![Some(12.5), Some(0.0), Some(3.0)]);
        let wheat: Vec<Option<f64>> = validated
            .column("wheat_yield_kg_per_ha")?
            .f64()?
            .into_iter()
            .collect();
        assert_eq!(wheat, vec![Some(0.0), Some(1500.0), Some(0.0)]);
        let names: Vec<Option<&str>> = validated.column("district_name")?.str()?.into_iter().collect();
        assert_eq!(names, vec![Some("A"), Some("B"), Some("C")]);
        Ok(())
    }

    #[test]
    fn integer_measures_are_widened_to_float() -> Result<()> {
        let df = df!("year" => [1970i64], "rice_production_1000_tons" => [100i64])?;
        let (validated, coerced) = validate_types(&df)?;
        assert_eq!(coerced, 0);
        assert_eq!(
            validated.column("rice_production_1000_tons")?.dtype(),
            &DataType::Float64
        );
        Ok(())
    }
}
