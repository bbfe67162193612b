use polars::prelude::*;

pub(crate) fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names()
        .iter()
        .any(|column| column.as_str() == name)
}

pub(crate) fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

/// Columns holding crop measurements: any label mentioning area, production
/// or yield.
pub(crate) fn is_measure_column(name: &str) -> bool {
    name.contains("area") || name.contains("production") || name.contains("yield")
}

pub(crate) fn is_production_column(name: &str) -> bool {
    name.contains("production")
}

/// Reads a column as `f64`, casting when needed. Nulls are preserved.
pub(crate) fn float_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

/// Reads a column as text, casting when needed. Nulls are preserved.
pub(crate) fn string_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}
