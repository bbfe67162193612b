use std::collections::{HashMap, HashSet};

use agridata_parser::{Crop, Measure, SemanticKey};
use once_cell::sync::Lazy;
use polars::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::table::{column_names, float_values, has_column, string_values};

/// Crop measures per fact row: eleven warehouse crops by area, production
/// and yield.
pub const MEASURES_PER_FACT: usize = Crop::WAREHOUSE.len() * Measure::ALL.len();

pub const REQUIRED_COLUMNS: [&str; 7] = [
    "state_code",
    "state_name",
    "district_code",
    "district_name",
    "year",
    "decade",
    "is_recent",
];

static MEASURE_KEYS: Lazy<Vec<SemanticKey>> = Lazy::new(|| {
    Crop::WAREHOUSE
        .iter()
        .flat_map(|crop| {
            Measure::ALL
                .iter()
                .map(move |measure| SemanticKey::new(*crop, *measure))
        })
        .collect()
});

/// Fact-table measure columns (`rice_area`, `rice_production`, ...) in
/// storage order.
pub fn measure_keys() -> &'static [SemanticKey] {
    MEASURE_KEYS.as_slice()
}

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("polars operation failed: {0}")]
    Polars(#[from] PolarsError),

    #[error("cleaned table is missing required column '{column}'")]
    MissingColumn { column: &'static str },

    #[error("row {row} has no value for '{column}'")]
    NullValue { column: &'static str, row: usize },

    #[error("state code {state_code} is used for both '{existing}' and '{conflicting}'")]
    ConflictingStateCode {
        state_code: String,
        existing: String,
        conflicting: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateRow {
    pub state_id: i64,
    pub state_code: String,
    pub state_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistrictRow {
    pub district_id: i64,
    pub district_code: String,
    pub district_name: String,
    pub state_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearRow {
    pub year_id: i64,
    pub decade: i64,
    pub is_recent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactRow {
    pub production_id: i64,
    pub district_id: i64,
    pub year_id: i64,
    /// Ordered as [`measure_keys`]; `None` when the crop is absent from the
    /// cleaned table.
    pub measures: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DimensionalModel {
    pub states: Vec<StateRow>,
    pub districts: Vec<DistrictRow>,
    pub years: Vec<YearRow>,
    pub facts: Vec<FactRow>,
}

impl DimensionalModel {
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

/// Finds the cleaned column for each fact measure: the exact
/// `<crop>_<measure>` label, or the first `<crop>_<measure>_<unit>` label.
pub fn resolve_measure_columns(columns: &[String]) -> Vec<Option<String>> {
    measure_keys()
        .iter()
        .map(|key| {
            let exact = key.canonical_name();
            let prefix = format!("{exact}_");
            columns
                .iter()
                .find(|column| **column == exact)
                .or_else(|| columns.iter().find(|column| column.starts_with(&prefix)))
                .cloned()
        })
        .collect()
}

/// Decomposes a cleaned table into state, district and year dimensions plus
/// one fact row per cleaned row. Surrogate ids start at 1 in first-seen
/// order; `year_id` is the year itself.
pub fn project(df: &DataFrame) -> Result<DimensionalModel, ProjectionError> {
    for column in REQUIRED_COLUMNS {
        if !has_column(df, column) {
            return Err(ProjectionError::MissingColumn { column });
        }
    }

    let state_codes = string_values(df, "state_code")?;
    let state_names = string_values(df, "state_name")?;
    let district_codes = string_values(df, "district_code")?;
    let district_names = string_values(df, "district_name")?;
    let years = df
        .column("year")?
        .as_materialized_series()
        .cast(&DataType::Int64)?;
    let years = years.i64()?;
    let decades = df
        .column("decade")?
        .as_materialized_series()
        .cast(&DataType::Int64)?;
    let decades = decades.i64()?;
    let recent = df.column("is_recent")?.as_materialized_series().cast(&DataType::Boolean)?;
    let recent = recent.bool()?;

    let measure_columns = resolve_measure_columns(&column_names(df));
    let measure_values = measure_columns
        .iter()
        .map(|column| column.as_deref().map(|name| float_values(df, name)).transpose())
        .collect::<PolarsResult<Vec<_>>>()?;

    let mut model = DimensionalModel::default();
    let mut state_ids: HashMap<String, (i64, String)> = HashMap::new();
    let mut district_ids: HashMap<(String, String, i64), i64> = HashMap::new();
    let mut seen_years: HashSet<i64> = HashSet::new();

    for row in 0..df.height() {
        let state_code = required(&state_codes, "state_code", row)?;
        let state_name = required(&state_names, "state_name", row)?;
        let district_code = required(&district_codes, "district_code", row)?;
        let district_name = required(&district_names, "district_name", row)?;
        let year = years
            .get(row)
            .ok_or(ProjectionError::NullValue { column: "year", row })?;
        let decade = decades
            .get(row)
            .ok_or(ProjectionError::NullValue { column: "decade", row })?;
        let is_recent = recent
            .get(row)
            .ok_or(ProjectionError::NullValue { column: "is_recent", row })?;

        let state_id = match state_ids.get(state_code) {
            Some((id, existing)) if existing == state_name => *id,
            Some((_, existing)) => {
                return Err(ProjectionError::ConflictingStateCode {
                    state_code: state_code.to_string(),
                    existing: existing.clone(),
                    conflicting: state_name.to_string(),
                })
            }
            None => {
                let id = model.states.len() as i64 + 1;
                state_ids.insert(state_code.to_string(), (id, state_name.to_string()));
                model.states.push(StateRow {
                    state_id: id,
                    state_code: state_code.to_string(),
                    state_name: state_name.to_string(),
                });
                id
            }
        };

        let district_key = (district_code.to_string(), district_name.to_string(), state_id);
        let district_id = match district_ids.get(&district_key) {
            Some(id) => *id,
            None => {
                let id = model.districts.len() as i64 + 1;
                model.districts.push(DistrictRow {
                    district_id: id,
                    district_code: district_key.0.clone(),
                    district_name: district_key.1.clone(),
                    state_id,
                });
                district_ids.insert(district_key, id);
                id
            }
        };

        if seen_years.insert(year) {
            model.years.push(YearRow {
                year_id: year,
                decade,
                is_recent,
            });
        }

        model.facts.push(FactRow {
            production_id: row as i64 + 1,
            district_id,
            year_id: year,
            measures: measure_values
                .iter()
                .map(|values| values.as_ref().and_then(|values| values[row]))
                .collect(),
        });
    }

    Ok(model)
}

fn required<'a>(
    values: &'a [Option<String>],
    column: &'static str,
    row: usize,
) -> Result<&'a str, ProjectionError> {
    values[row]
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or(ProjectionError::NullValue { column, row })
}
