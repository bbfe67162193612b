use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use agridata_parser::{ColumnMap, Crop, Measure, SemanticKey};
use polars::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::outputs::{write_atomically, OutputError};
use crate::table::{column_names, has_column};

pub const BATTERY_SUMMARY_FILE: &str = "battery_summary.json";

const WEST_BENGAL: &str = "West Bengal";
const UTTAR_PRADESH: &str = "Uttar Pradesh";

const OILSEED_CROPS: [Crop; 4] = [
    Crop::Groundnut,
    Crop::Soybean,
    Crop::Sunflower,
    Crop::RapeseedMustard,
];
const CORRELATION_CROPS: [Crop; 3] = [Crop::Rice, Crop::Wheat, Crop::Maize];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Integer(i64),
    Number(f64),
    Empty,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(value) => f.write_str(value),
            Cell::Integer(value) => write!(f, "{value}"),
            Cell::Number(value) => write!(f, "{value}"),
            Cell::Empty => Ok(()),
        }
    }
}

impl Cell {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(value) => Some(*value),
            Cell::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value),
            _ => None,
        }
    }
}

/// One aggregate table of the battery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTable {
    /// Position in the battery, starting at 1.
    pub index: usize,
    pub name: &'static str,
    pub title: &'static str,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl ReportTable {
    pub fn file_name(&self) -> String {
        format!("{:02}_{}.csv", self.index, self.name)
    }

    /// Value of `header` in every row.
    pub fn column(&self, header: &str) -> Option<Vec<&Cell>> {
        let position = self.headers.iter().position(|name| name == header)?;
        Some(self.rows.iter().map(|row| &row[position]).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    MissingKeys { keys: Vec<String> },
    MissingColumn { column: String },
    Failed { message: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingKeys { keys } => write!(f, "missing semantic keys {}", keys.join(", ")),
            SkipReason::MissingColumn { column } => write!(f, "missing column {column}"),
            SkipReason::Failed { message } => write!(f, "failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedReport {
    pub index: usize,
    pub name: &'static str,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatteryOutcome {
    pub produced: Vec<ReportTable>,
    pub skipped: Vec<SkippedReport>,
}

impl BatteryOutcome {
    pub fn report(&self, name: &str) -> Option<&ReportTable> {
        self.produced.iter().find(|report| report.name == name)
    }

    pub fn skipped(&self, name: &str) -> Option<&SkipReason> {
        self.skipped
            .iter()
            .find(|skipped| skipped.name == name)
            .map(|skipped| &skipped.reason)
    }
}

struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

enum ReportFailure {
    MissingKeys(Vec<SemanticKey>),
    MissingColumn(&'static str),
    Polars(PolarsError),
}

impl From<PolarsError> for ReportFailure {
    fn from(err: PolarsError) -> Self {
        ReportFailure::Polars(err)
    }
}

impl From<ReportFailure> for SkipReason {
    fn from(failure: ReportFailure) -> Self {
        match failure {
            ReportFailure::MissingKeys(keys) => SkipReason::MissingKeys {
                keys: keys.iter().map(SemanticKey::canonical_name).collect(),
            },
            ReportFailure::MissingColumn(column) => SkipReason::MissingColumn {
                column: column.to_string(),
            },
            ReportFailure::Polars(err) => SkipReason::Failed {
                message: err.to_string(),
            },
        }
    }
}

type ReportResult = Result<Table, ReportFailure>;

struct ReportDefinition {
    name: &'static str,
    title: &'static str,
    build: fn(&Battery<'_>) -> ReportResult,
}

static BATTERY: [ReportDefinition; 15] = [
    ReportDefinition {
        name: "top_rice_states",
        title: "Top 7 rice producing states",
        build: |battery| battery.top_states(Crop::Rice, 7),
    },
    ReportDefinition {
        name: "top_wheat_states",
        title: "Top 5 wheat producing states",
        build: |battery| battery.top_states(Crop::Wheat, 5),
    },
    ReportDefinition {
        name: "top_oilseed_states",
        title: "Top 5 oilseed producing states",
        build: |battery| battery.top_states(Crop::Oilseeds, 5),
    },
    ReportDefinition {
        name: "top_sunflower_states",
        title: "Top 7 sunflower producing states",
        build: |battery| battery.top_states(Crop::Sunflower, 7),
    },
    ReportDefinition {
        name: "sugarcane_yearly",
        title: "Sugarcane production by year",
        build: |battery| battery.yearly_totals(&[Crop::Sugarcane], false),
    },
    ReportDefinition {
        name: "rice_vs_wheat_yearly",
        title: "Rice and wheat production by year",
        build: |battery| battery.yearly_totals(&[Crop::Rice, Crop::Wheat], false),
    },
    ReportDefinition {
        name: "west_bengal_rice_districts",
        title: "Top 10 rice producing districts in West Bengal",
        build: |battery| battery.top_districts_in(WEST_BENGAL, Crop::Rice, 10),
    },
    ReportDefinition {
        name: "uttar_pradesh_wheat_years",
        title: "Top 10 wheat production years in Uttar Pradesh",
        build: |battery| battery.top_years_in(UTTAR_PRADESH, Crop::Wheat, 10),
    },
    ReportDefinition {
        name: "millet_yearly",
        title: "Millet production by year",
        build: |battery| battery.yearly_totals(&[Crop::PearlMillet, Crop::FingerMillet], true),
    },
    ReportDefinition {
        name: "top_sorghum_states",
        title: "Top 8 sorghum producing states",
        build: |battery| battery.top_states(Crop::Sorghum, 8),
    },
    ReportDefinition {
        name: "top_groundnut_states",
        title: "Top 7 groundnut producing states",
        build: |battery| battery.top_states(Crop::Groundnut, 7),
    },
    ReportDefinition {
        name: "soybean_states_yield",
        title: "Top 5 soybean producing states with mean yield",
        build: |battery| battery.soybean_with_yield(5),
    },
    ReportDefinition {
        name: "oilseed_cross_tab",
        title: "Oilseed composition in the top 5 states",
        build: |battery| battery.oilseed_cross_tab(5),
    },
    ReportDefinition {
        name: "area_production_correlation",
        title: "Area against production correlation",
        build: |battery| battery.area_production_correlation(),
    },
    ReportDefinition {
        name: "rice_wheat_yield_states",
        title: "Top 10 states by mean rice and wheat yield",
        build: |battery| battery.rice_wheat_yield(10),
    },
];

/// Report names in battery order.
pub fn report_names() -> impl Iterator<Item = &'static str> {
    BATTERY.iter().map(|definition| definition.name)
}

/// Runs every report over the cleaned table. A report whose inputs are
/// unavailable is recorded as skipped and the rest still run.
pub fn run_battery(df: &DataFrame, columns: &ColumnMap) -> BatteryOutcome {
    let battery = Battery { df, columns };
    let mut outcome = BatteryOutcome::default();

    for (position, definition) in BATTERY.iter().enumerate() {
        let index = position + 1;
        match (definition.build)(&battery) {
            Ok(table) => {
                info!(report = definition.name, rows = table.rows.len(), "report produced");
                outcome.produced.push(ReportTable {
                    index,
                    name: definition.name,
                    title: definition.title,
                    headers: table.headers,
                    rows: table.rows,
                });
            }
            Err(failure) => {
                let reason = SkipReason::from(failure);
                warn!(report = definition.name, %reason, "report skipped");
                outcome.skipped.push(SkippedReport {
                    index,
                    name: definition.name,
                    reason,
                });
            }
        }
    }

    outcome
}

#[derive(Serialize)]
struct BatterySummary<'a> {
    produced: Vec<ProducedEntry<'a>>,
    skipped: &'a [SkippedReport],
}

#[derive(Serialize)]
struct ProducedEntry<'a> {
    index: usize,
    name: &'a str,
    title: &'a str,
    rows: usize,
    file: String,
}

/// Writes one CSV per produced report and `battery_summary.json` into `dir`.
/// Returns the paths written, summary last.
pub fn write_battery(outcome: &BatteryOutcome, dir: &Path) -> Result<Vec<PathBuf>, OutputError> {
    fs::create_dir_all(dir).map_err(|source| OutputError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(outcome.produced.len() + 1);
    for report in &outcome.produced {
        let path = dir.join(report.file_name());
        write_atomically(&path, |writer| {
            let mut csv_writer = csv::Writer::from_writer(writer);
            csv_writer.write_record(&report.headers)?;
            for row in &report.rows {
                csv_writer.write_record(row.iter().map(Cell::to_string))?;
            }
            csv_writer.flush().map_err(csv::Error::from)?;
            Ok(())
        })?;
        written.push(path);
    }

    let summary = BatterySummary {
        produced: outcome
            .produced
            .iter()
            .map(|report| ProducedEntry {
                index: report.index,
                name: report.name,
                title: report.title,
                rows: report.rows.len(),
                file: report.file_name(),
            })
            .collect(),
        skipped: &outcome.skipped,
    };
    let summary_path = dir.join(BATTERY_SUMMARY_FILE);
    write_atomically(&summary_path, |writer| {
        serde_json::to_writer_pretty(writer, &summary)?;
        Ok(())
    })?;
    written.push(summary_path);

    Ok(written)
}

struct Battery<'a> {
    df: &'a DataFrame,
    columns: &'a ColumnMap,
}

impl Battery<'_> {
    fn require(&self, keys: &[SemanticKey]) -> Result<(), ReportFailure> {
        let missing: Vec<SemanticKey> = keys
            .iter()
            .copied()
            .filter(|key| !self.columns.contains(*key))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ReportFailure::MissingKeys(missing))
        }
    }

    fn measure(&self, key: SemanticKey) -> Result<Expr, ReportFailure> {
        let column = self
            .columns
            .get(key)
            .ok_or_else(|| ReportFailure::MissingKeys(vec![key]))?;
        Ok(col(column).cast(DataType::Float64))
    }

    /// Group total of `key`, named after the key. Missing values count as zero.
    fn total(&self, key: SemanticKey) -> Result<Expr, ReportFailure> {
        Ok(self
            .measure(key)?
            .fill_null(lit(0.0))
            .sum()
            .alias(key.canonical_name()))
    }

    /// Drops rows without a `group` label and gives the label a stable type.
    fn keyed(&self, rows: LazyFrame, group: &'static str) -> Result<LazyFrame, ReportFailure> {
        if !has_column(self.df, group) {
            return Err(ReportFailure::MissingColumn(group));
        }
        let dtype = if group == "year" {
            DataType::Int64
        } else {
            DataType::String
        };
        Ok(rows
            .filter(col(group).is_not_null())
            .with_column(col(group).cast(dtype)))
    }

    fn in_state(&self, state: &str) -> Result<LazyFrame, ReportFailure> {
        if !has_column(self.df, "state_name") {
            return Err(ReportFailure::MissingColumn("state_name"));
        }
        Ok(self
            .df
            .clone()
            .lazy()
            .filter(col("state_name").cast(DataType::String).eq(lit(state))))
    }

    fn top_by(&self, rows: LazyFrame, group: &'static str, crop: Crop, n: usize) -> ReportResult {
        let key = production(crop);
        self.require(&[key])?;
        let totals = self
            .keyed(rows, group)?
            .group_by([col(group)])
            .agg([self.total(key)?]);
        into_table(largest(totals, &key.canonical_name(), group, n).collect()?)
    }

    fn top_states(&self, crop: Crop, n: usize) -> ReportResult {
        self.top_by(self.df.clone().lazy(), "state_name", crop, n)
    }

    fn top_districts_in(&self, state: &str, crop: Crop, n: usize) -> ReportResult {
        self.top_by(self.in_state(state)?, "district_name", crop, n)
    }

    fn top_years_in(&self, state: &str, crop: Crop, n: usize) -> ReportResult {
        self.top_by(self.in_state(state)?, "year", crop, n)
    }

    fn yearly_totals(&self, crops: &[Crop], with_total: bool) -> ReportResult {
        let keys: Vec<SemanticKey> = crops.iter().copied().map(production).collect();
        self.require(&keys)?;
        let totals = keys
            .iter()
            .map(|key| self.total(*key))
            .collect::<Result<Vec<_>, _>>()?;

        let mut by_year = self
            .keyed(self.df.clone().lazy(), "year")?
            .group_by([col("year")])
            .agg(totals);
        if with_total {
            by_year = by_year.with_column(row_sum(&keys).alias("total"));
        }

        into_table(by_year.sort(["year"], SortMultipleOptions::default()).collect()?)
    }

    fn soybean_with_yield(&self, n: usize) -> ReportResult {
        let production_key = production(Crop::Soybean);
        let yield_key = SemanticKey::new(Crop::Soybean, Measure::Yield);
        self.require(&[production_key])?;
        let mean_name = format!("mean_{}", yield_key.canonical_name());

        let mut aggregates = vec![self.total(production_key)?];
        let has_yield = self.columns.contains(yield_key);
        if has_yield {
            aggregates.push(self.measure(yield_key)?.mean().alias(mean_name.as_str()));
        }

        let by_state = self
            .keyed(self.df.clone().lazy(), "state_name")?
            .group_by([col("state_name")])
            .agg(aggregates);
        // Without a yield column the mean is reported as zero.
        let by_state = if has_yield {
            by_state.with_column(col(mean_name.as_str()).fill_null(lit(0.0)))
        } else {
            by_state.with_column(lit(0.0).alias(mean_name.as_str()))
        };

        into_table(largest(by_state, &production_key.canonical_name(), "state_name", n).collect()?)
    }

    fn oilseed_cross_tab(&self, n: usize) -> ReportResult {
        let all_keys: Vec<SemanticKey> = OILSEED_CROPS.iter().copied().map(production).collect();
        let keys: Vec<SemanticKey> = all_keys
            .iter()
            .copied()
            .filter(|key| self.columns.contains(*key))
            .collect();
        if keys.is_empty() {
            return Err(ReportFailure::MissingKeys(all_keys));
        }

        let totals = keys
            .iter()
            .map(|key| self.total(*key))
            .collect::<Result<Vec<_>, _>>()?;
        let by_state = self
            .keyed(self.df.clone().lazy(), "state_name")?
            .group_by([col("state_name")])
            .agg(totals)
            .with_column(row_sum(&keys).alias("total"));

        into_table(largest(by_state, "total", "state_name", n).collect()?)
    }

    fn area_production_correlation(&self) -> ReportResult {
        let mut missing = Vec::new();
        let mut rows = Vec::new();

        for crop in CORRELATION_CROPS {
            let area_key = SemanticKey::new(crop, Measure::Area);
            let production_key = production(crop);
            if let Err(ReportFailure::MissingKeys(keys)) = self.require(&[area_key, production_key]) {
                missing.extend(keys);
                continue;
            }

            let positive = self
                .df
                .clone()
                .lazy()
                .select([
                    self.measure(area_key)?.alias("area"),
                    self.measure(production_key)?.alias("production"),
                ])
                .filter(col("area").gt(lit(0.0)).and(col("production").gt(lit(0.0))))
                .collect()?;
            let pairs: Vec<(f64, f64)> = positive
                .column("area")?
                .f64()?
                .into_iter()
                .zip(positive.column("production")?.f64()?)
                .filter_map(|(area, output)| Some((area?, output?)))
                .collect();

            rows.push(vec![
                Cell::Text(crop.canonical_name().to_string()),
                Cell::Integer(pairs.len() as i64),
                pearson(&pairs).map_or(Cell::Empty, Cell::Number),
            ]);
        }

        if rows.is_empty() {
            return Err(ReportFailure::MissingKeys(missing));
        }

        Ok(Table {
            headers: vec![
                "crop".to_string(),
                "positive_pairs".to_string(),
                "correlation".to_string(),
            ],
            rows,
        })
    }

    fn rice_wheat_yield(&self, n: usize) -> ReportResult {
        let rice = SemanticKey::new(Crop::Rice, Measure::Yield);
        let wheat = SemanticKey::new(Crop::Wheat, Measure::Yield);
        self.require(&[rice, wheat])?;
        let rice_mean = format!("mean_{}", rice.canonical_name());
        let wheat_mean = format!("mean_{}", wheat.canonical_name());

        let by_state = self
            .keyed(self.df.clone().lazy(), "state_name")?
            .group_by([col("state_name")])
            .agg([
                self.measure(rice)?.mean().alias(rice_mean.as_str()),
                self.measure(wheat)?.mean().alias(wheat_mean.as_str()),
            ])
            .filter(
                col(rice_mean.as_str())
                    .is_not_null()
                    .and(col(wheat_mean.as_str()).is_not_null()),
            )
            .with_column(
                (col(rice_mean.as_str()) + col(wheat_mean.as_str())).alias("total_yield"),
            );

        into_table(largest(by_state, "total_yield", "state_name", n).collect()?)
    }
}

fn production(crop: Crop) -> SemanticKey {
    SemanticKey::new(crop, Measure::Production)
}

/// Sum of the per-key totals within one output row.
fn row_sum(keys: &[SemanticKey]) -> Expr {
    keys.iter()
        .map(|key| col(key.canonical_name()))
        .reduce(|acc, next| acc + next)
        .unwrap_or_else(|| lit(0.0))
}

/// The `n` largest groups by `value`, descending. Ties go by group label.
fn largest(groups: LazyFrame, value: &str, group: &str, n: usize) -> LazyFrame {
    groups
        .sort_by_exprs(
            [col(value), col(group)],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .limit(n as IdxSize)
}

/// Converts an aggregate frame to report cells, one row per frame row.
fn into_table(df: DataFrame) -> ReportResult {
    let headers = column_names(&df);
    let mut rows: Vec<Vec<Cell>> = vec![Vec::with_capacity(headers.len()); df.height()];

    for column in df.get_columns() {
        let series = column.as_materialized_series();
        let cells: Vec<Cell> = match series.dtype() {
            DataType::String => series
                .str()?
                .into_iter()
                .map(|value| value.map_or(Cell::Empty, |text| Cell::Text(text.to_string())))
                .collect(),
            dtype if dtype.is_integer() => series
                .cast(&DataType::Int64)?
                .i64()?
                .into_iter()
                .map(|value| value.map_or(Cell::Empty, Cell::Integer))
                .collect(),
            _ => series
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|value| value.map_or(Cell::Empty, Cell::Number))
                .collect(),
        };
        for (row, cell) in rows.iter_mut().zip(cells) {
            row.push(cell);
        }
    }

    Ok(Table { headers, rows })
}

fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut covariance, mut variance_x, mut variance_y) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        variance_x += dx * dx;
        variance_y += dy * dy;
    }

    let denominator = (variance_x * variance_y).sqrt();
    (denominator > 0.0).then(|| covariance / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agridata_parser::SynonymRegistry;

    fn cleaned() -> DataFrame {
        df!(
            "state_name" => ["West Bengal", "West Bengal", "Punjab", "Punjab", "Bihar"],
            "district_name" => ["Bankura", "Burdwan", "Ludhiana", "Ludhiana", "Patna"],
            "year" => [1990i64, 1990, 1990, 1991, 1991],
            "rice_area_1000_ha" => [1.0, 2.0, 3.0, 4.0, 0.0],
            "rice_production_1000_tons" => [2.0, 4.0, 6.0, 8.0, 0.0],
            "rice_yield_kg_per_ha" => [2000.0, 2000.0, 2000.0, 2000.0, 0.0],
            "wheat_production_1000_tons" => [0.5, 0.0, 30.0, 35.0, 4.0],
            "wheat_yield_kg_per_ha" => [900.0, 1100.0, 3000.0, 3200.0, 1500.0]
        )
        .expect("frame")
    }

    fn outcome() -> BatteryOutcome {
        let df = cleaned();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let columns = ColumnMap::reconcile(&names, SynonymRegistry::standard());
        run_battery(&df, &columns)
    }

    #[test]
    fn battery_has_fifteen_reports() {
        let outcome = outcome();
        assert_eq!(report_names().count(), 15);
        assert_eq!(outcome.produced.len() + outcome.skipped.len(), 15);
    }

    #[test]
    fn ranks_states_by_total_production() {
        let outcome = outcome();
        let report = outcome.report("top_rice_states").expect("rice report");

        let states: Vec<&str> = report
            .column("state_name")
            .expect("state column")
            .into_iter()
            .filter_map(Cell::as_text)
            .collect();
        assert_eq!(states, vec!["Punjab", "West Bengal", "Bihar"]);
        assert_eq!(report.rows[0][1], Cell::Number(14.0));
    }

    #[test]
    fn absent_crop_is_skipped_not_failed() {
        let outcome = outcome();
        assert_eq!(
            outcome.skipped("sugarcane_yearly"),
            Some(&SkipReason::MissingKeys {
                keys: vec!["sugarcane_production".to_string()]
            })
        );
        assert!(outcome.report("rice_vs_wheat_yearly").is_some());
    }

    #[test]
    fn filters_by_state_before_grouping() {
        let outcome = outcome();
        let districts = outcome
            .report("west_bengal_rice_districts")
            .expect("district report");
        assert_eq!(districts.rows.len(), 2);
        assert_eq!(districts.rows[0][0], Cell::Text("Burdwan".to_string()));
    }

    #[test]
    fn correlation_uses_positive_pairs_only() {
        let outcome = outcome();
        let report = outcome
            .report("area_production_correlation")
            .expect("correlation report");

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0][1], Cell::Integer(4));
        let correlation = report.rows[0][2].as_number().expect("correlation");
        assert!((correlation - 1.0).abs() < 1e-9);
    }

    #[test]
    fn yield_report_averages_per_state() {
        let outcome = outcome();
        let report = outcome
            .report("rice_wheat_yield_states")
            .expect("yield report");

        assert_eq!(report.rows[0][0], Cell::Text("Punjab".to_string()));
        assert_eq!(report.rows[0][2], Cell::Number(3100.0));
        assert_eq!(report.rows[0][3], Cell::Number(5100.0));
    }

    #[test]
    fn yearly_totals_come_back_in_year_order() {
        let outcome = outcome();
        let report = outcome
            .report("rice_vs_wheat_yearly")
            .expect("yearly report");

        assert_eq!(
            report.headers,
            vec!["year", "rice_production", "wheat_production"]
        );
        assert_eq!(
            report.rows,
            vec![
                vec![Cell::Integer(1990), Cell::Number(12.0), Cell::Number(30.5)],
                vec![Cell::Integer(1991), Cell::Number(8.0), Cell::Number(39.0)],
            ]
        );
    }

    #[test]
    fn equal_totals_rank_by_label() {
        let df = df!(
            "state_name" => ["Punjab", "Assam", "Kerala"],
            "year" => [1990i64, 1990, 1990],
            "rice_production_1000_tons" => [5.0, 5.0, 9.0]
        )
        .expect("frame");
        let columns = ColumnMap::reconcile(&column_names(&df), SynonymRegistry::standard());
        let outcome = run_battery(&df, &columns);

        let states: Vec<&str> = outcome
            .report("top_rice_states")
            .and_then(|report| report.column("state_name"))
            .expect("state column")
            .into_iter()
            .filter_map(Cell::as_text)
            .collect();
        assert_eq!(states, vec!["Kerala", "Assam", "Punjab"]);
    }

    #[test]
    fn pearson_needs_variance() {
        assert_eq!(pearson(&[(1.0, 2.0)]), None);
        assert_eq!(pearson(&[(1.0, 2.0), (1.0, 3.0)]), None);
    }

    #[test]
    fn writes_one_csv_per_report_and_a_summary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outcome = outcome();
        let written = write_battery(&outcome, dir.path()).expect("write battery");

        assert_eq!(written.len(), outcome.produced.len() + 1);
        let rice = fs::read_to_string(dir.path().join("01_top_rice_states.csv")).expect("csv");
        assert!(rice.starts_with("state_name,rice_production\nPunjab,14\n"));

        let summary: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join(BATTERY_SUMMARY_FILE)).expect("summary"),
        )
        .expect("json");
        assert_eq!(
            summary["skipped"][0]["reason"]["kind"],
            serde_json::Value::String("missing_keys".to_string())
        );
    }
}
