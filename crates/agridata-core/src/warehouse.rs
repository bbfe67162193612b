#![cfg(feature = "runtime")]

use anyhow::{bail, Context, Result};
use polars::prelude::DataFrame;
use serde::Serialize;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tokio::task;
use tracing::{debug, info};

use crate::config::LoadConfig;
use crate::db::DbPool;
use crate::projector::{
    self, measure_keys, DimensionalModel, DistrictRow, FactRow, StateRow, YearRow, MEASURES_PER_FACT,
};

/// Postgres rejects statements with more bind parameters than this.
pub const MAX_BIND_PARAMETERS: usize = 65_535;

const TABLES: [&str; 4] = ["dim_state", "dim_district", "dim_year", "fact_production"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub batch_size: usize,
    pub truncate: bool,
}

impl From<&LoadConfig> for LoadOptions {
    fn from(config: &LoadConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            truncate: config.truncate,
        }
    }
}

/// Row counts read back from the warehouse after a load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub states: i64,
    pub districts: i64,
    pub years: i64,
    pub facts: i64,
}

impl LoadSummary {
    pub fn entries(&self) -> [(&'static str, i64); 4] {
        [
            (TABLES[0], self.states),
            (TABLES[1], self.districts),
            (TABLES[2], self.years),
            (TABLES[3], self.facts),
        ]
    }
}

/// Rows per INSERT: the configured batch, capped so a statement stays under
/// the bind-parameter limit.
pub fn rows_per_chunk(batch_size: usize, binds_per_row: usize) -> usize {
    let cap = MAX_BIND_PARAMETERS / binds_per_row.max(1);
    batch_size.clamp(1, cap.max(1))
}

/// Projects a cleaned table off the async runtime, then loads it.
pub async fn project_and_load(
    pool: &DbPool,
    table: DataFrame,
    options: LoadOptions,
) -> Result<LoadSummary> {
    let model = task::spawn_blocking(move || projector::project(&table))
        .await
        .context("projection task panicked")?
        .context("failed to project cleaned table")?;
    info!(
        states = model.states.len(),
        districts = model.districts.len(),
        years = model.years.len(),
        facts = model.facts.len(),
        "dimensional model projected"
    );
    load_model(pool, &model, options).await
}

/// Loads dimensions then facts in one transaction and verifies the table
/// counts against the model.
pub async fn load_model(
    pool: &DbPool,
    model: &DimensionalModel,
    options: LoadOptions,
) -> Result<LoadSummary> {
    let mut tx = pool.begin().await.context("failed to open load transaction")?;

    if options.truncate {
        sqlx::query(
            "TRUNCATE TABLE fact_production, dim_district, dim_year, dim_state RESTART IDENTITY CASCADE",
        )
        .execute(&mut *tx)
        .await
        .context("failed to truncate warehouse tables")?;
        info!("warehouse tables truncated");
    }

    insert_chunked(&mut tx, "dim_state", &model.states, 3, options, state_insert).await?;
    insert_chunked(&mut tx, "dim_district", &model.districts, 4, options, district_insert).await?;
    insert_chunked(&mut tx, "dim_year", &model.years, 3, options, year_insert).await?;
    insert_chunked(
        &mut tx,
        "fact_production",
        &model.facts,
        3 + MEASURES_PER_FACT,
        options,
        fact_insert,
    )
    .await?;

    let summary = count_rows(&mut tx).await?;
    let expected = [
        model.states.len(),
        model.districts.len(),
        model.years.len(),
        model.facts.len(),
    ];
    for ((table, loaded), expected) in summary.entries().into_iter().zip(expected) {
        if loaded != expected as i64 {
            bail!("{table} holds {loaded} rows after load, expected {expected}");
        }
    }

    tx.commit().await.context("failed to commit warehouse load")?;
    info!(
        states = summary.states,
        districts = summary.districts,
        years = summary.years,
        facts = summary.facts,
        "warehouse load verified"
    );
    Ok(summary)
}

/// Current row count of every warehouse table.
pub async fn verify_counts(pool: &DbPool) -> Result<LoadSummary> {
    let mut conn = pool.acquire().await.context("failed to acquire connection")?;
    count_rows(&mut conn).await
}

async fn count_rows(conn: &mut PgConnection) -> Result<LoadSummary> {
    let mut counts = [0i64; 4];
    for (count, table) in counts.iter_mut().zip(TABLES) {
        *count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&mut *conn)
            .await
            .with_context(|| format!("failed to count rows in {table}"))?;
    }
    let [states, districts, years, facts] = counts;
    Ok(LoadSummary {
        states,
        districts,
        years,
        facts,
    })
}

async fn insert_chunked<'r, R>(
    conn: &mut PgConnection,
    table: &'static str,
    rows: &'r [R],
    binds_per_row: usize,
    options: LoadOptions,
    build: fn(&'r [R]) -> QueryBuilder<'r, Postgres>,
) -> Result<()> {
    let chunk_size = rows_per_chunk(options.batch_size, binds_per_row);
    let mut inserted = 0usize;

    for chunk in rows.chunks(chunk_size) {
        build(chunk)
            .build()
            .execute(&mut *conn)
            .await
            .with_context(|| format!("failed to insert into {table}"))?;
        inserted += chunk.len();
        debug!(table, inserted, total = rows.len(), "chunk inserted");
    }

    info!(table, rows = inserted, chunk_size, "table loaded");
    Ok(())
}

fn state_insert(rows: &[StateRow]) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new("INSERT INTO dim_state (state_id, state_code, state_name) ");
    builder.push_values(rows, |mut row_builder, row| {
        row_builder
            .push_bind(row.state_id)
            .push_bind(row.state_code.as_str())
            .push_bind(row.state_name.as_str());
    });
    builder
}

fn district_insert(rows: &[DistrictRow]) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new(
        "INSERT INTO dim_district (district_id, district_code, district_name, state_id) ",
    );
    builder.push_values(rows, |mut row_builder, row| {
        row_builder
            .push_bind(row.district_id)
            .push_bind(row.district_code.as_str())
            .push_bind(row.district_name.as_str())
            .push_bind(row.state_id);
    });
    builder
}

fn year_insert(rows: &[YearRow]) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new("INSERT INTO dim_year (year_id, decade, is_recent) ");
    builder.push_values(rows, |mut row_builder, row| {
        row_builder
            .push_bind(row.year_id)
            .push_bind(row.decade)
            .push_bind(row.is_recent);
    });
    builder
}

fn fact_insert(rows: &[FactRow]) -> QueryBuilder<'_, Postgres> {
    let measure_columns = measure_keys()
        .iter()
        .map(|key| key.canonical_name())
        .collect::<Vec<_>>()
        .join(", ");
    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO fact_production (production_id, district_id, year_id, {measure_columns}) "
    ));
    builder.push_values(rows, |mut row_builder, row| {
        row_builder
            .push_bind(row.production_id)
            .push_bind(row.district_id)
            .push_bind(row.year_id);
        for value in &row.measures {
            row_builder.push_bind(*value);
        }
    });
    builder
}
