use std::path::{Path, PathBuf};

use agridata_core::analysis::{run_battery, write_battery};
use agridata_core::config::AgriConfig;
use agridata_core::observer::TracingObserver;
use agridata_core::warehouse::{self, LoadOptions, LoadSummary};
use agridata_core::{db, CleanedDataset, CleaningPipeline};
use agridata_parser::{read_raw_csv, ColumnMap, SynonymRegistry};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Table};
use polars::prelude::DataFrame;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DATASET_URL: &str =
    "https://dataverse.harvard.edu/dataset.xhtml?persistentId=doi:10.7910/DVN/AFDMSU";

#[derive(Parser, Debug)]
#[command(author, version, about = "District crop statistics ETL", long_about = None)]
struct Cli {
    /// TOML settings file (defaults to ./agridata.toml when present)
    #[arg(long, global = true, env = "AGRIDATA_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean the raw ICRISAT CSV and write the cleaned table plus report
    Clean(CleanArgs),
    /// Load a cleaned CSV into the dimensional warehouse
    Load(LoadArgs),
    /// Write the aggregate report battery for a cleaned CSV
    Analyze(AnalyzeArgs),
    /// Apply the warehouse schema migrations
    Migrate,
    /// Clean, then load the result into the warehouse
    Run(RunArgs),
}

#[derive(Args, Debug, Default)]
struct CleanArgs {
    /// Raw input CSV
    #[arg(long)]
    input: Option<PathBuf>,
    /// Directory for the cleaned CSV and report
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
struct WarehouseArgs {
    /// Rows per INSERT statement
    #[arg(long)]
    batch_size: Option<usize>,
    /// Append instead of truncating the warehouse tables first
    #[arg(long)]
    no_truncate: bool,
    /// Skip running migrations before loading
    #[arg(long)]
    skip_migrations: bool,
}

#[derive(Args, Debug, Default)]
struct LoadArgs {
    /// Cleaned CSV (defaults to the configured output location)
    #[arg(long)]
    cleaned: Option<PathBuf>,
    #[command(flatten)]
    warehouse: WarehouseArgs,
}

#[derive(Args, Debug, Default)]
struct AnalyzeArgs {
    /// Cleaned CSV (defaults to the configured output location)
    #[arg(long)]
    cleaned: Option<PathBuf>,
    /// Directory for the report tables
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    #[command(flatten)]
    clean: CleanArgs,
    #[command(flatten)]
    warehouse: WarehouseArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    dotenvy::dotenv().ok();

    let config = AgriConfig::load(cli.config.as_deref())
        .and_then(AgriConfig::with_env)
        .context("failed to load settings")?;

    match cli.command {
        Command::Clean(args) => {
            let config = apply_clean_args(config, &args);
            let dataset = clean(&config)?;
            print_cleaning_summary(&dataset);
            Ok(())
        }
        Command::Load(args) => {
            let cleaned = args.cleaned.clone().unwrap_or_else(|| config.cleaned_path());
            let table = read_cleaned(&cleaned)?;
            let summary = load(&config, &args.warehouse, table).await?;
            print_load_summary(&summary);
            Ok(())
        }
        Command::Analyze(args) => analyze(&config, &args),
        Command::Migrate => {
            let pool = connect_pool(&config).await?;
            db::run_migrations(&pool).await?;
            info!("database migrations applied");
            Ok(())
        }
        Command::Run(args) => {
            let config = apply_clean_args(config, &args.clean);
            let dataset = clean(&config)?;
            print_cleaning_summary(&dataset);
            let summary = load(&config, &args.warehouse, dataset.table).await?;
            print_load_summary(&summary);
            Ok(())
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn apply_clean_args(mut config: AgriConfig, args: &CleanArgs) -> AgriConfig {
    if let Some(input) = &args.input {
        config.input_path = input.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    config
}

fn clean(config: &AgriConfig) -> Result<CleanedDataset> {
    let observer = TracingObserver;
    let pipeline = CleaningPipeline::new(&observer);

    match pipeline.run(&config.input_path, &config.output_target()) {
        Ok(dataset) => Ok(dataset),
        Err(err) => {
            if let Some(path) = err.missing_source() {
                print_missing_input_guidance(path);
                std::process::exit(1);
            }
            Err(err).context("cleaning pipeline failed")
        }
    }
}

fn read_cleaned(path: &Path) -> Result<DataFrame> {
    let raw = read_raw_csv(path).with_context(|| {
        format!(
            "failed to read cleaned table {}; run `agridata clean` first",
            path.display()
        )
    })?;
    Ok(raw.df)
}

async fn load(config: &AgriConfig, args: &WarehouseArgs, table: DataFrame) -> Result<LoadSummary> {
    let mut options = LoadOptions::from(&config.load);
    if let Some(batch_size) = args.batch_size {
        options.batch_size = batch_size;
    }
    if args.no_truncate {
        options.truncate = false;
    }

    let pool = connect_pool(config).await?;
    if args.skip_migrations {
        warn!("skipping migrations before load");
    } else {
        db::run_migrations(&pool).await?;
    }

    warehouse::project_and_load(&pool, table, options).await
}

fn analyze(config: &AgriConfig, args: &AnalyzeArgs) -> Result<()> {
    let cleaned = args.cleaned.clone().unwrap_or_else(|| config.cleaned_path());
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.analysis.output_dir.clone());

    let table = read_cleaned(&cleaned)?;
    let labels: Vec<String> = table
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let columns = ColumnMap::reconcile(&labels, SynonymRegistry::standard());
    for (column, keys) in columns.conflicts() {
        let keys: Vec<String> = keys.iter().map(|key| key.to_string()).collect();
        warn!(column = %column, keys = %keys.join(", "), "column bound to several semantic keys");
    }

    let outcome = run_battery(&table, &columns);
    write_battery(&outcome, &output_dir)
        .with_context(|| format!("failed to write reports to {}", output_dir.display()))?;

    let mut summary = Table::new();
    summary
        .load_preset(UTF8_FULL)
        .set_header(vec!["#", "report", "status"]);
    let mut rows: Vec<(usize, &str, String)> = outcome
        .produced
        .iter()
        .map(|report| (report.index, report.name, format!("{} rows", report.rows.len())))
        .chain(
            outcome
                .skipped
                .iter()
                .map(|skipped| (skipped.index, skipped.name, format!("skipped: {}", skipped.reason))),
        )
        .collect();
    rows.sort_by_key(|(index, _, _)| *index);
    for (index, name, status) in rows {
        summary.add_row(vec![index.to_string(), name.to_string(), status]);
    }
    println!("{summary}");
    println!("Reports written to {}", output_dir.display());
    Ok(())
}

async fn connect_pool(config: &AgriConfig) -> Result<db::DbPool> {
    db::connect(&config.database)
        .await
        .context("failed to open the warehouse pool")
}

fn print_missing_input_guidance(path: &Path) {
    let rule = "=".repeat(70);
    let folder = path
        .parent()
        .map(|parent| parent.display().to_string())
        .unwrap_or_else(|| ".".to_string());
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "icrisat_district_data.csv".to_string());

    eprintln!("\n{rule}");
    eprintln!("ERROR: data file not found");
    eprintln!("{rule}");
    eprintln!("Looking for: {}", path.display());
    eprintln!("\nTo fix this:");
    eprintln!("1. Download the ICRISAT district level dataset from:");
    eprintln!("   {DATASET_URL}");
    eprintln!("2. Create the folder: {folder}");
    eprintln!("3. Save the CSV file as: {file_name}");
    eprintln!("4. The full path should be: {}", path.display());
    eprintln!("{rule}");
}

fn print_cleaning_summary(dataset: &CleanedDataset) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["metric", "value"]);
    for (key, value) in dataset.report.entries() {
        table.add_row(vec![key.to_string(), value.to_string()]);
    }

    println!("DATA CLEANING SUMMARY");
    println!("{table}");
    println!(
        "Cleaned dataset shape: ({}, {})",
        dataset.table.height(),
        dataset.table.width()
    );
    println!("{}", dataset.table.head(Some(5)));
    if let Some(outputs) = &dataset.outputs {
        println!("Cleaned table: {}", outputs.cleaned_csv.display());
        println!("Report: {}", outputs.report_text.display());
    }
}

fn print_load_summary(summary: &LoadSummary) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["table", "rows"]);
    for (name, rows) in summary.entries() {
        table.add_row(vec![name.to_string(), rows.to_string()]);
    }
    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_accepts_clean_and_warehouse_flags() {
        let cli = Cli::try_parse_from([
            "agridata",
            "run",
            "--input",
            "raw.csv",
            "--batch-size",
            "500",
            "--no-truncate",
        ])
        .expect("valid arguments");

        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.clean.input, Some(PathBuf::from("raw.csv")));
        assert_eq!(args.warehouse.batch_size, Some(500));
        assert!(args.warehouse.no_truncate);
    }

    #[test]
    fn log_format_is_global() {
        let cli = Cli::try_parse_from(["agridata", "migrate", "--log-format", "json"])
            .expect("valid arguments");
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn clean_flags_override_settings() {
        let args = CleanArgs {
            input: Some(PathBuf::from("other.csv")),
            output_dir: None,
        };
        let config = apply_clean_args(AgriConfig::default(), &args);
        assert_eq!(config.input_path, PathBuf::from("other.csv"));
        assert_eq!(config.output_dir, AgriConfig::default().output_dir);
    }
}
