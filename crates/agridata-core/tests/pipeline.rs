use std::fs;
use std::path::{Path, PathBuf};

use agridata_core::missing_values::UNKNOWN;
use agridata_core::observer::{ObserverEvent, RecordingObserver};
use agridata_core::outputs::{OutputTarget, DEFAULT_REPORT_JSON_FILE};
use agridata_core::pipelines::standard_stages;
use agridata_core::record_filters::production_totals;
use agridata_core::{CleaningError, CleaningPipeline};
use agridata_parser::{parse_raw_csv, Crop, Measure, SemanticKey};
use anyhow::Result;
use polars::prelude::*;

fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../agridata-parser/tests/data")
        .join(name)
}

fn files_in(dir: &Path) -> Vec<String> {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn sample_dataset_is_cleaned_and_persisted() -> Result<()> {
    let out = tempfile::tempdir()?;
    let observer = RecordingObserver::new();
    let pipeline = CleaningPipeline::new(&observer);

    let dataset = pipeline.run(&fixture_path("icrisat_sample.csv"), &OutputTarget::new(out.path()))?;
    let report = &dataset.report;

    assert_eq!(report.metrics().original_rows, Some(9));
    assert_eq!(report.metrics().original_columns, Some(13));
    assert_eq!(report.missing_values_handled(), 5);
    assert_eq!(report.duplicates_removed(), 1);
    assert_eq!(report.numeric_values_coerced(), 2);
    assert_eq!(report.invalid_records_removed(), 1);
    assert_eq!(report.final_rows(), 7);
    assert_eq!(report.final_columns(), 15);
    assert_eq!(dataset.table.height(), 7);

    let mut written = files_in(out.path());
    written.sort();
    assert_eq!(
        written,
        vec![
            "agri_data_cleaned.csv".to_string(),
            DEFAULT_REPORT_JSON_FILE.to_string(),
            "cleaning_report.txt".to_string(),
        ]
    );

    let text = fs::read_to_string(out.path().join("cleaning_report.txt"))?;
    assert!(text.starts_with("AgriData Cleaning Report\n=================================================="));
    assert!(text.contains("duplicates_removed: 1\n"));
    assert!(text.contains("invalid_records_removed: 1\n"));
    assert!(text.contains(&format!("source_hash: {}\n", dataset.source.content_hash)));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.path().join(DEFAULT_REPORT_JSON_FILE))?)?;
    assert_eq!(json["final_rows"], serde_json::json!(7));

    let stage_names: Vec<&str> = standard_stages().iter().map(|stage| stage.name()).collect();
    assert_eq!(observer.finished_stages(), stage_names);
    assert_eq!(observer.events().last(), Some(&ObserverEvent::OutputsWritten));
    Ok(())
}

#[test]
fn cleaned_rows_satisfy_output_contract() -> Result<()> {
    let observer = RecordingObserver::new();
    let raw = agridata_parser::read_raw_csv(&fixture_path("icrisat_sample.csv"))?;
    let dataset = CleaningPipeline::new(&observer).run_table(raw)?;
    let table = &dataset.table;

    for name in ["state_name", "district_name"] {
        let column = table.column(name)?.str()?;
        assert_eq!(column.null_count(), 0);
        assert!(column.into_iter().flatten().all(|value| !value.is_empty()));
    }

    for column in table.get_columns() {
        let name = column.name().as_str();
        if name.contains("area") || name.contains("production") || name.contains("yield") {
            assert_eq!(column.dtype(), &DataType::Float64, "{name}");
            assert_eq!(column.null_count(), 0, "{name}");
            assert!(column.f64()?.into_iter().flatten().all(|value| value >= 0.0));
        }
    }

    let years = table.column("year")?.i64()?;
    let decades = table.column("decade")?.i64()?;
    let recent = table.column("is_recent")?.bool()?;
    for ((year, decade), is_recent) in years.into_iter().zip(decades).zip(recent) {
        let (Some(year), Some(decade), Some(is_recent)) = (year, decade, is_recent) else {
            panic!("derived columns must be populated");
        };
        assert_eq!(decade, 10 * year.div_euclid(10));
        assert_eq!(is_recent, year >= 2015);
    }

    let states = table.column("state_name")?.str()?;
    for (state, total) in states.into_iter().zip(production_totals(table)?) {
        assert!(!(state == Some(UNKNOWN) && total == 0.0));
    }

    let codes = table.column("state_code")?.str()?;
    assert!(codes.into_iter().flatten().all(|code| !code.is_empty()));

    let rice = SemanticKey::new(Crop::Rice, Measure::Production);
    assert_eq!(dataset.column_map.get(rice), Some("rice_production_1000_tons"));
    Ok(())
}

#[test]
fn duplicates_merge_after_missing_names_are_filled() -> Result<()> {
    let raw = parse_raw_csv(
        "state_name,district_name,year,rice_production\n,A,1970,100\n,A,1970,100\n",
    )?;
    let observer = RecordingObserver::new();
    let dataset = CleaningPipeline::new(&observer).run_table(raw)?;
    let table = &dataset.table;

    assert_eq!(table.height(), 1);
    assert_eq!(table.column("state_name")?.str()?.get(0), Some(UNKNOWN));
    assert_eq!(table.column("decade")?.i64()?.get(0), Some(1970));
    assert_eq!(table.column("is_recent")?.bool()?.get(0), Some(false));
    assert_eq!(table.column("rice_production")?.f64()?.get(0), Some(100.0));
    assert_eq!(dataset.report.duplicates_removed(), 1);

    let removed_by_dedup = observer.events().into_iter().find_map(|event| match event {
        ObserverEvent::StageFinished {
            stage: "remove_duplicates",
            rows_before,
            rows_after,
        } => Some(rows_before - rows_after),
        _ => None,
    });
    assert_eq!(removed_by_dedup, Some(dataset.report.duplicates_removed()));
    Ok(())
}

#[test]
fn unlocated_rows_without_production_are_dropped() -> Result<()> {
    let raw = parse_raw_csv(
        "state_name,district_name,year,rice_production,wheat_production\n\
         ,B,1980,0,0\n\
         Kerala,C,1980,0,0\n",
    )?;
    let observer = RecordingObserver::new();
    let dataset = CleaningPipeline::new(&observer).run_table(raw)?;

    assert_eq!(dataset.table.height(), 1);
    assert_eq!(
        dataset.table.column("state_name")?.str()?.get(0),
        Some("Kerala")
    );
    assert_eq!(dataset.report.invalid_records_removed(), 1);
    Ok(())
}

#[test]
fn invalid_year_aborts_without_writing_outputs() -> Result<()> {
    let out = tempfile::tempdir()?;
    let target = OutputTarget::new(out.path().join("processed"));
    let observer = RecordingObserver::new();

    let err = CleaningPipeline::new(&observer)
        .run(&fixture_path("invalid_year.csv"), &target)
        .expect_err("non-numeric year must abort");

    assert_eq!(err.stage(), Some("validate_types"));
    match err.root() {
        CleaningError::InvalidYear { record, value } => {
            assert_eq!(*record, 1);
            assert_eq!(value, "abc");
        }
        other => panic!("expected InvalidYear, got {other:?}"),
    }
    assert!(files_in(&target.dir).is_empty());
    assert!(observer
        .events()
        .contains(&ObserverEvent::PipelineFailed { stage: Some("validate_types") }));
    Ok(())
}

#[test]
fn missing_input_names_the_expected_path() {
    let out = tempfile::tempdir().expect("tempdir");
    let missing = out.path().join("icrisat_district_data.csv");
    let observer = RecordingObserver::new();

    let err = CleaningPipeline::new(&observer)
        .run(&missing, &OutputTarget::new(out.path()))
        .expect_err("missing input must fail");

    assert_eq!(err.stage(), Some("load"));
    assert_eq!(err.missing_source(), Some(missing.as_path()));
}

#[test]
fn rerunning_on_cleaned_output_changes_nothing() -> Result<()> {
    let first_out = tempfile::tempdir()?;
    let second_out = tempfile::tempdir()?;
    let observer = RecordingObserver::new();
    let pipeline = CleaningPipeline::new(&observer);

    let first = pipeline.run(
        &fixture_path("icrisat_sample.csv"),
        &OutputTarget::new(first_out.path()),
    )?;
    let cleaned = first.outputs.expect("outputs written").cleaned_csv;

    let second = pipeline.run(&cleaned, &OutputTarget::new(second_out.path()))?;

    assert_eq!(second.report.duplicates_removed(), 0);
    assert_eq!(second.report.invalid_records_removed(), 0);
    assert_eq!(second.report.missing_values_handled(), 0);
    assert_eq!(second.table.height(), first.table.height());
    assert_eq!(second.table.width(), first.table.width());
    Ok(())
}

#[test]
fn blank_numeric_codes_become_placeholder() -> Result<()> {
    let raw = parse_raw_csv(
        "Dist Code,Year,State Code,State Name,Dist Name,RICE PRODUCTION (1000 tons)\n\
         1,1966,14,Bihar,Patna,5\n\
         ,1966,,Assam,Kamrup,3\n",
    )?;
    let observer = RecordingObserver::new();
    let dataset = CleaningPipeline::new(&observer).run_table(raw)?;
    let table = &dataset.table;

    let states: Vec<Option<&str>> = table.column("state_code")?.str()?.into_iter().collect();
    assert_eq!(states, vec![Some("14"), Some(UNKNOWN)]);
    let districts: Vec<Option<&str>> = table.column("district_code")?.str()?.into_iter().collect();
    assert_eq!(districts, vec![Some("1"), Some(UNKNOWN)]);
    assert_eq!(dataset.report.missing_values_handled(), 2);
    Ok(())
}

#[test]
fn blank_year_in_integer_column_becomes_zero() -> Result<()> {
    let raw = parse_raw_csv(
        "Dist Code,Year,State Code,State Name,Dist Name,RICE PRODUCTION (1000 tons)\n\
         1,1966,14,Bihar,Patna,5\n\
         2,,14,Bihar,Gaya,3\n",
    )?;
    let observer = RecordingObserver::new();
    let dataset = CleaningPipeline::new(&observer).run_table(raw)?;
    let table = &dataset.table;

    let years: Vec<Option<i64>> = table.column("year")?.i64()?.into_iter().collect();
    assert_eq!(years, vec![Some(1966), Some(0)]);
    let decades: Vec<Option<i64>> = table.column("decade")?.i64()?.into_iter().collect();
    assert_eq!(decades, vec![Some(1960), Some(0)]);
    Ok(())
}
