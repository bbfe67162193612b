use std::collections::HashSet;
use std::path::Path;

use agridata_core::observer::RecordingObserver;
use agridata_core::projector::{measure_keys, project, MEASURES_PER_FACT};
use agridata_core::CleaningPipeline;
use agridata_parser::read_raw_csv;
use anyhow::Result;

fn cleaned_sample() -> Result<agridata_core::CleanedDataset> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../agridata-parser/tests/data/icrisat_sample.csv");
    let observer = RecordingObserver::new();
    Ok(CleaningPipeline::new(&observer).run_table(read_raw_csv(&path)?)?)
}

#[test]
fn cleaned_sample_projects_into_dimensions() -> Result<()> {
    let dataset = cleaned_sample()?;
    let model = project(&dataset.table)?;

    let states: Vec<(&str, &str)> = model
        .states
        .iter()
        .map(|state| (state.state_code.as_str(), state.state_name.as_str()))
        .collect();
    assert_eq!(
        states,
        vec![
            ("14", "Chhattisgarh"),
            ("9", "Uttar Pradesh"),
            ("16", "UNKNOWN"),
            ("11", "West Bengal"),
        ]
    );
    assert_eq!(model.districts.len(), 5);
    assert_eq!(model.years.len(), 6);
    assert_eq!(model.facts.len(), dataset.table.height());
    Ok(())
}

#[test]
fn every_fact_references_known_dimensions() -> Result<()> {
    let model = project(&cleaned_sample()?.table)?;

    let district_ids: HashSet<i64> = model.districts.iter().map(|d| d.district_id).collect();
    let year_ids: HashSet<i64> = model.years.iter().map(|y| y.year_id).collect();
    let state_ids: HashSet<i64> = model.states.iter().map(|s| s.state_id).collect();

    for fact in &model.facts {
        assert!(district_ids.contains(&fact.district_id));
        assert!(year_ids.contains(&fact.year_id));
        assert_eq!(fact.measures.len(), MEASURES_PER_FACT);
    }
    for district in &model.districts {
        assert!(state_ids.contains(&district.state_id));
    }

    for year in &model.years {
        assert_eq!(year.decade, 10 * year.year_id.div_euclid(10));
        assert_eq!(year.is_recent, year.year_id >= 2015);
    }
    Ok(())
}

#[test]
fn measures_follow_the_warehouse_layout() -> Result<()> {
    let model = project(&cleaned_sample()?.table)?;
    let names: Vec<String> = measure_keys().iter().map(|key| key.to_string()).collect();
    let position = |name: &str| names.iter().position(|candidate| candidate == name);

    let rice_production = position("rice_production").expect("rice column");
    let oilseeds_production = position("oilseeds_production").expect("oilseeds column");
    let maize_area = position("maize_area").expect("maize column");

    let first = &model.facts[0];
    assert_eq!(first.measures[rice_production], Some(185.0));
    assert_eq!(first.measures[oilseeds_production], Some(5.0));
    assert_eq!(first.measures[maize_area], None);
    Ok(())
}
