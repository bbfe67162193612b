use std::path::Path;

use agridata_parser::{read_raw_csv, ColumnMap, RawTable, SourceMetadata, SynonymRegistry};
use chrono::Local;
use once_cell::sync::Lazy;
use polars::prelude::DataFrame;

use crate::deduplication::RemoveDuplicates;
use crate::derived_columns::AddDerivedColumns;
use crate::error::{CleaningError, Result};
use crate::missing_values::HandleMissingValues;
use crate::observer::PipelineObserver;
use crate::outputs::{self, OutputPaths, OutputTarget};
use crate::record_filters::FilterInvalidRecords;
use crate::report::{CleaningReport, FinalizedReport};
use crate::standardize::StandardizeColumns;
use crate::table::column_names;
use crate::type_validation::ValidateTypes;

pub const LOAD_STAGE: &str = "load";
pub const PERSIST_STAGE: &str = "persist";

/// A table and the report as they leave a stage.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub table: DataFrame,
    pub report: CleaningReport,
}

/// One step of the cleaning pipeline. Stages are total on well-formed
/// tables; only year validation may abort a run.
pub trait CleaningStage: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, table: &DataFrame, report: CleaningReport) -> Result<StageOutput>;
}

static STANDARD_STAGES: Lazy<Vec<&'static dyn CleaningStage>> = Lazy::new(|| {
    vec![
        &StandardizeColumns as &dyn CleaningStage,
        &HandleMissingValues,
        &RemoveDuplicates,
        &ValidateTypes,
        &AddDerivedColumns,
        &FilterInvalidRecords,
    ]
});

/// The stages in their fixed order. Deduplication must see filled defaults
/// and must run before the invalid-record filter sums production.
pub fn standard_stages() -> &'static [&'static dyn CleaningStage] {
    STANDARD_STAGES.as_slice()
}

#[derive(Debug, Clone)]
pub struct CleanedDataset {
    pub table: DataFrame,
    pub report: FinalizedReport,
    pub source: SourceMetadata,
    pub column_map: ColumnMap,
    pub outputs: Option<OutputPaths>,
}

pub struct CleaningPipeline<'o> {
    stages: Vec<&'static dyn CleaningStage>,
    observer: &'o dyn PipelineObserver,
}

impl<'o> CleaningPipeline<'o> {
    pub fn new(observer: &'o dyn PipelineObserver) -> Self {
        Self {
            stages: standard_stages().to_vec(),
            observer,
        }
    }

    pub fn with_stages(
        observer: &'o dyn PipelineObserver,
        stages: Vec<&'static dyn CleaningStage>,
    ) -> Self {
        Self { stages, observer }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Load, clean and persist. Nothing is written unless every stage
    /// succeeds.
    pub fn run(&self, input: &Path, target: &OutputTarget) -> Result<CleanedDataset> {
        let raw = read_raw_csv(input).map_err(|err| self.fail(LOAD_STAGE, err.into()))?;
        let mut dataset = self.run_table(raw)?;

        let paths = outputs::persist(&dataset.table, &dataset.report, target)
            .map_err(|err| self.fail(PERSIST_STAGE, err.into()))?;
        self.observer.outputs_written(&paths);
        dataset.outputs = Some(paths);
        Ok(dataset)
    }

    /// Runs every stage over an already loaded table.
    pub fn run_table(&self, raw: RawTable) -> Result<CleanedDataset> {
        let RawTable { metadata, df } = raw;
        self.observer.pipeline_started(&metadata);

        let mut table = df;
        let mut report = CleaningReport::for_source(&metadata);

        for stage in &self.stages {
            let rows_before = table.height();
            self.observer.stage_started(stage.name(), rows_before);

            let output = stage
                .apply(&table, report)
                .map_err(|err| self.fail(stage.name(), err))?;

            self.observer
                .stage_finished(stage.name(), rows_before, output.table.height(), &output.report);
            table = output.table;
            report = output.report;
        }

        let report = report.finalize(table.height(), table.width(), Local::now().naive_local());
        self.observer.pipeline_finished(&report);

        let column_map = ColumnMap::reconcile(&column_names(&table), SynonymRegistry::standard());

        Ok(CleanedDataset {
            table,
            report,
            source: metadata,
            column_map,
            outputs: None,
        })
    }

    fn fail(&self, stage: &'static str, err: CleaningError) -> CleaningError {
        let err = err.in_stage(stage);
        self.observer.pipeline_failed(err.stage(), &err);
        err
    }
}
