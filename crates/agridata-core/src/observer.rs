use std::sync::Mutex;

use agridata_parser::SourceMetadata;
use tracing::{error, info};

use crate::error::CleaningError;
use crate::outputs::OutputPaths;
use crate::report::{CleaningReport, FinalizedReport};

/// Receives progress from the cleaning pipeline.
///
/// The pipeline has no direct dependency on a log sink; callers decide where
/// these events go. Every method has an empty default.
pub trait PipelineObserver {
    fn pipeline_started(&self, _source: &SourceMetadata) {}

    fn stage_started(&self, _stage: &'static str, _rows: usize) {}

    fn stage_finished(
        &self,
        _stage: &'static str,
        _rows_before: usize,
        _rows_after: usize,
        _report: &CleaningReport,
    ) {
    }

    fn pipeline_finished(&self, _report: &FinalizedReport) {}

    fn outputs_written(&self, _outputs: &OutputPaths) {}

    fn pipeline_failed(&self, _stage: Option<&'static str>, _error: &CleaningError) {}
}

/// Forwards pipeline events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn pipeline_started(&self, source: &SourceMetadata) {
        info!(
            path = ?source.path,
            rows = source.rows,
            columns = source.columns,
            content_hash = %source.content_hash,
            "starting cleaning pipeline"
        );
    }

    fn stage_started(&self, stage: &'static str, rows: usize) {
        info!(stage, rows, "stage started");
    }

    fn stage_finished(
        &self,
        stage: &'static str,
        rows_before: usize,
        rows_after: usize,
        _report: &CleaningReport,
    ) {
        info!(stage, rows_before, rows_after, "stage finished");
    }

    fn pipeline_finished(&self, report: &FinalizedReport) {
        info!(
            final_rows = report.final_rows(),
            final_columns = report.final_columns(),
            duplicates_removed = report.duplicates_removed(),
            invalid_records_removed = report.invalid_records_removed(),
            "data cleaning complete"
        );
    }

    fn outputs_written(&self, outputs: &OutputPaths) {
        info!(
            cleaned = %outputs.cleaned_csv.display(),
            report = %outputs.report_text.display(),
            "cleaned data saved"
        );
    }

    fn pipeline_failed(&self, stage: Option<&'static str>, error: &CleaningError) {
        error!(stage = stage.unwrap_or("unknown"), %error, "cleaning pipeline aborted");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverEvent {
    PipelineStarted { rows: usize },
    StageStarted { stage: &'static str, rows: usize },
    StageFinished {
        stage: &'static str,
        rows_before: usize,
        rows_after: usize,
    },
    PipelineFinished { final_rows: usize },
    OutputsWritten,
    PipelineFailed { stage: Option<&'static str> },
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObserverEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObserverEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Names of the stages that finished, in order.
    pub fn finished_stages(&self) -> Vec<&'static str> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ObserverEvent::StageFinished { stage, .. } => Some(stage),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ObserverEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl PipelineObserver for RecordingObserver {
    fn pipeline_started(&self, source: &SourceMetadata) {
        self.push(ObserverEvent::PipelineStarted { rows: source.rows });
    }

    fn stage_started(&self, stage: &'static str, rows: usize) {
        self.push(ObserverEvent::StageStarted { stage, rows });
    }

    fn stage_finished(
        &self,
        stage: &'static str,
        rows_before: usize,
        rows_after: usize,
        _report: &CleaningReport,
    ) {
        self.push(ObserverEvent::StageFinished {
            stage,
            rows_before,
            rows_after,
        });
    }

    fn pipeline_finished(&self, report: &FinalizedReport) {
        self.push(ObserverEvent::PipelineFinished {
            final_rows: report.final_rows(),
        });
    }

    fn outputs_written(&self, _outputs: &OutputPaths) {
        self.push(ObserverEvent::OutputsWritten);
    }

    fn pipeline_failed(&self, stage: Option<&'static str>, _error: &CleaningError) {
        self.push(ObserverEvent::PipelineFailed { stage });
    }
}
