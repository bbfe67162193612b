use std::fmt;

use agridata_parser::SourceMetadata;
use chrono::NaiveDateTime;
use serde::Serialize;

pub const REPORT_BANNER: &str = "AgriData Cleaning Report";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Metrics accumulated while the cleaning stages run.
///
/// Stages never mutate a shared report: each one takes the report by value
/// and hands back an updated copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_columns: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_values_handled: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicates_removed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_values_coerced: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_records_removed: Option<usize>,
}

impl CleaningReport {
    pub fn for_source(source: &SourceMetadata) -> Self {
        Self {
            source_hash: Some(source.content_hash.clone()),
            original_rows: Some(source.rows),
            original_columns: Some(source.columns),
            ..Self::default()
        }
    }

    pub fn with_missing_values_handled(self, count: usize) -> Self {
        Self {
            missing_values_handled: Some(count),
            ..self
        }
    }

    pub fn with_duplicates_removed(self, count: usize) -> Self {
        Self {
            duplicates_removed: Some(count),
            ..self
        }
    }

    pub fn with_numeric_values_coerced(self, count: usize) -> Self {
        Self {
            numeric_values_coerced: Some(count),
            ..self
        }
    }

    pub fn with_invalid_records_removed(self, count: usize) -> Self {
        Self {
            invalid_records_removed: Some(count),
            ..self
        }
    }

    /// Snapshots the final shape and completion time. The returned report
    /// has no mutators.
    pub fn finalize(
        self,
        final_rows: usize,
        final_columns: usize,
        completed_at: NaiveDateTime,
    ) -> FinalizedReport {
        FinalizedReport {
            metrics: self,
            final_rows,
            final_columns,
            cleaning_timestamp: completed_at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    fn metric_entries(&self) -> Vec<(&'static str, ReportValue)> {
        let counts = [
            ("original_rows", self.original_rows),
            ("original_columns", self.original_columns),
            ("missing_values_handled", self.missing_values_handled),
            ("duplicates_removed", self.duplicates_removed),
            ("numeric_values_coerced", self.numeric_values_coerced),
            ("invalid_records_removed", self.invalid_records_removed),
        ];

        let mut entries = Vec::with_capacity(counts.len() + 1);
        if let Some(hash) = &self.source_hash {
            entries.push(("source_hash", ReportValue::Text(hash.clone())));
        }
        entries.extend(
            counts
                .into_iter()
                .filter_map(|(key, value)| value.map(|count| (key, ReportValue::Count(count)))),
        );
        entries
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportValue {
    Count(usize),
    Text(String),
}

impl fmt::Display for ReportValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportValue::Count(count) => write!(f, "{count}"),
            ReportValue::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizedReport {
    #[serde(flatten)]
    metrics: CleaningReport,
    final_rows: usize,
    final_columns: usize,
    cleaning_timestamp: String,
}

impl FinalizedReport {
    pub fn metrics(&self) -> &CleaningReport {
        &self.metrics
    }

    pub fn final_rows(&self) -> usize {
        self.final_rows
    }

    pub fn final_columns(&self) -> usize {
        self.final_columns
    }

    pub fn cleaning_timestamp(&self) -> &str {
        &self.cleaning_timestamp
    }

    pub fn duplicates_removed(&self) -> usize {
        self.metrics.duplicates_removed.unwrap_or(0)
    }

    pub fn invalid_records_removed(&self) -> usize {
        self.metrics.invalid_records_removed.unwrap_or(0)
    }

    pub fn missing_values_handled(&self) -> usize {
        self.metrics.missing_values_handled.unwrap_or(0)
    }

    pub fn numeric_values_coerced(&self) -> usize {
        self.metrics.numeric_values_coerced.unwrap_or(0)
    }

    /// Every recorded metric in report order.
    pub fn entries(&self) -> Vec<(&'static str, ReportValue)> {
        let mut entries = self.metrics.metric_entries();
        entries.push(("final_rows", ReportValue::Count(self.final_rows)));
        entries.push(("final_columns", ReportValue::Count(self.final_columns)));
        entries.push((
            "cleaning_timestamp",
            ReportValue::Text(self.cleaning_timestamp.clone()),
        ));
        entries
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(REPORT_BANNER);
        out.push('\n');
        out.push_str(&"=".repeat(50));
        out.push_str("\n\n");
        for (key, value) in self.entries() {
            out.push_str(&format!("{key}: {value}\n"));
        }
        out
    }
}
