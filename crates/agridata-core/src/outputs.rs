use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use thiserror::Error;

use crate::report::FinalizedReport;

pub const DEFAULT_CLEANED_FILE: &str = "agri_data_cleaned.csv";
pub const DEFAULT_REPORT_FILE: &str = "cleaning_report.txt";
pub const DEFAULT_REPORT_JSON_FILE: &str = "cleaning_report.json";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode cleaned table: {0}")]
    Polars(#[from] PolarsError),

    #[error("failed to encode report JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to encode report table: {0}")]
    Csv(#[from] csv::Error),
}

/// Where the cleaned table and its report are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub dir: PathBuf,
    pub cleaned_file_name: String,
    pub report_file_name: String,
}

impl OutputTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cleaned_file_name: DEFAULT_CLEANED_FILE.to_string(),
            report_file_name: DEFAULT_REPORT_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub cleaned_csv: PathBuf,
    pub report_text: PathBuf,
    pub report_json: PathBuf,
}

/// Writes the cleaned CSV, the plain-text report and its JSON twin.
///
/// All three files are staged under hidden sibling names first and renamed
/// into place only once every write has succeeded, so a failed write leaves
/// neither a truncated file nor a cleaned table without its report.
pub fn persist(
    table: &DataFrame,
    report: &FinalizedReport,
    target: &OutputTarget,
) -> Result<OutputPaths, OutputError> {
    fs::create_dir_all(&target.dir).map_err(|source| OutputError::Io {
        path: target.dir.clone(),
        source,
    })?;

    let paths = OutputPaths {
        cleaned_csv: target.dir.join(&target.cleaned_file_name),
        report_text: target.dir.join(&target.report_file_name),
        report_json: target.dir.join(DEFAULT_REPORT_JSON_FILE),
    };

    let mut staged = Vec::with_capacity(3);
    if let Err(err) = stage_outputs(&mut staged, table, report, &paths) {
        discard(&staged);
        return Err(err);
    }
    commit(staged)?;

    Ok(paths)
}

fn stage_outputs(
    staged: &mut Vec<StagedFile>,
    table: &DataFrame,
    report: &FinalizedReport,
    paths: &OutputPaths,
) -> Result<(), OutputError> {
    staged.push(stage(&paths.cleaned_csv, |writer| {
        let mut df = table.clone();
        CsvWriter::new(writer).include_header(true).finish(&mut df)?;
        Ok(())
    })?);

    staged.push(stage(&paths.report_text, |writer| {
        writer
            .write_all(report.render_text().as_bytes())
            .map_err(|source| OutputError::Io {
                path: paths.report_text.clone(),
                source,
            })
    })?);

    staged.push(stage(&paths.report_json, |writer| {
        serde_json::to_writer_pretty(writer, report)?;
        Ok(())
    })?);

    Ok(())
}

/// A fully written file waiting to be renamed onto its final path.
#[derive(Debug)]
struct StagedFile {
    staging: PathBuf,
    target: PathBuf,
}

/// Writes one file through a staging sibling and renames it into place.
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> Result<(), OutputError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), OutputError>,
{
    commit(vec![stage(path, write)?])
}

fn stage<F>(path: &Path, write: F) -> Result<StagedFile, OutputError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), OutputError>,
{
    let staging = staging_path(path);
    let io_error = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };

    let result = File::create(&staging).map_err(io_error).and_then(|file| {
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        writer.flush().map_err(io_error)
    });

    match result {
        Ok(()) => Ok(StagedFile {
            staging,
            target: path.to_path_buf(),
        }),
        Err(err) => {
            let _ = fs::remove_file(&staging);
            Err(err)
        }
    }
}

fn commit(staged: Vec<StagedFile>) -> Result<(), OutputError> {
    for (position, file) in staged.iter().enumerate() {
        if let Err(source) = fs::rename(&file.staging, &file.target) {
            discard(&staged[position..]);
            return Err(OutputError::Io {
                path: file.target.clone(),
                source,
            });
        }
    }
    Ok(())
}

fn discard(staged: &[StagedFile]) {
    for file in staged {
        let _ = fs::remove_file(&file.staging);
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{file_name}.partial"))
}
