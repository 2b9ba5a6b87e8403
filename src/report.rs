//! Persisted metric reports.
//!
//! A report accumulates [`RunResult`]s across invocations, keyed by build
//! identity:
//!
//! ```json
//! { "title": "taskjs", "data": { "2012-04-10": [ { "uniqueframes": 41, "fps": 13.6 } ] } }
//! ```
//!
//! Merging always appends; running the same test twice doubles the runs
//! stored under its key. Writes go through a temporary file in the target
//! directory followed by a rename, under an exclusive `<report>.lock` file,
//! so readers never observe a half-written report and concurrent writers
//! fail instead of losing each other's runs.

use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::{BufWriter, ErrorKind as IoErrorKind, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::error::CaptureError;

/// Outputs of one run of a metric test.
///
/// Which fields are present depends on what the run measured: steady-state
/// runs carry unique frames, fps and checkerboard; startup runs carry the
/// stable frame instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Capture archive the metrics were computed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(rename = "uniqueframes", default, skip_serializing_if = "Option::is_none")]
    pub unique_frames: Option<u64>,
    #[serde(rename = "processedframes", default, skip_serializing_if = "Option::is_none")]
    pub processed_frames: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    /// Checkerboard area-duration (a sum of percentages, not a percentage).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkerboard: Option<f64>,
    #[serde(rename = "stableframe", default, skip_serializing_if = "Option::is_none")]
    pub stable_frame: Option<usize>,
    /// Stable frame offset in seconds.
    #[serde(rename = "stableframe_time", default, skip_serializing_if = "Option::is_none")]
    pub stable_frame_time: Option<f64>,
    /// Copied movie, relative to the output directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<PathBuf>,
    /// Renderer-reported checkerboard (a sum of percentages).
    #[serde(rename = "internalcheckerboard", default, skip_serializing_if = "Option::is_none")]
    pub internal_checkerboard: Option<f64>,
    /// Fields written by other tools, kept on rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A keyed collection of runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    #[serde(default)]
    pub data: BTreeMap<String, Vec<RunResult>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Report {
    /// Empty report titled `title`.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            data: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    /// Runs stored under `key`, oldest first.
    pub fn runs(&self, key: &str) -> &[RunResult] {
        self.data.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Append runs under `key`, creating the list if needed.
    pub fn append(&mut self, key: impl Into<String>, runs: impl IntoIterator<Item = RunResult>) {
        self.data.entry(key.into()).or_default().extend(runs);
    }

    /// Load a report, or `None` when no file exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Report`] if the file exists but is not a
    /// report.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>, CaptureError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Ok(None);
        }

        let contents = fs::read(path)?;
        serde_json::from_slice(&contents)
            .map(Some)
            .map_err(|error| CaptureError::Report {
                path: path.to_path_buf(),
                reason: error.to_string(),
            })
    }

    /// Write the report, replacing `path` atomically.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CaptureError> {
        let path = path.as_ref();
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temporary = NamedTempFile::new_in(directory)?;
        {
            let mut writer = BufWriter::new(temporary.as_file_mut());
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }
        temporary.as_file().sync_all()?;
        temporary.persist(path).map_err(|error| error.error)?;

        log::debug!("Wrote report {}", path.display());
        Ok(())
    }
}

/// Combine new runs with an existing report.
///
/// An existing report keeps its own title; otherwise a new report titled
/// `title` is started.
pub fn merge(
    existing: Option<Report>,
    title: &str,
    key: &str,
    runs: impl IntoIterator<Item = RunResult>,
) -> Report {
    let mut report = existing.unwrap_or_else(|| Report::new(title));
    report.append(key, runs);
    report
}

/// Load, merge and rewrite the report at `path` under an exclusive lock.
///
/// # Errors
///
/// Returns [`CaptureError::ReportLocked`] when another invocation holds the
/// lock, [`CaptureError::Report`] when the existing file is unreadable.
pub fn append_runs<P: AsRef<Path>>(
    path: P,
    title: &str,
    key: &str,
    runs: Vec<RunResult>,
) -> Result<Report, CaptureError> {
    let path = path.as_ref();
    let _lock = ReportLock::acquire(path)?;

    let added = runs.len();
    let report = merge(Report::load(path)?, title, key, runs);
    report.save(path)?;

    log::info!(
        "Appended {} run(s) under {:?} in {} ({} total)",
        added,
        key,
        path.display(),
        report.runs(key).len()
    );
    Ok(report)
}

/// Exclusive lock on a report file, released on drop.
///
/// The lock is a `<report>.lock` file next to the report holding the
/// owner's process id. A process killed while holding it leaves the file
/// behind, and every later append fails with
/// [`CaptureError::ReportLocked`]. Once [`holder`](Self::holder) names a
/// process that is no longer running, delete the `.lock` file by hand.
#[derive(Debug)]
pub struct ReportLock {
    lock_path: PathBuf,
}

impl ReportLock {
    /// Take the lock for `report_path`.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::ReportLocked`] if the lock file exists.
    pub fn acquire(report_path: &Path) -> Result<Self, CaptureError> {
        let lock_path = lock_path_for(report_path);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                Ok(Self { lock_path })
            }
            Err(error) if error.kind() == IoErrorKind::AlreadyExists => {
                Err(CaptureError::ReportLocked {
                    path: report_path.to_path_buf(),
                })
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Process id recorded in the lock for `report_path`, if it is held.
    pub fn holder(report_path: &Path) -> Option<u32> {
        fs::read_to_string(lock_path_for(report_path))
            .ok()?
            .trim()
            .parse()
            .ok()
    }

    /// Path of the lock file guarding `report_path`.
    pub fn lock_path(report_path: &Path) -> PathBuf {
        lock_path_for(report_path)
    }
}

impl Drop for ReportLock {
    fn drop(&mut self) {
        if let Err(error) = fs::remove_file(&self.lock_path) {
            log::warn!(
                "Could not remove report lock {}: {error}",
                self.lock_path.display()
            );
        }
    }
}

fn lock_path_for(report_path: &Path) -> PathBuf {
    let name = report_path
        .file_name()
        .map(|name| format!("{}.lock", name.to_string_lossy()))
        .unwrap_or_else(|| "report.lock".to_string());
    report_path.with_file_name(name)
}
