//! Sequential metric-test driver.
//!
//! The driver owns none of the device plumbing: killing and installing
//! apps, running the browser test while recording, and fetching nightly
//! builds are delegated to the [`DeviceController`], [`TestRunner`] and
//! [`BuildRetriever`] collaborators. What it does own is the run loop.
//! Each run's reset, capture, analysis and result collection finishes
//! before the next begins, and the collected runs are appended to the
//! report once per build.
//!
//! # Example
//!
//! ```no_run
//! use videocapture::{CaptureError, MetricTest, MetricTestConfig, RunRequest, TestRunner};
//!
//! struct Recorder;
//!
//! impl TestRunner for Recorder {
//!     fn run_test(&mut self, request: &RunRequest<'_>) -> Result<(), CaptureError> {
//!         // Drive the browser and write a capture archive to request.capture_file.
//!         Ok(())
//!     }
//! }
//!
//! let config = MetricTestConfig::builder("src/tests/ep1/taskjs")
//!     .apps(["org.mozilla.fennec"])
//!     .num_runs(5)
//!     .output_dir("results")
//!     .build()?;
//! let mut test = MetricTest::new(config, Box::new(Recorder));
//! for target in test.run_all()? {
//!     println!("{}: {} runs", target.display_key, target.runs.len());
//! }
//! # Ok::<(), CaptureError>(())
//! ```

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::{Local, NaiveDate, Utc};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::{
    analysis::{AnalysisMode, analyze_capture},
    archive::CaptureArchive,
    checkerboard_log::CheckerboardLogParser,
    configuration::{AnalysisOptions, MetricTestConfig, TestTargets},
    error::CaptureError,
    report::{RunResult, append_runs},
};

/// Identity of an installed build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    /// Package name, e.g. `org.mozilla.fennec`.
    pub appname: String,
    pub version: Option<String>,
    /// Source revision the build was made from.
    pub revision: Option<String>,
}

/// Device-side process and package control.
pub trait DeviceController {
    /// Stop any running instance of `appname`.
    fn kill_app(&mut self, appname: &str) -> Result<(), CaptureError>;

    /// Install (or update) a package and report what it contains.
    fn install_package(&mut self, package: &Path) -> Result<AppInfo, CaptureError>;
}

/// Everything a [`TestRunner`] needs for one run.
#[derive(Debug, Clone)]
pub struct RunRequest<'a> {
    pub test_name: &'a str,
    pub appname: &'a str,
    /// Human-readable capture title.
    pub capture_name: String,
    pub url_params: &'a str,
    pub extra_prefs: &'a Map<String, Value>,
    pub extra_env_vars: &'a BTreeMap<String, String>,
    /// Where the renderer's checkerboard log should be written.
    pub checkerboard_log: Option<&'a Path>,
    /// Where a profile should be written.
    pub profile_file: Option<&'a Path>,
    /// Run without recording.
    pub no_capture: bool,
    /// Where the capture archive must be written.
    pub capture_file: &'a Path,
}

/// Runs one test in the browser and records the capture.
pub trait TestRunner {
    fn run_test(&mut self, request: &RunRequest<'_>) -> Result<(), CaptureError>;
}

/// Fetches nightly builds by date.
pub trait BuildRetriever {
    /// Download the build for `date` and return the package path.
    fn get_build(&mut self, date: NaiveDate) -> Result<PathBuf, CaptureError>;
}

/// One build to test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestTarget {
    App(String),
    Apk(PathBuf),
    Date(NaiveDate),
}

impl TestTarget {
    /// Expand configured targets in order.
    pub fn from_targets(targets: &TestTargets) -> Vec<TestTarget> {
        match targets {
            TestTargets::AppNames(names) => names.iter().cloned().map(TestTarget::App).collect(),
            TestTargets::Apks(apks) => apks.iter().cloned().map(TestTarget::Apk).collect(),
            TestTargets::Dates(dates) => dates.iter().copied().map(TestTarget::Date).collect(),
        }
    }
}

/// Runs collected for one build.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetResults {
    /// Report key: the build date, or the app name.
    pub key: String,
    /// Key plus revision, for display.
    pub display_key: String,
    pub runs: Vec<RunResult>,
}

/// Drives a configured metric test.
pub struct MetricTest {
    config: MetricTestConfig,
    runner: Box<dyn TestRunner>,
    device: Option<Box<dyn DeviceController>>,
    builds: Option<Box<dyn BuildRetriever>>,
    options: AnalysisOptions,
    log_parser: CheckerboardLogParser,
    report_path: Option<PathBuf>,
}

impl MetricTest {
    /// The report file, if any, is named once per test so every build's
    /// runs land in the same file.
    pub fn new(config: MetricTestConfig, runner: Box<dyn TestRunner>) -> Self {
        let report_path = config
            .output_dir
            .as_ref()
            .map(|dir| dir.join(format!("metric-test-{}.json", Utc::now().timestamp_millis())));

        Self {
            config,
            runner,
            device: None,
            builds: None,
            options: AnalysisOptions::default(),
            log_parser: CheckerboardLogParser::new(),
            report_path,
        }
    }

    #[must_use]
    pub fn with_device(mut self, device: Box<dyn DeviceController>) -> Self {
        self.device = Some(device);
        self
    }

    #[must_use]
    pub fn with_build_retriever(mut self, builds: Box<dyn BuildRetriever>) -> Self {
        self.builds = Some(builds);
        self
    }

    #[must_use]
    pub fn with_analysis_options(mut self, options: AnalysisOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_log_parser(mut self, parser: CheckerboardLogParser) -> Self {
        self.log_parser = parser;
        self
    }

    /// Use an explicit report path instead of a timestamped one.
    #[must_use]
    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    pub fn config(&self) -> &MetricTestConfig {
        &self.config
    }

    pub fn report_path(&self) -> Option<&Path> {
        self.report_path.as_deref()
    }

    /// Test every configured build in order. The first failure stops the
    /// whole test.
    pub fn run_all(&mut self) -> Result<Vec<TargetResults>, CaptureError> {
        TestTarget::from_targets(&self.config.targets)
            .iter()
            .map(|target| self.run_target(target))
            .collect()
    }

    /// Run every configured repetition against one build, then append the
    /// results to the report.
    pub fn run_target(&mut self, target: &TestTarget) -> Result<TargetResults, CaptureError> {
        let (appname, appinfo, appdate) = match target {
            TestTarget::App(name) => (name.clone(), None, None),
            TestTarget::Apk(package) => {
                let info = self.install(package)?;
                (info.appname.clone(), Some(info), None)
            }
            TestTarget::Date(date) => {
                let builds = self.builds.as_mut().ok_or_else(|| {
                    CaptureError::Collaborator(
                        "testing nightly builds requires a build retriever".to_string(),
                    )
                })?;
                let package = builds.get_build(*date)?;
                let info = self.install(&package)?;
                (info.appname.clone(), Some(info), Some(*date))
            }
        };

        let mut runs = Vec::with_capacity(self.config.num_runs as usize);
        for run in 0..self.config.num_runs {
            log::info!(
                "Run {}/{} of {} for {}",
                run + 1,
                self.config.num_runs,
                self.config.test_name,
                appname
            );
            runs.push(self.run_once(&appname)?);
        }

        let key = match appdate {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => appname.clone(),
        };
        let display_key = match appinfo.as_ref().and_then(|info| info.revision.as_deref()) {
            Some(revision) => format!("{key} ({revision})"),
            None => key.clone(),
        };
        self.log_summary(&display_key, &runs);

        if let Some(report_path) = &self.report_path {
            append_runs(report_path, &self.config.test_name, &key, runs.clone())?;
        }

        Ok(TargetResults {
            key,
            display_key,
            runs,
        })
    }

    fn install(&mut self, package: &Path) -> Result<AppInfo, CaptureError> {
        let device = self.device.as_mut().ok_or_else(|| {
            CaptureError::Collaborator("installing packages requires a device controller".to_string())
        })?;
        let info = device.install_package(package)?;
        log::info!(
            "Installed {} (version: {}, revision {})",
            info.appname,
            info.version.as_deref().unwrap_or("unknown"),
            info.revision.as_deref().unwrap_or("unknown")
        );
        Ok(info)
    }

    fn run_once(&mut self, appname: &str) -> Result<RunResult, CaptureError> {
        if let Some(device) = self.device.as_mut() {
            device.kill_app(appname)?;
        }

        let stamp = Utc::now().timestamp_millis();
        let capture_file = self
            .config
            .capture_dir
            .join(format!("metric-test-{appname}-{stamp}.zip"));
        let profile_file = self
            .config
            .enable_profiling
            .then(|| self.config.profile_dir.join(format!("profile-{appname}-{stamp}.zip")));

        // Removed when dropped, whichever way this run ends.
        let checkerboard_log = if self.config.internal_checkerboard {
            Some(NamedTempFile::new()?)
        } else {
            None
        };

        let request = RunRequest {
            test_name: &self.config.test_name,
            appname,
            capture_name: format!(
                "{} - {} (taken on {})",
                self.config.test_name,
                appname,
                Local::now().format("%Y-%m-%d")
            ),
            url_params: &self.config.url_params,
            extra_prefs: &self.config.extra_prefs,
            extra_env_vars: &self.config.extra_env_vars,
            checkerboard_log: checkerboard_log.as_ref().map(|file| file.path()),
            profile_file: profile_file.as_deref(),
            no_capture: self.config.no_capture,
            capture_file: &capture_file,
        };
        self.runner.run_test(&request)?;

        let mut result = RunResult::default();
        if !self.config.no_capture {
            let capture = CaptureArchive::open_with_options(&capture_file, &self.options)?;
            let mode = if self.config.startup_test {
                AnalysisMode::Startup
            } else {
                AnalysisMode::SteadyState
            };
            analyze_capture(&capture, mode, &self.options)?.apply_to(&mut result);
            result.file = Some(capture_file.clone());

            if let Some(output_dir) = &self.config.output_dir {
                result.video = export_video(&capture, output_dir)?;
            }
        }

        result.profile = profile_file;

        if let Some(log) = &checkerboard_log {
            result.internal_checkerboard = Some(self.log_parser.parse_file(log.path())?);
        }

        Ok(result)
    }

    fn log_summary(&self, display_key: &str, runs: &[RunResult]) {
        log::info!("=== Results for {display_key} ===");

        if !self.config.no_capture {
            if self.config.startup_test {
                log::info!(
                    "  First stable frames: {:?}",
                    collect(runs, |run| run.stable_frame)
                );
            } else {
                log::info!(
                    "  Number of unique frames: {:?}",
                    collect(runs, |run| run.unique_frames)
                );
                log::info!(
                    "  Average number of unique frames per second: {:?}",
                    collect(runs, |run| run.fps)
                );
                log::info!(
                    "  Checkerboard area/duration (sum of percents NOT percentage): {:?}",
                    collect(runs, |run| run.checkerboard)
                );
            }
            log::info!(
                "  Capture files: {:?}",
                collect(runs, |run| run.file.clone())
            );
        }

        if self.config.enable_profiling {
            log::info!(
                "  Profile files: {:?}",
                collect(runs, |run| run.profile.clone())
            );
        }

        if self.config.internal_checkerboard {
            log::info!(
                "  Internal checkerboard stats (sum of percents, not percentage): {:?}",
                collect(runs, |run| run.internal_checkerboard)
            );
        }
    }
}

fn collect<T>(runs: &[RunResult], field: impl Fn(&RunResult) -> Option<T>) -> Vec<T> {
    runs.iter().filter_map(field).collect()
}

/// Copy the capture's movie into `<output_dir>/videos/`, returning its path
/// relative to `output_dir`. Captures without a movie are skipped.
fn export_video(capture: &CaptureArchive, output_dir: &Path) -> Result<Option<PathBuf>, CaptureError> {
    if capture.movie().is_none() {
        log::warn!(
            "{} has no movie; skipping video export",
            capture.path().display()
        );
        return Ok(None);
    }

    let relative = PathBuf::from("videos").join(format!(
        "video-{}.webm",
        Utc::now().timestamp_millis()
    ));
    let destination = output_dir.join(&relative);
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }

    capture.save_video(&destination)?;
    Ok(Some(relative))
}
