//! Analysis and metric-test configuration.
//!
//! [`AnalysisOptions`] is a builder that threads progress callbacks and
//! metric tuning through analysis without widening every function
//! signature. [`MetricTestConfig`] is the validated description of a whole
//! metric test (which builds to run, how often, and what to collect); it is
//! checked once in [`MetricTestConfigBuilder::build`] and never coerced
//! afterwards.
//!
//! # Example
//!
//! ```
//! use videocapture::MetricTestConfig;
//!
//! let config = MetricTestConfig::builder("src/tests/ep1/taskjs")
//!     .apps(["org.mozilla.fennec"])
//!     .num_runs(3)
//!     .extra_env_vars("MOZ_LOG=1 GFX_DEBUG=0")
//!     .build()?;
//! assert_eq!(config.num_runs, 3);
//! # Ok::<(), videocapture::CaptureError>(())
//! ```

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use image::Rgba;
use serde_json::{Map, Value};

use crate::error::CaptureError;
use crate::progress::{NoOpProgress, ProgressCallback};

/// Colour the browser under test paints unrendered (checkerboard) tiles
/// with. Test profiles set the matching preference.
pub const DEFAULT_CHECKERBOARD_COLOR: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Date format accepted for nightly build selection.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Options for analysing one capture.
///
/// All fields have defaults; a default-constructed value counts every
/// changed pixel, reports no progress, and looks for
/// [`DEFAULT_CHECKERBOARD_COLOR`].
#[derive(Clone)]
pub struct AnalysisOptions {
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) batch_size: u64,
    pub(crate) unique_threshold: u64,
    pub(crate) stable_threshold: u64,
    pub(crate) checkerboard_color: Rgba<u8>,
}

impl Debug for AnalysisOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AnalysisOptions")
            .field("batch_size", &self.batch_size)
            .field("unique_threshold", &self.unique_threshold)
            .field("stable_threshold", &self.stable_threshold)
            .field("checkerboard_color", &self.checkerboard_color)
            .finish_non_exhaustive()
    }
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisOptions {
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            batch_size: 1,
            unique_threshold: 0,
            stable_threshold: 0,
            checkerboard_color: DEFAULT_CHECKERBOARD_COLOR,
        }
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Fire the progress callback every `size` frames (minimum 1).
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// A frame counts as unique when more than `threshold` pixels differ
    /// from its predecessor.
    #[must_use]
    pub fn with_unique_threshold(mut self, threshold: u64) -> Self {
        self.unique_threshold = threshold;
        self
    }

    /// Differences of at most `threshold` pixels do not end stabilisation.
    #[must_use]
    pub fn with_stable_threshold(mut self, threshold: u64) -> Self {
        self.stable_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_checkerboard_color(mut self, color: Rgba<u8>) -> Self {
        self.checkerboard_color = color;
        self
    }

    pub fn unique_threshold(&self) -> u64 {
        self.unique_threshold
    }

    pub fn stable_threshold(&self) -> u64 {
        self.stable_threshold
    }

    pub fn checkerboard_color(&self) -> Rgba<u8> {
        self.checkerboard_color
    }
}

/// The builds a metric test runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestTargets {
    /// Already-installed applications, by package name.
    AppNames(Vec<String>),
    /// Local packages to install before testing.
    Apks(Vec<PathBuf>),
    /// Nightly builds, fetched by date.
    Dates(Vec<NaiveDate>),
}

impl TestTargets {
    pub fn len(&self) -> usize {
        match self {
            TestTargets::AppNames(names) => names.len(),
            TestTargets::Apks(apks) => apks.len(),
            TestTargets::Dates(dates) => dates.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validated configuration for a metric test.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricTestConfig {
    /// Path or name of the test to run.
    pub test_name: String,
    /// Builds to test.
    pub targets: TestTargets,
    /// Sequential runs per build (at least 1).
    pub num_runs: u32,
    /// Directory for the JSON report and copied videos.
    pub output_dir: Option<PathBuf>,
    /// Run the test without capturing; no frame metrics are produced.
    pub no_capture: bool,
    /// Collect a profile from the built-in profiler for every run.
    pub enable_profiling: bool,
    /// Parse the renderer's own checkerboard log for every run.
    pub internal_checkerboard: bool,
    /// Measure startup stabilisation instead of steady-state metrics.
    pub startup_test: bool,
    /// Extra query parameters appended to the test URL.
    pub url_params: String,
    /// Extra browser preferences.
    pub extra_prefs: Map<String, Value>,
    /// Extra environment variables for the browser process.
    pub extra_env_vars: BTreeMap<String, String>,
    /// Where capture archives are written.
    pub capture_dir: PathBuf,
    /// Where profiles are written.
    pub profile_dir: PathBuf,
}

impl MetricTestConfig {
    pub fn builder(test_name: impl Into<String>) -> MetricTestConfigBuilder {
        MetricTestConfigBuilder::new(test_name)
    }
}

/// Builder for [`MetricTestConfig`]. Raw option values are accepted as
/// given and checked together in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct MetricTestConfigBuilder {
    test_name: String,
    apps: Vec<String>,
    use_apks: bool,
    date: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    num_runs: u32,
    output_dir: Option<PathBuf>,
    no_capture: bool,
    enable_profiling: bool,
    internal_checkerboard: bool,
    startup_test: bool,
    url_params: String,
    extra_prefs: String,
    extra_env_vars: String,
    capture_dir: PathBuf,
    profile_dir: PathBuf,
}

impl MetricTestConfigBuilder {
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            apps: Vec::new(),
            use_apks: false,
            date: None,
            start_date: None,
            end_date: None,
            num_runs: 1,
            output_dir: None,
            no_capture: false,
            enable_profiling: false,
            internal_checkerboard: false,
            startup_test: false,
            url_params: String::new(),
            extra_prefs: "{}".to_string(),
            extra_env_vars: String::new(),
            capture_dir: PathBuf::from("captures"),
            profile_dir: PathBuf::from("profiles"),
        }
    }

    /// App names, or APK paths when [`use_apks`](Self::use_apks) is set.
    #[must_use]
    pub fn apps<I, S>(mut self, apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.apps = apps.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn use_apks(mut self, use_apks: bool) -> Self {
        self.use_apks = use_apks;
        self
    }

    /// Test the nightly build from `YYYY-MM-DD`.
    #[must_use]
    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Test every nightly from `start` to `end`, inclusive.
    #[must_use]
    pub fn date_range(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_date = Some(start.into());
        self.end_date = Some(end.into());
        self
    }

    #[must_use]
    pub fn start_date(mut self, start: impl Into<String>) -> Self {
        self.start_date = Some(start.into());
        self
    }

    #[must_use]
    pub fn end_date(mut self, end: impl Into<String>) -> Self {
        self.end_date = Some(end.into());
        self
    }

    #[must_use]
    pub fn num_runs(mut self, runs: u32) -> Self {
        self.num_runs = runs;
        self
    }

    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn no_capture(mut self, no_capture: bool) -> Self {
        self.no_capture = no_capture;
        self
    }

    #[must_use]
    pub fn enable_profiling(mut self, enable: bool) -> Self {
        self.enable_profiling = enable;
        self
    }

    #[must_use]
    pub fn internal_checkerboard(mut self, enable: bool) -> Self {
        self.internal_checkerboard = enable;
        self
    }

    #[must_use]
    pub fn startup_test(mut self, startup: bool) -> Self {
        self.startup_test = startup;
        self
    }

    #[must_use]
    pub fn url_params(mut self, params: impl Into<String>) -> Self {
        self.url_params = params.into();
        self
    }

    /// Extra preferences as a JSON object.
    #[must_use]
    pub fn extra_prefs(mut self, json: impl Into<String>) -> Self {
        self.extra_prefs = json.into();
        self
    }

    /// Extra environment variables in `"VAR1=VAL1 VAR2=VAL2"` form.
    #[must_use]
    pub fn extra_env_vars(mut self, vars: impl Into<String>) -> Self {
        self.extra_env_vars = vars.into();
        self
    }

    #[must_use]
    pub fn capture_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.capture_dir = dir.into();
        self
    }

    #[must_use]
    pub fn profile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profile_dir = dir.into();
        self
    }

    /// Validate every option and produce the final configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidConfiguration`] when the test name is
    /// empty, the run count is zero, no (or conflicting) build selection is
    /// given, a date is malformed or the range is reversed, the extra
    /// preferences are not a JSON object, or an environment variable has no
    /// name.
    pub fn build(self) -> Result<MetricTestConfig, CaptureError> {
        if self.test_name.trim().is_empty() {
            return Err(invalid("a test name is required"));
        }
        if self.num_runs == 0 {
            return Err(invalid("--num-runs must be at least 1"));
        }

        let targets = self.resolve_targets()?;
        let extra_prefs = parse_extra_prefs(&self.extra_prefs)?;
        let extra_env_vars = parse_env_vars(&self.extra_env_vars)?;

        Ok(MetricTestConfig {
            test_name: self.test_name,
            targets,
            num_runs: self.num_runs,
            output_dir: self.output_dir,
            no_capture: self.no_capture,
            enable_profiling: self.enable_profiling,
            internal_checkerboard: self.internal_checkerboard,
            startup_test: self.startup_test,
            url_params: self.url_params,
            extra_prefs,
            extra_env_vars,
            capture_dir: self.capture_dir,
            profile_dir: self.profile_dir,
        })
    }

    fn resolve_targets(&self) -> Result<TestTargets, CaptureError> {
        let has_range = self.start_date.is_some() || self.end_date.is_some();
        if (has_range || self.date.is_some()) && !self.apps.is_empty() {
            return Err(invalid(
                "a date or date range cannot be combined with app names or apks",
            ));
        }
        if has_range && self.date.is_some() {
            return Err(invalid("specify either --date or a date range, not both"));
        }

        if has_range {
            let (Some(start), Some(end)) = (&self.start_date, &self.end_date) else {
                return Err(invalid("a date range needs both a start and an end date"));
            };
            let start = parse_date(start)?;
            let end = parse_date(end)?;
            return expand_date_range(start, end).map(TestTargets::Dates);
        }

        if let Some(date) = &self.date {
            return Ok(TestTargets::Dates(vec![parse_date(date)?]));
        }

        if self.apps.is_empty() {
            return Err(invalid(
                "must specify a date, a date range, a set of app names, or a set of apks",
            ));
        }

        Ok(if self.use_apks {
            TestTargets::Apks(self.apps.iter().map(PathBuf::from).collect())
        } else {
            TestTargets::AppNames(self.apps.clone())
        })
    }
}

fn invalid(message: impl Into<String>) -> CaptureError {
    CaptureError::InvalidConfiguration(message.into())
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate, CaptureError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|error| invalid(format!("invalid date {value:?} (expected YYYY-MM-DD): {error}")))
}

/// Every date from `start` to `end`, inclusive.
pub fn expand_date_range(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, CaptureError> {
    if start > end {
        return Err(invalid(format!(
            "start date {start} is after end date {end}"
        )));
    }

    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        dates.push(current);
        current = match current.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(dates)
}

fn parse_extra_prefs(json: &str) -> Result<Map<String, Value>, CaptureError> {
    let trimmed = json.trim();
    if trimmed.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(prefs)) => Ok(prefs),
        Ok(_) => Err(invalid("extra preferences must be a JSON object")),
        Err(error) => Err(invalid(format!(
            "error processing extra preferences: not valid JSON ({error})"
        ))),
    }
}

/// Parse `"VAR1=VAL1 VAR2=VAL2"`. A token without `=` sets an empty value.
pub fn parse_env_vars(vars: &str) -> Result<BTreeMap<String, String>, CaptureError> {
    let mut parsed = BTreeMap::new();
    for token in vars.split_whitespace() {
        let (name, value) = token.split_once('=').unwrap_or((token, ""));
        if name.is_empty() {
            return Err(invalid(format!(
                "environment variable {token:?} has no name"
            )));
        }
        parsed.insert(name.to_string(), value.to_string());
    }
    Ok(parsed)
}
