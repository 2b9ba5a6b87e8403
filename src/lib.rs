//! # videocapture
//!
//! Score browser UI rendering performance from recorded screen captures.
//!
//! `videocapture` loads a capture archive (a zip of frame PNGs plus
//! metadata), compares frames pixel by pixel, and derives rendering
//! metrics: how many distinct frames were shown, at what rate, how much
//! unpainted checkerboard area was visible and for how long, and when the
//! display settled after startup. It also parses the renderer's own
//! checkerboard log and accumulates results from repeated runs into a
//! persisted JSON report.
//!
//! ## Quick Start
//!
//! ### Analyse a Capture
//!
//! ```no_run
//! use videocapture::{AnalysisMode, AnalysisOptions, CaptureArchive, analyze_capture};
//!
//! let capture = CaptureArchive::open("capture.zip").unwrap();
//! let analysis = analyze_capture(&capture, AnalysisMode::SteadyState, &AnalysisOptions::new())
//!     .unwrap();
//! println!("{analysis:?}");
//! ```
//!
//! ### Parse a Checkerboard Log
//!
//! ```no_run
//! use videocapture::CheckerboardLogParser;
//!
//! let score = CheckerboardLogParser::new().parse_file("checkerboard.log").unwrap();
//! println!("internal checkerboard: {score}");
//! ```
//!
//! ### Append Runs to a Report
//!
//! ```no_run
//! use videocapture::{RunResult, report};
//!
//! let run = RunResult { unique_frames: Some(42), ..RunResult::default() };
//! report::append_runs("results/metric-test.json", "taskjs", "org.mozilla.fennec", vec![run])
//!     .unwrap();
//! ```
//!
//! ## Capture Archive Format
//!
//! | Entry | Content |
//! |-------|---------|
//! | `metadata.json` | `{"version": <truthy>, "device": "<id>", "fps"?: <number>, "duration"?: <seconds>}` |
//! | `images/<name><n>.png` | one frame per entry, natural-sort order is capture order |
//! | `movie.avi` | optional raw movie |
//!
//! Analysis is synchronous and single-threaded; a capture is decoded in
//! full before any comparison runs.

pub mod analysis;
pub mod archive;
pub mod checkerboard_log;
pub mod configuration;
pub mod difference;
pub mod dimensions;
pub mod error;
pub mod frame;
pub mod harness;
pub mod metadata;
pub mod metrics;
pub mod ordering;
pub mod progress;
pub mod report;
pub mod validation;

pub use analysis::{AnalysisMode, CaptureAnalysis, analyze_capture};
pub use archive::CaptureArchive;
pub use checkerboard_log::CheckerboardLogParser;
pub use configuration::{AnalysisOptions, MetricTestConfig, MetricTestConfigBuilder, TestTargets};
pub use difference::{ChangeMetrics, DiffMode, compare};
pub use dimensions::{CaptureDimensions, DimensionProfile};
pub use error::{CaptureError, ErrorKind};
pub use frame::Frame;
pub use harness::{
    AppInfo, BuildRetriever, DeviceController, MetricTest, RunRequest, TargetResults, TestRunner,
    TestTarget,
};
pub use metadata::CaptureMetadata;
pub use metrics::{StableFrame, UniqueFrames};
pub use progress::{OperationType, ProgressCallback, ProgressInfo};
pub use report::{Report, RunResult};
pub use validation::ValidationReport;
