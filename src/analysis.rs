//! Per-capture analysis.
//!
//! [`analyze_capture`] runs the metric calculators a metric test asks for
//! on one loaded capture: steady-state runs measure unique frames, frame
//! rate and checkerboarding, startup runs look for the stable frame.

use crate::{
    archive::CaptureArchive,
    configuration::AnalysisOptions,
    error::CaptureError,
    metrics::{self, StableFrame, UniqueFrames},
    progress::{OperationType, ProgressTracker},
    report::RunResult,
};

/// Which metrics to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisMode {
    /// Unique frames, frame rate and checkerboard area-duration.
    #[default]
    SteadyState,
    /// Time until the display stops changing.
    Startup,
}

/// Metrics computed for one capture.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureAnalysis {
    SteadyState {
        unique_frames: UniqueFrames,
        /// `None` when the capture has no timing information.
        fps: Option<f64>,
        /// Sum of percentages, NOT a percentage.
        checkerboard: f64,
    },
    Startup {
        /// `None` for a capture without frames.
        stable_frame: Option<StableFrame>,
    },
}

impl CaptureAnalysis {
    /// Copy the computed metrics into a run result.
    pub fn apply_to(&self, result: &mut RunResult) {
        match self {
            CaptureAnalysis::SteadyState {
                unique_frames,
                fps,
                checkerboard,
            } => {
                result.unique_frames = Some(unique_frames.unique);
                result.processed_frames = Some(unique_frames.processed);
                result.fps = *fps;
                result.checkerboard = Some(*checkerboard);
            }
            CaptureAnalysis::Startup { stable_frame } => {
                result.stable_frame = stable_frame.map(|stable| stable.index);
                result.stable_frame_time = stable_frame
                    .and_then(|stable| stable.time)
                    .map(|time| time.as_secs_f64());
            }
        }
    }
}

/// Compute the metrics for `mode` on a loaded capture.
///
/// A missing capture duration is not fatal here: `fps` is left empty and
/// a warning is logged, so the other metrics of the run survive.
pub fn analyze_capture(
    capture: &CaptureArchive,
    mode: AnalysisMode,
    options: &AnalysisOptions,
) -> Result<CaptureAnalysis, CaptureError> {
    let frames = capture.frames();
    let dims = capture.dimensions();
    let total = Some(frames.len() as u64);
    let tracker = |operation| {
        ProgressTracker::new(options.progress.clone(), operation, total, options.batch_size)
    };

    log::debug!(
        "Analyzing {} ({:?}, {} frames)",
        capture.path().display(),
        mode,
        frames.len()
    );

    match mode {
        AnalysisMode::SteadyState => {
            let unique_frames = metrics::unique_frames_tracked(
                frames,
                dims,
                options.unique_threshold,
                &mut tracker(OperationType::FrameComparison),
            );

            let fps = match metrics::frame_rate(unique_frames.unique, capture.capture_duration()) {
                Ok(fps) => Some(fps),
                Err(CaptureError::MissingTiming) => {
                    log::warn!(
                        "{} has no timing metadata; frame rate not computed",
                        capture.path().display()
                    );
                    None
                }
                Err(error) => return Err(error),
            };

            let checkerboard = metrics::checkerboard_area_duration_tracked(
                frames,
                dims,
                options.checkerboard_color,
                &mut tracker(OperationType::CheckerboardScan),
            );

            Ok(CaptureAnalysis::SteadyState {
                unique_frames,
                fps,
                checkerboard,
            })
        }
        AnalysisMode::Startup => {
            let stable_frame = metrics::stable_frame_tracked(
                frames,
                dims,
                options.stable_threshold,
                capture.frame_interval(),
                &mut tracker(OperationType::StableFrameSearch),
            );
            Ok(CaptureAnalysis::Startup { stable_frame })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn steady_state_fills_frame_metrics() {
        let analysis = CaptureAnalysis::SteadyState {
            unique_frames: UniqueFrames {
                unique: 4,
                processed: 9,
            },
            fps: Some(2.0),
            checkerboard: 12.5,
        };
        let mut result = RunResult::default();
        analysis.apply_to(&mut result);

        assert_eq!(result.unique_frames, Some(4));
        assert_eq!(result.processed_frames, Some(9));
        assert_eq!(result.fps, Some(2.0));
        assert_eq!(result.checkerboard, Some(12.5));
        assert_eq!(result.stable_frame, None);
    }

    #[test]
    fn startup_fills_stable_frame_only() {
        let analysis = CaptureAnalysis::Startup {
            stable_frame: Some(StableFrame {
                index: 30,
                time: Some(Duration::from_millis(500)),
            }),
        };
        let mut result = RunResult::default();
        analysis.apply_to(&mut result);

        assert_eq!(result.stable_frame, Some(30));
        assert_eq!(result.stable_frame_time, Some(0.5));
        assert_eq!(result.unique_frames, None);
        assert_eq!(result.fps, None);
    }
}
