//! Rendering-performance metrics computed from a frame sequence.
//!
//! All calculators take frames already cropped to the capture's bounding
//! box and compare them with the exact differencer in
//! [`difference`](crate::difference).
//!
//! # Example
//!
//! ```no_run
//! use videocapture::{CaptureArchive, CaptureError, metrics};
//!
//! let capture = CaptureArchive::open("capture.zip")?;
//! let counts = metrics::unique_frames(capture.frames(), capture.dimensions(), 0);
//! let fps = metrics::frame_rate(counts.unique, capture.capture_duration())?;
//! println!("{} unique of {} processed, {fps:.2} fps", counts.unique, counts.processed);
//! # Ok::<(), CaptureError>(())
//! ```

use std::sync::Arc;
use std::time::Duration;

use image::Rgba;

use crate::{
    difference::{count_differing_pixels, frames_differ},
    dimensions::CaptureDimensions,
    error::CaptureError,
    frame::Frame,
    progress::{NoOpProgress, OperationType, ProgressTracker},
};

/// Unique-frame count for a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueFrames {
    /// Frames whose content differs from their predecessor (plus the first).
    pub unique: u64,
    /// Frames examined. Always one less than the decoded count, because the
    /// final frame is never evaluated as a current frame.
    pub processed: u64,
}

/// First frame after which the display no longer changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StableFrame {
    /// Index of the stable frame.
    pub index: usize,
    /// Offset from the start of the capture, when timing is known.
    pub time: Option<Duration>,
}

fn silent_tracker(operation: OperationType) -> ProgressTracker {
    ProgressTracker::new(Arc::new(NoOpProgress), operation, None, u64::MAX)
}

/// Count frames that differ from their predecessor by more than
/// `threshold` pixels.
///
/// The first frame always counts. Only frames `0..N-1` are examined, so
/// for `N` decoded frames `processed` is `N - 1` and the last frame never
/// contributes.
pub fn unique_frames(frames: &[Frame], dims: CaptureDimensions, threshold: u64) -> UniqueFrames {
    let mut tracker = silent_tracker(OperationType::FrameComparison);
    unique_frames_tracked(frames, dims, threshold, &mut tracker)
}

pub(crate) fn unique_frames_tracked(
    frames: &[Frame],
    dims: CaptureDimensions,
    threshold: u64,
    tracker: &mut ProgressTracker,
) -> UniqueFrames {
    let examined = frames.len().saturating_sub(1);
    let mut unique = 0;
    let mut processed = 0;
    let mut previous: Option<&Frame> = None;

    for frame in &frames[..examined] {
        match previous {
            Some(previous) => {
                if count_differing_pixels(previous, frame, dims) > threshold {
                    unique += 1;
                }
            }
            None => unique += 1,
        }
        processed += 1;
        previous = Some(frame);
        tracker.advance(Some(frame.index as u64));
    }
    tracker.finish();

    UniqueFrames { unique, processed }
}

/// Unique frames per second of capture.
///
/// # Errors
///
/// Returns [`CaptureError::MissingTiming`] when no positive duration is
/// known.
pub fn frame_rate(unique: u64, duration: Option<Duration>) -> Result<f64, CaptureError> {
    match duration {
        Some(duration) if !duration.is_zero() => Ok(unique as f64 / duration.as_secs_f64()),
        _ => Err(CaptureError::MissingTiming),
    }
}

/// Percentage (0–100) of the box painted in the checkerboard colour.
pub fn checkerboard_percent(frame: &Frame, dims: CaptureDimensions, color: Rgba<u8>) -> f64 {
    let area = dims.area();
    if area == 0 {
        return 0.0;
    }

    let (width, height) = dims.size();
    let mut matching = 0u64;
    for x in 0..width {
        for y in 0..height {
            if frame.pixel(x, y) == Some(&color) {
                matching += 1;
            }
        }
    }
    matching as f64 * 100.0 / area as f64
}

/// Checkerboard area multiplied by display duration, summed over the
/// capture.
///
/// Consecutive identical frames form one display interval; each interval
/// contributes its checkerboard percentage times its length in capture
/// frames. The result is an accumulated sum of percentages, NOT a
/// percentage: a capture showing 50% checkerboard for 4 frames scores 200.
pub fn checkerboard_area_duration(
    frames: &[Frame],
    dims: CaptureDimensions,
    color: Rgba<u8>,
) -> f64 {
    let mut tracker = silent_tracker(OperationType::CheckerboardScan);
    checkerboard_area_duration_tracked(frames, dims, color, &mut tracker)
}

pub(crate) fn checkerboard_area_duration_tracked(
    frames: &[Frame],
    dims: CaptureDimensions,
    color: Rgba<u8>,
    tracker: &mut ProgressTracker,
) -> f64 {
    let mut total = 0.0;
    let mut start = 0;

    while start < frames.len() {
        let head = &frames[start];
        let mut end = start + 1;
        while end < frames.len() && !frames_differ(&frames[end - 1], &frames[end], dims) {
            end += 1;
        }

        let percent = checkerboard_percent(head, dims, color);
        if percent > 0.0 {
            log::trace!(
                "Frames {}..{} show {:.2}% checkerboard",
                start,
                end,
                percent
            );
        }
        total += percent * (end - start) as f64;

        for frame in &frames[start..end] {
            tracker.advance(Some(frame.index as u64));
        }
        start = end;
    }
    tracker.finish();

    total
}

/// Find the first frame after which no adjacent pair differs by more than
/// `threshold` pixels.
///
/// Returns `None` for an empty capture and index 0 when nothing ever
/// changes. `time` is `index * frame_interval` when an interval is given
/// and the product fits in a [`Duration`].
pub fn stable_frame(
    frames: &[Frame],
    dims: CaptureDimensions,
    threshold: u64,
    frame_interval: Option<Duration>,
) -> Option<StableFrame> {
    let mut tracker = silent_tracker(OperationType::StableFrameSearch);
    stable_frame_tracked(frames, dims, threshold, frame_interval, &mut tracker)
}

pub(crate) fn stable_frame_tracked(
    frames: &[Frame],
    dims: CaptureDimensions,
    threshold: u64,
    frame_interval: Option<Duration>,
    tracker: &mut ProgressTracker,
) -> Option<StableFrame> {
    if frames.is_empty() {
        return None;
    }

    let mut last_change = 0;
    for (index, pair) in frames.windows(2).enumerate() {
        let changed = if threshold == 0 {
            frames_differ(&pair[0], &pair[1], dims)
        } else {
            count_differing_pixels(&pair[0], &pair[1], dims) > threshold
        };
        if changed {
            last_change = index + 1;
        }
        tracker.advance(Some(pair[1].index as u64));
    }
    tracker.finish();

    Some(StableFrame {
        index: last_change,
        time: frame_interval.and_then(|interval| {
            Duration::try_from_secs_f64(interval.as_secs_f64() * last_change as f64).ok()
        }),
    })
}
