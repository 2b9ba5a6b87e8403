//! Capture validation.
//!
//! Provides [`CaptureArchive::validate`](crate::CaptureArchive::validate),
//! which inspects a loaded capture and returns a [`ValidationReport`]
//! describing anything that would make its metrics unreliable.
//!
//! # Example
//!
//! ```no_run
//! use videocapture::CaptureArchive;
//!
//! let capture = CaptureArchive::open("capture.zip")?;
//! let report = capture.validate();
//! if !report.is_valid() {
//!     print!("{report}");
//! }
//! # Ok::<(), videocapture::CaptureError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::{archive::CaptureArchive, dimensions::DimensionProfile};

/// Summary of capture validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Informational notices (not problems).
    pub info: Vec<String>,
    /// Issues that make some metrics unavailable or less meaningful.
    pub warnings: Vec<String>,
    /// Issues that make the capture useless for analysis.
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// Returns `true` if no errors were found. Warnings do not count.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of issues (info + warnings + errors).
    pub fn issue_count(&self) -> usize {
        self.info.len() + self.warnings.len() + self.errors.len()
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for item in &self.info {
            writeln!(f, "[INFO] {item}")?;
        }
        for item in &self.warnings {
            writeln!(f, "[WARN] {item}")?;
        }
        for item in &self.errors {
            writeln!(f, "[ERROR] {item}")?;
        }
        if self.issue_count() == 0 {
            writeln!(f, "No issues found.")?;
        }
        Ok(())
    }
}

pub(crate) fn validate_capture(capture: &CaptureArchive) -> ValidationReport {
    let mut report = ValidationReport::default();
    let dims = capture.dimensions();
    let frame_count = capture.num_frames();

    // ── Frames ─────────────────────────────────────────────────────
    match frame_count {
        0 => report
            .errors
            .push("Capture contains no frames".to_string()),
        1 => report.warnings.push(
            "Capture contains a single frame; unique-frame and stable-frame metrics are trivial"
                .to_string(),
        ),
        _ => {}
    }

    if dims.area() == 0 && frame_count > 0 {
        report
            .errors
            .push(format!("Bounding box {:?} is empty", dims.bbox()));
    }

    // ── Dimensions ─────────────────────────────────────────────────
    match capture.profile() {
        DimensionProfile::Named(device) => {
            report
                .info
                .push(format!("Using fixed bounding box for device {device}"));
            if let Some((width, height)) = capture.native_size() {
                if !dims.fits_within(width, height) {
                    report.warnings.push(format!(
                        "Bounding box {:?} exceeds native frame size {width}×{height}; frames are padded",
                        dims.bbox(),
                    ));
                }
            }
        }
        DimensionProfile::Inferred => report
            .info
            .push("Bounding box inferred from the first frame".to_string()),
    }

    // ── Timing ─────────────────────────────────────────────────────
    match capture.capture_duration() {
        Some(duration) => report.info.push(format!(
            "Capture covers {:.2}s",
            duration.as_secs_f64()
        )),
        None => report.warnings.push(
            "Metadata has no usable `fps` or `duration`; frame rate cannot be computed".to_string(),
        ),
    }

    // ── Movie ──────────────────────────────────────────────────────
    if capture.movie().is_none() {
        report
            .info
            .push("No movie entry; video cannot be exported".to_string());
    }

    report.info.push(format!(
        "Device {}: {} frames at {}×{}",
        capture.metadata().device,
        frame_count,
        dims.width(),
        dims.height(),
    ));

    report
}
