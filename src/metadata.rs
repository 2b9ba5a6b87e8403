//! Capture metadata types.
//!
//! Every capture archive carries a flat `metadata.json` record. This module
//! parses and validates it; validation happens once, when the archive is
//! opened, before any frame is decoded.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata record stored in a capture archive.
///
/// Only `version` and `device` are required. Timing fields are optional
/// because older recording pipelines did not write them; metrics that need
/// a capture duration fail with
/// [`CaptureError::MissingTiming`](crate::CaptureError::MissingTiming) when
/// neither is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct CaptureMetadata {
    /// Capture format version. Must be truthy.
    pub version: Value,
    /// Identifier of the recording device (e.g. `"LG-P999"`).
    pub device: String,
    /// Capture frame rate in frames per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    /// Wall-clock capture length in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Any other fields written by the recording pipeline.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CaptureMetadata {
    /// Validate a raw metadata record.
    ///
    /// Returns a human-readable reason on failure; the archive loader wraps
    /// it in a format error.
    pub(crate) fn from_value(value: Value) -> Result<Self, String> {
        let Value::Object(record) = value else {
            return Err("metadata is not a JSON object".to_string());
        };

        match record.get("version") {
            None => return Err("metadata has no `version` field".to_string()),
            Some(version) if !is_truthy(version) => {
                return Err(format!("metadata `version` is not set ({version})"));
            }
            Some(_) => {}
        }

        match record.get("device") {
            Some(Value::String(_)) => {}
            Some(other) => return Err(format!("metadata `device` is not a string ({other})")),
            None => return Err("metadata has no `device` field".to_string()),
        }

        serde_json::from_value(Value::Object(record)).map_err(|error| error.to_string())
    }

    /// Capture duration, if the metadata provides enough to derive one.
    ///
    /// An explicit `duration` wins; otherwise `frame_count / fps`.
    ///
    /// Values too large to represent as a [`Duration`] count as missing.
    pub fn capture_duration(&self, frame_count: usize) -> Option<Duration> {
        if let Some(seconds) = self.duration.filter(|d| d.is_finite() && *d > 0.0) {
            return seconds_to_duration(seconds);
        }
        self.positive_fps()
            .and_then(|fps| seconds_to_duration(frame_count as f64 / fps))
    }

    /// Time each captured frame covers, if known.
    pub fn frame_interval(&self, frame_count: usize) -> Option<Duration> {
        if let Some(fps) = self.positive_fps() {
            return seconds_to_duration(1.0 / fps);
        }
        if frame_count == 0 {
            return None;
        }
        self.duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .and_then(|seconds| seconds_to_duration(seconds / frame_count as f64))
    }

    fn positive_fps(&self) -> Option<f64> {
        self.fps.filter(|fps| fps.is_finite() && *fps > 0.0)
    }
}

fn seconds_to_duration(seconds: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(seconds).ok()
}

/// JSON truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are false.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}
