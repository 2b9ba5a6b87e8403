//! Error types for the `videocapture` crate.
//!
//! This module defines [`CaptureError`], the unified error type returned by
//! all fallible operations in the crate, and [`ErrorKind`], a coarse
//! classification callers use to decide whether a failed run should abort
//! the whole test or only the capture being analysed.

use std::{io::Error as IoError, path::PathBuf};

use serde_json::Error as JsonError;
use thiserror::Error;

/// Coarse classification of a [`CaptureError`].
///
/// Format failures mean the capture could not be recognised at all; decode
/// failures mean it was recognised but a frame was unreadable. Everything
/// else falls under [`ErrorKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The archive is missing, unreadable, or lacks required metadata.
    Format,
    /// A frame entry could not be decoded as an image.
    Decode,
    /// Configuration, report, I/O, or collaborator failures.
    Other,
}

/// The unified error type for all `videocapture` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CaptureError {
    /// The capture archive could not be opened or is not a capture file.
    #[error("Invalid capture file at {path}: {reason}")]
    Format {
        /// Path passed to [`crate::CaptureArchive::open`].
        path: PathBuf,
        /// Why the archive was rejected.
        reason: String,
    },

    /// A frame entry could not be decoded.
    #[error("Failed to decode frame {index} ({entry}): {reason}")]
    Decode {
        /// Archive entry name of the frame.
        entry: String,
        /// Position of the frame in capture order.
        index: usize,
        /// Underlying decoder message.
        reason: String,
    },

    /// Frame-rate style metrics need a capture duration that the metadata
    /// does not provide.
    #[error("Capture metadata carries no timing information (expected `fps` or `duration`)")]
    MissingTiming,

    /// A configuration value failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Another process holds the lock on a report file.
    #[error("Report file {path} is locked by another invocation (delete its .lock file if that process is gone)")]
    ReportLocked {
        /// The report file that could not be locked.
        path: PathBuf,
    },

    /// An existing report file could not be interpreted.
    #[error("Failed to read report at {path}: {reason}")]
    Report {
        /// Path of the report file.
        path: PathBuf,
        /// Why the report was rejected.
        reason: String,
    },

    /// An external collaborator (device, runner, build retriever) failed.
    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    JsonError(#[from] JsonError),
}

impl CaptureError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::Format { .. } => ErrorKind::Format,
            CaptureError::Decode { .. } => ErrorKind::Decode,
            _ => ErrorKind::Other,
        }
    }

    pub(crate) fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CaptureError::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_and_decode_are_distinguishable() {
        let format = CaptureError::format("capture.zip", "no metadata");
        let decode = CaptureError::Decode {
            entry: "images/frame2.png".to_string(),
            index: 1,
            reason: "bad header".to_string(),
        };

        assert_eq!(format.kind(), ErrorKind::Format);
        assert_eq!(decode.kind(), ErrorKind::Decode);
        assert_eq!(CaptureError::MissingTiming.kind(), ErrorKind::Other);
    }

    #[test]
    fn messages_carry_context() {
        let decode = CaptureError::Decode {
            entry: "images/frame2.png".to_string(),
            index: 1,
            reason: "bad header".to_string(),
        };
        let message = decode.to_string();
        assert!(message.contains("images/frame2.png"));
        assert!(message.contains("frame 1"));
    }
}
