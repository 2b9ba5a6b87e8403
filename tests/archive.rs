//! Capture archive loading integration tests.
//!
//! Captures are generated on the fly in a temporary directory.

mod common;

use std::{
    io::{self, Write},
    time::Duration,
};

use serde_json::json;
use videocapture::{
    AnalysisMode, AnalysisOptions, CaptureArchive, CaptureDimensions, CaptureError,
    DimensionProfile, ErrorKind, RunResult, analyze_capture,
};

use common::{BLACK, CaptureBuilder, WHITE, solid, with_pixel};

#[test]
fn frames_load_in_natural_order() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let base = solid(4, 3, WHITE);
    // Entries are written out of order; frame10 must come after frame2.
    let path = CaptureBuilder::new()
        .frame(10, &with_pixel(&base, 0, 0, BLACK))
        .frame(2, &with_pixel(&base, 1, 0, BLACK))
        .frame(1, &with_pixel(&base, 2, 0, BLACK))
        .write(&dir.path().join("capture.zip"));

    let capture = CaptureArchive::open(&path).expect("Failed to open capture");
    assert_eq!(capture.num_frames(), 3);

    let marked_column = |index: usize| {
        (0..4)
            .find(|&x| capture.frames()[index].pixel(x, 0) == Some(&BLACK))
            .expect("Frame has no marker")
    };
    assert_eq!(marked_column(0), 2, "frame1 first");
    assert_eq!(marked_column(1), 1, "frame2 second");
    assert_eq!(marked_column(2), 0, "frame10 last");

    for (position, frame) in capture.frames().iter().enumerate() {
        assert_eq!(frame.index, position);
    }
}

#[test]
fn inferred_dimensions_use_first_frame() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = CaptureBuilder::new()
        .frames([&solid(16, 9, WHITE), &solid(16, 9, BLACK)])
        .write(&dir.path().join("capture.zip"));

    let capture = CaptureArchive::open(&path).expect("Failed to open capture");
    assert_eq!(capture.profile(), &DimensionProfile::Inferred);
    assert_eq!(capture.dimensions(), CaptureDimensions::full_frame(16, 9));
    assert_eq!(capture.native_size(), Some((16, 9)));
    assert_eq!(capture.frames()[1].width(), 16);
    assert_eq!(capture.frames()[1].height(), 9);
}

#[test]
fn named_profile_crops_to_fixed_box() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = CaptureBuilder::new()
        .metadata(json!({"version": "1", "device": "LG-P999", "fps": 60}))
        .frames([&solid(32, 32, WHITE), &solid(32, 32, WHITE)])
        .write(&dir.path().join("capture.zip"));

    let capture = CaptureArchive::open(&path).expect("Failed to open capture");
    assert_eq!(capture.profile(), &DimensionProfile::Named("LG-P999".to_string()));
    assert_eq!(capture.dimensions().bbox(), (613, 158, 1307, 1080));

    // Frames are smaller than the box: output keeps the box size, padded.
    for frame in capture.frames() {
        assert_eq!((frame.width(), frame.height()), (694, 922));
    }
    let report = capture.validate();
    assert!(report.is_valid());
    assert!(report.warnings.iter().any(|w| w.contains("exceeds native frame size")));
}

#[test]
fn directory_and_short_entries_are_skipped() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = CaptureBuilder::new()
        .directory("images/")
        .entry("images/a", b"not an image".to_vec())
        .entry("notes.txt", b"ignored".to_vec())
        .frames([&solid(2, 2, WHITE)])
        .write(&dir.path().join("capture.zip"));

    let capture = CaptureArchive::open(&path).expect("Failed to open capture");
    assert_eq!(capture.num_frames(), 1);
}

#[test]
fn missing_file_is_format_error() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let result = CaptureArchive::open(dir.path().join("absent.zip"));
    match result {
        Err(CaptureError::Format { reason, .. }) => assert!(reason.contains("does not exist")),
        other => panic!("Expected Format error, got {other:?}"),
    }
}

#[test]
fn non_zip_is_format_error() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("capture.zip");
    std::fs::write(&path, b"plain text, not a zip").expect("Failed to write file");

    let error = CaptureArchive::open(&path).expect_err("Expected failure");
    assert_eq!(error.kind(), ErrorKind::Format);
}

#[test]
fn metadata_problems_are_format_errors() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let frame = solid(2, 2, WHITE);
    let cases = [
        ("no-metadata", CaptureBuilder::new().without_metadata()),
        ("no-version", CaptureBuilder::new().metadata(json!({"device": "x"}))),
        ("falsy-version", CaptureBuilder::new().metadata(json!({"version": 0, "device": "x"}))),
        ("empty-version", CaptureBuilder::new().metadata(json!({"version": "", "device": "x"}))),
        ("no-device", CaptureBuilder::new().metadata(json!({"version": 1}))),
        ("not-object", CaptureBuilder::new().metadata(json!([1, 2]))),
    ];

    for (name, builder) in cases {
        let path = builder
            .frames([&frame])
            .write(&dir.path().join(format!("{name}.zip")));
        let error = CaptureArchive::open(&path).expect_err(name);
        assert_eq!(error.kind(), ErrorKind::Format, "{name}: {error}");
    }
}

#[test]
fn metadata_is_checked_before_frames_are_decoded() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let cases = [
        ("no-version", json!({"device": "x"})),
        ("falsy-version", json!({"version": 0, "device": "x"})),
    ];

    for (name, metadata) in cases {
        let path = CaptureBuilder::new()
            .metadata(metadata)
            .entry("images/frame1.png", b"not a png".to_vec())
            .write(&dir.path().join(format!("{name}.zip")));
        let error = CaptureArchive::open(&path).expect_err(name);
        assert_eq!(error.kind(), ErrorKind::Format, "{name}: {error}");
    }
}

#[test]
fn corrupt_frame_is_decode_error() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = CaptureBuilder::new()
        .frame(1, &solid(2, 2, WHITE))
        .entry("images/frame2.png", b"\x89PNG truncated".to_vec())
        .frame(3, &solid(2, 2, WHITE))
        .write(&dir.path().join("capture.zip"));

    match CaptureArchive::open(&path) {
        Err(CaptureError::Decode { entry, index, .. }) => {
            assert_eq!(entry, "images/frame2.png");
            assert_eq!(index, 1);
        }
        other => panic!("Expected Decode error, got {other:?}"),
    }
}

#[test]
fn movie_round_trips_to_writer() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = CaptureBuilder::new()
        .frames([&solid(2, 2, WHITE)])
        .movie(b"RIFF....AVI ")
        .write(&dir.path().join("capture.zip"));

    let capture = CaptureArchive::open(&path).expect("Failed to open capture");
    let mut output = Vec::new();
    capture.write_video(&mut output).expect("Failed to write video");
    assert_eq!(output, b"RIFF....AVI ");
}

/// Accepts every write but fails to flush, like a full disk behind a buffer.
struct UnflushableWriter {
    written: Vec<u8>,
}

impl Write for UnflushableWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::other("no space left on device"))
    }
}

#[test]
fn write_video_reports_flush_failure() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = CaptureBuilder::new()
        .frames([&solid(2, 2, WHITE)])
        .movie(b"movie bytes")
        .write(&dir.path().join("capture.zip"));

    let capture = CaptureArchive::open(&path).expect("Failed to open capture");
    let mut writer = UnflushableWriter { written: Vec::new() };
    let result = capture.write_video(&mut writer);
    assert!(matches!(result, Err(CaptureError::IoError(_))));
}

#[test]
fn save_video_writes_whole_movie() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let movie: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
    let path = CaptureBuilder::new()
        .frames([&solid(2, 2, WHITE)])
        .movie(&movie)
        .write(&dir.path().join("capture.zip"));

    let capture = CaptureArchive::open(&path).expect("Failed to open capture");
    let output = dir.path().join("video.webm");
    capture.save_video(&output).expect("Failed to save video");
    assert_eq!(std::fs::read(&output).expect("Failed to read video"), movie);
}

#[cfg(target_os = "linux")]
#[test]
fn save_video_to_full_device_fails() {
    let full = std::path::Path::new("/dev/full");
    if !full.exists() {
        return;
    }

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = CaptureBuilder::new()
        .frames([&solid(2, 2, WHITE)])
        .movie(b"short movie")
        .write(&dir.path().join("capture.zip"));

    let capture = CaptureArchive::open(&path).expect("Failed to open capture");
    let error = capture.save_video(full).expect_err("Expected failure");
    assert_eq!(error.kind(), ErrorKind::Other);
}

#[test]
fn write_video_without_movie_fails() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = CaptureBuilder::new()
        .frames([&solid(2, 2, WHITE)])
        .write(&dir.path().join("capture.zip"));

    let capture = CaptureArchive::open(&path).expect("Failed to open capture");
    assert!(capture.movie().is_none());
    let error = capture
        .write_video(&mut Vec::new())
        .expect_err("Expected failure");
    assert_eq!(error.kind(), ErrorKind::Format);
}

#[test]
fn timing_comes_from_metadata() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let frames = [solid(2, 2, WHITE), solid(2, 2, WHITE), solid(2, 2, WHITE), solid(2, 2, WHITE)];

    let by_fps = CaptureBuilder::new()
        .metadata(json!({"version": 1, "device": "x", "fps": 2}))
        .frames(&frames)
        .write(&dir.path().join("fps.zip"));
    let capture = CaptureArchive::open(&by_fps).expect("Failed to open capture");
    assert_eq!(capture.capture_duration(), Some(Duration::from_secs(2)));
    assert_eq!(capture.frame_interval(), Some(Duration::from_millis(500)));

    let by_duration = CaptureBuilder::new()
        .metadata(json!({"version": 1, "device": "x", "duration": 8.0}))
        .frames(&frames)
        .write(&dir.path().join("duration.zip"));
    let capture = CaptureArchive::open(&by_duration).expect("Failed to open capture");
    assert_eq!(capture.capture_duration(), Some(Duration::from_secs(8)));
    assert_eq!(capture.frame_interval(), Some(Duration::from_secs(2)));

    let untimed = CaptureBuilder::new()
        .metadata(json!({"version": 1, "device": "x"}))
        .frames(&frames)
        .write(&dir.path().join("untimed.zip"));
    let capture = CaptureArchive::open(&untimed).expect("Failed to open capture");
    assert_eq!(capture.capture_duration(), None);
}

#[test]
fn unknown_metadata_fields_are_kept() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = CaptureBuilder::new()
        .metadata(json!({"version": 1, "device": "x", "fps": 60, "app": "fennec"}))
        .frames([&solid(2, 2, WHITE)])
        .write(&dir.path().join("capture.zip"));

    let capture = CaptureArchive::open(&path).expect("Failed to open capture");
    assert_eq!(capture.metadata().device, "x");
    assert_eq!(capture.metadata().extra.get("app"), Some(&json!("fennec")));
}

#[test]
fn unrepresentable_timing_counts_as_missing() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let frames = [solid(2, 2, WHITE), solid(2, 2, BLACK), solid(2, 2, WHITE)];

    let long = CaptureBuilder::new()
        .metadata(json!({"version": 1, "device": "x", "duration": 1e30}))
        .frames(&frames)
        .write(&dir.path().join("long.zip"));
    let capture = CaptureArchive::open(&long).expect("Failed to open capture");
    assert_eq!(capture.capture_duration(), None);
    assert!(!capture.validate().warnings.is_empty());
    let mut result = RunResult::default();
    analyze_capture(&capture, AnalysisMode::SteadyState, &AnalysisOptions::new())
        .expect("Analysis failed")
        .apply_to(&mut result);
    assert_eq!(result.fps, None);
    assert_eq!(result.unique_frames, Some(2));

    let slow = CaptureBuilder::new()
        .metadata(json!({"version": 1, "device": "x", "fps": 1e-300}))
        .frames(&frames)
        .write(&dir.path().join("slow.zip"));
    let capture = CaptureArchive::open(&slow).expect("Failed to open capture");
    assert_eq!(capture.frame_interval(), None);
    let mut result = RunResult::default();
    analyze_capture(&capture, AnalysisMode::Startup, &AnalysisOptions::new())
        .expect("Analysis failed")
        .apply_to(&mut result);
    assert_eq!(result.stable_frame, Some(2));
    assert_eq!(result.stable_frame_time, None);
}
