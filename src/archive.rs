//! Core [`CaptureArchive`] implementation.
//!
//! A capture archive is a zip container holding a `metadata.json` record,
//! one PNG per captured frame under `images/`, and optionally the raw
//! movie the frames were extracted from. [`CaptureArchive::open`]
//! validates the metadata, decodes every frame in natural-sort order and
//! crops it to the capture's bounding box. The result is immutable.
//!
//! # Example
//!
//! ```no_run
//! use videocapture::{CaptureArchive, CaptureError};
//!
//! let capture = CaptureArchive::open("metric-test-fennec-1334072000.zip")?;
//! println!(
//!     "{} frames from {} at {:?}",
//!     capture.num_frames(),
//!     capture.metadata().device,
//!     capture.dimensions().size(),
//! );
//! # Ok::<(), CaptureError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use serde_json::Value;
use zip::{ZipArchive, result::ZipError};

use crate::{
    configuration::AnalysisOptions,
    dimensions::{CaptureDimensions, DimensionProfile},
    error::CaptureError,
    frame::Frame,
    metadata::CaptureMetadata,
    ordering::natural_sort,
    progress::{OperationType, ProgressTracker},
    validation::{ValidationReport, validate_capture},
};

/// Archive entry holding the metadata record.
pub const METADATA_ENTRY: &str = "metadata.json";
/// Namespace of frame entries.
pub const FRAME_PREFIX: &str = "images/";
/// Entries under [`FRAME_PREFIX`] no longer than this are directory markers.
pub const MIN_FRAME_ENTRY_LEN: usize = 8;
/// Archive entry holding the raw movie.
pub const MOVIE_ENTRY: &str = "movie.avi";

/// A loaded capture: metadata, bounding box, and every cropped frame.
pub struct CaptureArchive {
    path: PathBuf,
    metadata: CaptureMetadata,
    profile: DimensionProfile,
    dimensions: CaptureDimensions,
    /// Native size of the first decoded frame, before cropping.
    native_size: Option<(u32, u32)>,
    frames: Vec<Frame>,
    movie: Option<Vec<u8>>,
}

impl Debug for CaptureArchive {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CaptureArchive")
            .field("path", &self.path)
            .field("metadata", &self.metadata)
            .field("profile", &self.profile)
            .field("dimensions", &self.dimensions)
            .field("native_size", &self.native_size)
            .field("frames", &self.frames.len())
            .field("movie_bytes", &self.movie.as_ref().map(Vec::len))
            .finish()
    }
}

impl CaptureArchive {
    /// Open and fully decode a capture archive.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Format`] if the file does not exist, is not a
    /// zip archive, or its metadata lacks a truthy `version` or a `device`;
    /// no frame is decoded in that case. Returns [`CaptureError::Decode`] if
    /// any frame entry is not a readable image.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        Self::open_with_options(path, &AnalysisOptions::default())
    }

    /// Like [`open`](Self::open), reporting decode progress through the
    /// options' callback.
    pub fn open_with_options<P: AsRef<Path>>(
        path: P,
        options: &AnalysisOptions,
    ) -> Result<Self, CaptureError> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Opening capture archive: {}", path.display());

        if !path.exists() {
            return Err(CaptureError::format(&path, "capture file does not exist"));
        }

        let file = File::open(&path)
            .map_err(|error| CaptureError::format(&path, error.to_string()))?;
        let mut archive = ZipArchive::new(BufReader::new(file))
            .map_err(|error| CaptureError::format(&path, format!("not a capture archive: {error}")))?;

        let metadata = read_metadata(&mut archive, &path)?;
        let profile = DimensionProfile::for_device(&metadata.device);
        log::debug!(
            "Capture from device {:?} (version {}), profile {:?}",
            metadata.device,
            metadata.version,
            profile
        );

        let entries = frame_entries(&archive);
        let decoded = decode_frames(&mut archive, &entries, &profile, options)?;
        if let Some((width, height)) = decoded.native_size {
            if !decoded.dimensions.fits_within(width, height) {
                log::warn!(
                    "Bounding box {:?} exceeds native frame size {}x{}; frames were padded",
                    decoded.dimensions.bbox(),
                    width,
                    height
                );
            }
        }
        let DecodedFrames {
            frames,
            dimensions,
            native_size,
        } = decoded;

        let movie = read_optional_entry(&mut archive, MOVIE_ENTRY, &path)?;

        log::info!(
            "Loaded {} frames ({}x{}) from {}",
            entries.len(),
            dimensions.width(),
            dimensions.height(),
            path.display()
        );

        Ok(Self {
            path,
            metadata,
            profile,
            dimensions,
            native_size,
            frames,
            movie,
        })
    }

    /// Path the archive was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validated `metadata.json` record.
    pub fn metadata(&self) -> &CaptureMetadata {
        &self.metadata
    }

    /// Whether the bounding box came from a device profile or was inferred.
    pub fn profile(&self) -> &DimensionProfile {
        &self.profile
    }

    /// Bounding box every frame was cropped to.
    pub fn dimensions(&self) -> CaptureDimensions {
        self.dimensions
    }

    /// Native size of the frames before cropping, if any frame exists.
    pub fn native_size(&self) -> Option<(u32, u32)> {
        self.native_size
    }

    /// Frames in capture order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Number of decoded frames.
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Raw movie bytes, if the archive carries a movie.
    pub fn movie(&self) -> Option<&[u8]> {
        self.movie.as_deref()
    }

    /// Copy the raw movie to `output` and flush it.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Format`] if the capture has no movie entry,
    /// or an I/O error if writing or flushing fails.
    pub fn write_video<W: Write>(&self, output: &mut W) -> Result<(), CaptureError> {
        let movie = self
            .movie
            .as_deref()
            .ok_or_else(|| CaptureError::format(&self.path, "capture has no movie entry"))?;
        output.write_all(movie)?;
        output.flush()?;
        Ok(())
    }

    /// Write the raw movie to a new file at `path`.
    ///
    /// The file is flushed before returning, so a short write surfaces as an
    /// error instead of a truncated video.
    pub fn save_video<P: AsRef<Path>>(&self, path: P) -> Result<(), CaptureError> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_video(&mut writer)?;
        log::debug!("Wrote movie to {}", path.display());
        Ok(())
    }

    /// Wall-clock capture length derived from the metadata.
    pub fn capture_duration(&self) -> Option<Duration> {
        self.metadata.capture_duration(self.frames.len())
    }

    /// Time each captured frame covers, if the metadata says.
    pub fn frame_interval(&self) -> Option<Duration> {
        self.metadata.frame_interval(self.frames.len())
    }

    /// Inspect the loaded capture for problems that would skew metrics.
    pub fn validate(&self) -> ValidationReport {
        validate_capture(self)
    }
}

fn read_metadata<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    path: &Path,
) -> Result<CaptureMetadata, CaptureError> {
    let bytes = read_optional_entry(archive, METADATA_ENTRY, path)?.ok_or_else(|| {
        CaptureError::format(path, "does not appear to be a capture file (no metadata)")
    })?;

    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|error| CaptureError::format(path, format!("metadata is not valid JSON: {error}")))?;

    CaptureMetadata::from_value(value).map_err(|reason| {
        CaptureError::format(
            path,
            format!("does not appear to be a capture file ({reason})"),
        )
    })
}

fn read_optional_entry<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    path: &Path,
) -> Result<Option<Vec<u8>>, CaptureError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(error) => {
            return Err(CaptureError::format(
                path,
                format!("cannot read {name}: {error}"),
            ));
        }
    };

    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut bytes)
        .map_err(|error| CaptureError::format(path, format!("cannot read {name}: {error}")))?;
    Ok(Some(bytes))
}

/// Frame entry names in capture order.
fn frame_entries<R: Read + std::io::Seek>(archive: &ZipArchive<R>) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|name| is_frame_entry(name))
        .map(str::to_string)
        .collect();
    natural_sort(&mut names);
    names
}

pub(crate) fn is_frame_entry(name: &str) -> bool {
    name.starts_with(FRAME_PREFIX) && name.len() > MIN_FRAME_ENTRY_LEN
}

struct DecodedFrames {
    frames: Vec<Frame>,
    dimensions: CaptureDimensions,
    native_size: Option<(u32, u32)>,
}

/// Decode every entry, resolving the bounding box from the first frame and
/// cropping each frame as soon as it is decoded.
fn decode_frames<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    entries: &[String],
    profile: &DimensionProfile,
    options: &AnalysisOptions,
) -> Result<DecodedFrames, CaptureError> {
    let mut tracker = ProgressTracker::new(
        options.progress.clone(),
        OperationType::FrameDecoding,
        Some(entries.len() as u64),
        options.batch_size,
    );

    let mut frames = Vec::with_capacity(entries.len());
    let mut native_size = None;
    let mut dimensions = profile.resolve(None);

    for (index, name) in entries.iter().enumerate() {
        let decode_error = |reason: String| CaptureError::Decode {
            entry: name.clone(),
            index,
            reason,
        };

        let mut bytes = Vec::new();
        archive
            .by_name(name)
            .map_err(|error| decode_error(error.to_string()))?
            .read_to_end(&mut bytes)
            .map_err(|error| decode_error(error.to_string()))?;

        let image = image::load_from_memory(&bytes)
            .map_err(|error| decode_error(error.to_string()))?
            .to_rgba8();

        if native_size.is_none() {
            native_size = Some(image.dimensions());
            dimensions = profile.resolve(native_size);
        }
        let crop = dimensions.unwrap_or(CaptureDimensions::full_frame(0, 0));
        frames.push(Frame::new(index, crop.crop(&image)));
        tracker.advance(Some(index as u64));
    }
    tracker.finish();

    Ok(DecodedFrames {
        frames,
        dimensions: dimensions.unwrap_or(CaptureDimensions::full_frame(0, 0)),
        native_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_entry_filter() {
        assert!(is_frame_entry("images/frame1.png"));
        assert!(is_frame_entry("images/1.png"));
        assert!(!is_frame_entry("images/"));
        assert!(!is_frame_entry("images/a"));
        assert!(!is_frame_entry("movie.avi"));
        assert!(!is_frame_entry("metadata.json"));
    }
}
