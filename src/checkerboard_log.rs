//! Renderer checkerboard log parsing.
//!
//! An instrumented renderer writes, once per second, how much of the
//! screen it managed to paint:
//!
//! ```text
//! I/GeckoLayerRendererProf( 2345): 1000ms: 87.5/100 (checkerboard)
//! ```
//!
//! [`CheckerboardLogParser`] streams such a log and accumulates
//! `total - amount` over every matching line, giving a checkerboard score
//! that is independent of the frame-based measurement. Lines that do not
//! match are diagnostic noise and are skipped.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use regex::Regex;

use crate::error::CaptureError;

/// Marker emitted by the renderer's profiling output.
pub const DEFAULT_MARKER: &str = "GeckoLayerRendererProf";

/// Streaming parser for checkerboard logs.
#[derive(Debug, Clone)]
pub struct CheckerboardLogParser {
    pattern: Regex,
}

impl Default for CheckerboardLogParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckerboardLogParser {
    /// Parser matching [`DEFAULT_MARKER`].
    pub fn new() -> Self {
        Self::with_marker(DEFAULT_MARKER).expect("default checkerboard pattern compiles")
    }

    /// Parser matching lines that contain `marker` (taken literally).
    pub fn with_marker(marker: &str) -> Result<Self, CaptureError> {
        let pattern = Regex::new(&format!(
            r"{}.*1000ms:.*?\s([0-9]+(?:\.[0-9]+)?)/([0-9]+(?:\.[0-9]+)?)",
            regex::escape(marker)
        ))
        .map_err(|error| CaptureError::InvalidConfiguration(error.to_string()))?;
        Ok(Self { pattern })
    }

    /// `(amount, total)` from a single line, if it matches.
    pub fn parse_line(&self, line: &str) -> Option<(f64, f64)> {
        let captures = self.pattern.captures(line)?;
        let amount = captures.get(1)?.as_str().parse().ok()?;
        let total = captures.get(2)?.as_str().parse().ok()?;
        Some((amount, total))
    }

    /// Accumulate `total - amount` over every matching line.
    ///
    /// The log is read one line at a time; invalid UTF-8 is replaced rather
    /// than rejected. Only read failures are reported.
    pub fn parse<R: BufRead>(&self, mut reader: R) -> Result<f64, CaptureError> {
        let mut score = 0.0;
        let mut matched = 0usize;
        let mut line = Vec::new();

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            let text = String::from_utf8_lossy(&line);
            if let Some((amount, total)) = self.parse_line(text.trim_end()) {
                score += total - amount;
                matched += 1;
            }
        }

        log::debug!("Checkerboard log: {matched} matching lines, score {score}");
        Ok(score)
    }

    /// Open `path` and [`parse`](Self::parse) it.
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<f64, CaptureError> {
        let file = File::open(path.as_ref())?;
        self.parse(BufReader::new(file))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn accumulates_matching_lines() {
        let log = "foo GeckoLayerRendererProf bar 1000ms: 30.0/100.0\nunrelated\n";
        let score = CheckerboardLogParser::new().parse(Cursor::new(log)).unwrap();
        assert_eq!(score, 70.0);
    }

    #[test]
    fn empty_and_noise_only_logs_score_zero() {
        let parser = CheckerboardLogParser::new();
        assert_eq!(parser.parse(Cursor::new("")).unwrap(), 0.0);
        assert_eq!(
            parser
                .parse(Cursor::new("D/dalvikvm: GC freed\n1000ms: 1.0/2.0\n"))
                .unwrap(),
            0.0
        );
    }

    #[test]
    fn sums_across_lines() {
        let log = "\
I/GeckoLayerRendererProf( 2345): 1000ms: 87.5/100 (checkerboard)
I/GeckoLayerRendererProf( 2345): 1000ms: 100.0/100
I/ActivityManager( 99): Displayed org.mozilla.fennec
I/GeckoLayerRendererProf( 2345): 1000ms: 90/100
";
        let score = CheckerboardLogParser::new().parse(Cursor::new(log)).unwrap();
        assert!((score - 22.5).abs() < 1e-9);
    }

    #[test]
    fn tolerates_invalid_utf8() {
        let mut log = b"\xff\xfe garbage\n".to_vec();
        log.extend_from_slice(b"x GeckoLayerRendererProf y 1000ms: 40.0/50.0");
        let score = CheckerboardLogParser::new().parse(Cursor::new(log)).unwrap();
        assert_eq!(score, 10.0);
    }

    #[test]
    fn custom_marker_is_literal() {
        let parser = CheckerboardLogParser::with_marker("Prof(x)").unwrap();
        assert_eq!(parser.parse_line("Prof(x) 1000ms: 1.5/2.5"), Some((1.5, 2.5)));
        assert_eq!(parser.parse_line("Profx 1000ms: 1.5/2.5"), None);
    }

    #[test]
    fn requires_interval_marker() {
        let parser = CheckerboardLogParser::new();
        assert_eq!(parser.parse_line("GeckoLayerRendererProf 500ms: 1.0/2.0"), None);
    }
}
