use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use image::Rgba;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use videocapture::{
    AnalysisMode, AnalysisOptions, CaptureAnalysis, CaptureArchive, CheckerboardLogParser,
    DimensionProfile, ProgressCallback, ProgressInfo, RunResult, analyze_capture, report,
};

const CLI_AFTER_HELP: &str = "Examples:\n  videocapture info capture.zip --json\n  videocapture analyze capture.zip --progress\n  videocapture analyze capture.zip --startup --report results.json --key org.mozilla.fennec\n  videocapture parse-log checkerboard.log\n  videocapture completions zsh > _videocapture";

#[derive(Debug, Parser)]
#[command(
    name = "videocapture",
    version,
    about = "Score UI rendering performance from recorded screen captures",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output (overridden by RUST_LOG).
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar while decoding and comparing frames.
    #[arg(long)]
    progress: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print capture metadata and validation results.
    #[command(
        about = "Print capture metadata",
        visible_alias = "probe",
        after_help = "Examples:\n  videocapture info capture.zip\n  videocapture info capture.zip --json"
    )]
    Info {
        /// Capture archive path.
        input: PathBuf,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Compute rendering metrics for a capture.
    #[command(
        about = "Analyse a capture",
        after_help = "Examples:\n  videocapture analyze capture.zip --threshold 16\n  videocapture analyze capture.zip --log checkerboard.log --report out.json --key 2012-04-10"
    )]
    Analyze {
        /// Capture archive path.
        input: PathBuf,
        /// Measure startup stabilisation instead of steady-state metrics.
        #[arg(long)]
        startup: bool,
        /// Differing pixels a frame needs to count as unique.
        #[arg(long, default_value_t = 0)]
        threshold: u64,
        /// Differing pixels tolerated once the display is stable.
        #[arg(long, default_value_t = 0)]
        stable_threshold: u64,
        /// Checkerboard colour as RRGGBB hex.
        #[arg(long)]
        checkerboard_color: Option<String>,
        /// Renderer checkerboard log to score alongside the capture.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Copy the capture's movie to this path.
        #[arg(long)]
        export_video: Option<PathBuf>,
        /// Append the run to this JSON report.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Report key (defaults to the device identifier).
        #[arg(long, requires = "report")]
        key: Option<String>,
        /// Title for a newly created report.
        #[arg(long, requires = "report")]
        title: Option<String>,
        /// Print the run as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Score a renderer checkerboard log.
    #[command(about = "Parse a checkerboard log")]
    ParseLog {
        /// Log file path.
        input: PathBuf,
        /// Marker token identifying checkerboard lines.
        #[arg(long)]
        marker: Option<String>,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(global: &GlobalOptions) {
    let default_filter = if global.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_color(value: &str) -> Option<Rgba<u8>> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
    Some(Rgba([channel(0..2)?, channel(2..4)?, channel(4..6)?, 255]))
}

fn ensure_parent_exists(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("creating {}", parent.display()).yellow()
            );
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
        self.bar.set_message(format!("{:?}", info.operation));
    }
}

fn analysis_options(
    global: &GlobalOptions,
    threshold: u64,
    stable_threshold: u64,
    checkerboard_color: Option<&str>,
) -> Result<(AnalysisOptions, Option<ProgressBar>), Box<dyn std::error::Error>> {
    let mut options = AnalysisOptions::new()
        .with_unique_threshold(threshold)
        .with_stable_threshold(stable_threshold);

    if let Some(color) = checkerboard_color {
        let parsed =
            parse_color(color).ok_or(format!("unsupported --checkerboard-color: {color}"))?;
        options = options.with_checkerboard_color(parsed);
    }

    let mut bar = None;
    if global.progress {
        let progress = TerminalProgress::new()?;
        bar = Some(progress.bar.clone());
        options = options.with_progress(Arc::new(progress));
    }

    Ok((options, bar))
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.global);

    match cli.command {
        Commands::Info { input, json } => {
            let capture = CaptureArchive::open(&input)?;
            let metadata = capture.metadata();
            let dims = capture.dimensions();
            let validation = capture.validate();
            let profile = match capture.profile() {
                DimensionProfile::Named(device) => device.as_str(),
                DimensionProfile::Inferred => "inferred",
            };

            if json {
                let payload = json!({
                    "path": capture.path(),
                    "version": metadata.version,
                    "device": metadata.device,
                    "profile": profile,
                    "bbox": [dims.x0, dims.y0, dims.x1, dims.y1],
                    "width": dims.width(),
                    "height": dims.height(),
                    "frames": capture.num_frames(),
                    "duration_seconds": capture.capture_duration().map(|d| d.as_secs_f64()),
                    "has_movie": capture.movie().is_some(),
                    "valid": validation.is_valid(),
                    "warnings": validation.warnings,
                    "errors": validation.errors,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{}", "Capture".bold().cyan());
                println!("  Path: {}", capture.path().display());
                println!("  Device: {}", metadata.device);
                println!("  Version: {}", metadata.version);
                println!("  Profile: {profile}");
                println!(
                    "  Bounding box: {:?} ({}x{})",
                    dims.bbox(),
                    dims.width(),
                    dims.height()
                );
                println!("  Frames: {}", capture.num_frames());
                if let Some(duration) = capture.capture_duration() {
                    println!("  Duration: {:.2}s", duration.as_secs_f64());
                }
                println!();
                print!("{validation}");
            }
        }
        Commands::Analyze {
            input,
            startup,
            threshold,
            stable_threshold,
            checkerboard_color,
            log,
            export_video,
            report: report_path,
            key,
            title,
            json,
        } => {
            let (options, bar) = analysis_options(
                &cli.global,
                threshold,
                stable_threshold,
                checkerboard_color.as_deref(),
            )?;

            let capture = CaptureArchive::open_with_options(&input, &options)?;
            let mode = if startup {
                AnalysisMode::Startup
            } else {
                AnalysisMode::SteadyState
            };
            let analysis = analyze_capture(&capture, mode, &options)?;
            if let Some(bar) = bar {
                bar.finish_and_clear();
            }

            let mut result = RunResult {
                file: Some(input.clone()),
                ..RunResult::default()
            };
            analysis.apply_to(&mut result);

            if let Some(log_path) = &log {
                result.internal_checkerboard =
                    Some(CheckerboardLogParser::new().parse_file(log_path)?);
            }

            if let Some(video_path) = &export_video {
                ensure_parent_exists(video_path)?;
                capture.save_video(video_path)?;
                result.video = Some(video_path.clone());
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_analysis(&analysis, &result);
            }

            if let Some(report_path) = &report_path {
                ensure_parent_exists(report_path)?;
                let key = key.unwrap_or_else(|| capture.metadata().device.clone());
                let title = title.unwrap_or_else(|| {
                    input
                        .file_stem()
                        .map(|stem| stem.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "capture".to_string())
                });
                let merged = report::append_runs(report_path, &title, &key, vec![result])?;
                eprintln!(
                    "{} {} run(s) under {:?} in {}",
                    "report:".green().bold(),
                    merged.runs(&key).len(),
                    key,
                    report_path.display()
                );
            }
        }
        Commands::ParseLog { input, marker } => {
            let parser = match marker {
                Some(marker) => CheckerboardLogParser::with_marker(&marker)?,
                None => CheckerboardLogParser::new(),
            };
            let score = parser.parse_file(&input)?;
            println!("Internal checkerboard (sum of percents, not percentage): {score}");
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "videocapture", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn print_analysis(analysis: &CaptureAnalysis, result: &RunResult) {
    match analysis {
        CaptureAnalysis::SteadyState {
            unique_frames,
            fps,
            checkerboard,
        } => {
            println!(
                "{} {} ({} processed)",
                "Unique frames:".bold(),
                unique_frames.unique,
                unique_frames.processed
            );
            match fps {
                Some(fps) => println!("{} {fps:.2}", "Unique frames per second:".bold()),
                None => println!(
                    "{} {}",
                    "Unique frames per second:".bold(),
                    "unavailable (no timing metadata)".yellow()
                ),
            }
            println!(
                "{} {checkerboard:.2}",
                "Checkerboard area/duration (sum of percents NOT percentage):".bold()
            );
        }
        CaptureAnalysis::Startup { stable_frame } => match stable_frame {
            Some(stable) => {
                print!("{} {}", "First stable frame:".bold(), stable.index);
                match stable.time {
                    Some(time) => println!(" ({:.3}s)", time.as_secs_f64()),
                    None => println!(),
                }
            }
            None => println!("{} {}", "First stable frame:".bold(), "none (no frames)".yellow()),
        },
    }

    if let Some(internal) = result.internal_checkerboard {
        println!(
            "{} {internal:.2}",
            "Internal checkerboard (sum of percents, not percentage):".bold()
        );
    }
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::parse_color;
    use image::Rgba;

    #[test]
    fn parse_color_forms() {
        assert_eq!(parse_color("ff00ff"), Some(Rgba([255, 0, 255, 255])));
        assert_eq!(parse_color("#102030"), Some(Rgba([16, 32, 48, 255])));
        assert_eq!(parse_color("fff"), None);
        assert_eq!(parse_color("gg0000"), None);
    }
}
