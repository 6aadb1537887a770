use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use frameshift::{
    CapabilityMap, FfmpegLogLevel, FrameRate, FrameSequence, Pipeline, PipelineOptions,
    ProgressCallback, ProgressInfo, VideoCodec,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  frameshift extract input.mp4 frames --progress\n  frameshift join frames output.mp4 --fps 24000/1001\n  frameshift detect --json\n  frameshift completions zsh > _frameshift";

#[derive(Debug, Parser)]
#[command(
    name = "frameshift",
    version,
    about = "Split videos into numbered frames and join frames back into videos",
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
    /// Show additional logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow `extract` to write into a directory that already holds frames.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<FfmpegLogLevel>,

    /// Codec used by `join` (h264, mpeg4).
    #[arg(long, global = true)]
    codec: Option<VideoCodec>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Split a video into numbered JPEG frames.
    #[command(
        about = "Extract video frames",
        after_help = "Examples:\n  frameshift extract input.mp4 frames\n  frameshift extract input.mp4 frames --json"
    )]
    Extract {
        /// Input video path.
        input: PathBuf,
        /// Output directory for frame images (created if missing).
        output: PathBuf,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Join numbered frames into a video.
    #[command(
        about = "Join frames into a video",
        after_help = "Examples:\n  frameshift join frames output.mp4\n  frameshift join frames output.mp4 --fps 29.97"
    )]
    Join {
        /// Directory holding frame_NNNNNN.jpg files.
        input: PathBuf,
        /// Output video path; the container follows the extension.
        output: PathBuf,
        /// Frames per second, as a number or a ratio such as 24000/1001.
        #[arg(long, default_value_t = FrameRate::default())]
        fps: FrameRate,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Report which backends are usable.
    #[command(about = "Show available backends", visible_alias = "doctor")]
    Detect {
        /// Print the capability map as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Draws a spinner while extracting and a bar once the total is known.
struct TerminalProgress {
    bar: ProgressBar,
    bar_style: ProgressStyle,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template(
            "{spinner:.green} {pos} frame(s) {msg}",
        )?);
        let bar_style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?
                .progress_chars("##-");
        Ok(Self { bar, bar_style })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            if self.bar.length() != Some(total) {
                self.bar.set_length(total);
                self.bar.set_style(self.bar_style.clone());
            }
        }
        self.bar.set_position(info.current);
        if info.finished {
            self.bar.finish_with_message("done");
        }
    }
}

/// Prints one line per reporting interval when no bar is drawn.
struct LineProgress<W> {
    out: Mutex<W>,
}

impl<W> LineProgress<W> {
    fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl<W: Write + Send> ProgressCallback for LineProgress<W> {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.finished {
            return;
        }
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "Processed {} frame(s)...", info.current);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn pipeline_options(global: &GlobalOptions) -> Result<PipelineOptions, Box<dyn std::error::Error>> {
    let mut options = PipelineOptions::new();

    if let Some(level) = global.log_level {
        options = options.with_ffmpeg_log_level(level);
    }
    if let Some(codec) = global.codec {
        options = options.with_codec(codec);
    }

    options = if global.progress {
        options.with_progress(Arc::new(TerminalProgress::new()?))
    } else {
        options.with_progress(Arc::new(LineProgress::new(io::stderr())))
    };

    Ok(options)
}

fn warn(message: String) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.yellow());
}

/// Refuse to mix a new extraction with frames already in `output`.
fn check_extract_output(output: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if output.is_dir() && !FrameSequence::scan(output)?.is_empty() {
        if !overwrite {
            return Err(format!(
                "output directory already holds frames: {} (use --overwrite)",
                output.display()
            )
            .into());
        }
        warn(format!("writing into existing frames in {}", output.display()));
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    match cli.command {
        Commands::Extract {
            input,
            output,
            json,
        } => {
            check_extract_output(&output, cli.global.overwrite)?;

            let pipeline = Pipeline::new(pipeline_options(&cli.global)?)?;
            let summary = pipeline.extract(&input, &output)?;

            if json {
                let payload = json!({
                    "backend": summary.backend.name(),
                    "frame_count": summary.frame_count,
                    "fps": summary.frame_rate.as_f64(),
                    "frame_rate": summary.frame_rate.to_string(),
                    "output": output,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} {}",
                    "success:".green().bold(),
                    format!(
                        "Extracted {} frame(s) at {:.3} fps to {}",
                        summary.frame_count,
                        summary.frame_rate.as_f64(),
                        output.display()
                    )
                    .green()
                );
            }
        }
        Commands::Join {
            input,
            output,
            fps,
            json,
        } => {
            if output.exists() {
                log::info!("Replacing {}", output.display());
            }

            let pipeline = Pipeline::new(pipeline_options(&cli.global)?)?;
            let summary = pipeline.assemble(&input, &output, fps)?;

            if json {
                let payload = json!({
                    "backend": summary.backend.name(),
                    "frame_count": summary.frame_count,
                    "fps": summary.frame_rate.as_f64(),
                    "frame_rate": summary.frame_rate.to_string(),
                    "output": summary.output_path,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} {}",
                    "saved".green().bold(),
                    format!(
                        "{} ({} frame(s) at {} fps)",
                        summary.output_path.display(),
                        summary.frame_count,
                        summary.frame_rate
                    )
                );
            }
        }
        Commands::Detect { json } => {
            let capabilities = CapabilityMap::detect();
            let preferred = capabilities.preferred();

            if json {
                let payload = json!({
                    "native": capabilities.native,
                    "external": capabilities.external,
                    "selected": preferred.map(|kind| kind.name()),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                let mark = |available: bool| {
                    if available {
                        "available".green()
                    } else {
                        "missing".red()
                    }
                };
                println!("native (FFmpeg libraries):    {}", mark(capabilities.native));
                println!("external (ffmpeg, ffprobe):   {}", mark(capabilities.external));
                match preferred {
                    Some(kind) => println!("selected: {}", kind.name().bold()),
                    None => return Err(frameshift::FrameshiftError::NoBackendAvailable.into()),
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "frameshift", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::Parser;
    use frameshift::{OperationType, ProgressCallback, ProgressInfo, sequence};

    use super::{Cli, Commands, LineProgress, check_extract_output};

    #[test]
    fn join_defaults_to_thirty_fps() {
        let cli = Cli::try_parse_from(["frameshift", "join", "frames", "out.mp4"]).unwrap();
        match cli.command {
            Commands::Join { fps, .. } => assert_eq!(fps.to_string(), "30"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn join_accepts_rational_fps() {
        let cli = Cli::try_parse_from([
            "frameshift",
            "join",
            "frames",
            "out.mp4",
            "--fps",
            "24000/1001",
        ])
        .unwrap();
        match cli.command {
            Commands::Join { fps, .. } => {
                assert_eq!((fps.numerator(), fps.denominator()), (24000, 1001))
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn join_rejects_invalid_fps() {
        assert!(
            Cli::try_parse_from(["frameshift", "join", "frames", "out.mp4", "--fps", "0"]).is_err()
        );
        assert!(
            Cli::try_parse_from(["frameshift", "join", "frames", "out.mp4", "--fps", "2*12"])
                .is_err()
        );
    }

    #[test]
    fn global_options_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "frameshift",
            "extract",
            "in.mp4",
            "frames",
            "--log-level",
            "quiet",
            "--codec",
            "mpeg4",
        ])
        .unwrap();
        assert_eq!(cli.global.log_level, Some(frameshift::FfmpegLogLevel::Quiet));
        assert_eq!(cli.global.codec, Some(frameshift::VideoCodec::Mpeg4));
    }

    #[test]
    fn extract_refuses_directories_with_frames_unless_overwriting() {
        let scratch = tempfile::tempdir().expect("Failed to create temp dir");
        assert!(check_extract_output(&scratch.path().join("missing"), false).is_ok());
        assert!(check_extract_output(scratch.path(), false).is_ok());

        fs::write(scratch.path().join("notes.txt"), b"").unwrap();
        assert!(check_extract_output(scratch.path(), false).is_ok());

        fs::write(
            scratch.path().join(sequence::frame_file_name(0).unwrap()),
            b"",
        )
        .unwrap();
        let error = check_extract_output(scratch.path(), false).unwrap_err();
        assert!(error.to_string().contains("--overwrite"), "{error}");
        assert!(check_extract_output(scratch.path(), true).is_ok());
    }

    #[test]
    fn line_progress_prints_every_report_but_the_last() {
        let progress = LineProgress::new(Vec::new());
        for (current, finished) in [(100, false), (200, false), (250, true)] {
            progress.on_progress(&ProgressInfo {
                operation: OperationType::FrameExtraction,
                current,
                total: None,
                percentage: None,
                elapsed: std::time::Duration::ZERO,
                finished,
            });
        }

        let printed = String::from_utf8(progress.out.into_inner().unwrap()).unwrap();
        assert_eq!(
            printed,
            "Processed 100 frame(s)...\nProcessed 200 frame(s)...\n"
        );
    }
}
