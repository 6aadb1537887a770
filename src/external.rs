//! Backend that drives the `ffmpeg` and `ffprobe` executables.
//!
//! Extraction spawns two processes: `ffprobe` reports the video stream as
//! JSON, then `ffmpeg` writes the numbered frames with an `fps` filter at the
//! probed rate. Assembly spawns one `ffmpeg` encode. Every spawn blocks until
//! the child exits; `-progress pipe:1` output is read line by line to drive
//! progress callbacks while waiting.

use std::{
    ffi::OsString,
    io::{self, BufRead, BufReader, Read},
    path::Path,
    process::{Command, Stdio},
    thread,
};

use serde::Deserialize;

use crate::{
    backend::{ExtractedFrames, FrameBackend},
    capability::{BackendKind, FFMPEG_EXECUTABLE, FFPROBE_EXECUTABLE},
    configuration::{PipelineOptions, VideoCodec},
    error::FrameshiftError,
    ffmpeg::FfmpegLogLevel,
    frame_rate::FrameRate,
    progress::{OperationType, ProgressTracker},
    sequence::{self, FrameSequence},
};

/// JPEG quality scale passed to `-q:v` (2 is near-lossless).
const JPEG_QUALITY: &str = "2";

/// Backend that spawns FFmpeg command-line tools.
#[derive(Debug, Default)]
pub struct ExternalBackend;

impl ExternalBackend {
    /// Create the backend. Tools are looked up on `PATH` at each spawn.
    pub fn new() -> Self {
        Self
    }

    /// Ask `ffprobe` for the rate of the first video stream.
    fn probe_frame_rate(
        &self,
        video_path: &Path,
        options: &PipelineOptions,
    ) -> Result<FrameRate, FrameshiftError> {
        let unreadable = |reason: String| FrameshiftError::SourceUnreadable {
            path: video_path.to_path_buf(),
            reason,
        };

        let mut command = Command::new(FFPROBE_EXECUTABLE);
        command
            .args(["-v", probe_log_level(options.ffmpeg_log_level)])
            .args(["-print_format", "json", "-show_streams", "-select_streams", "v:0"])
            .arg(video_path);
        log::debug!("Running {command:?}");

        let output = command
            .output()
            .map_err(|error| FrameshiftError::external(format!("cannot run ffprobe: {error}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(unreadable(format!(
                "ffprobe exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_probe_output(&stdout)? {
            Some(frame_rate) => Ok(frame_rate),
            None => Err(unreadable("no video stream".to_string())),
        }
    }
}

impl FrameBackend for ExternalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::External
    }

    fn extract(
        &self,
        video_path: &Path,
        output_dir: &Path,
        options: &PipelineOptions,
    ) -> Result<ExtractedFrames, FrameshiftError> {
        let frame_rate = self.probe_frame_rate(video_path, options)?;
        log::debug!("Probed {} at {frame_rate} fps", video_path.display());

        let mut tracker = ProgressTracker::new(
            options.progress.clone(),
            OperationType::FrameExtraction,
            None,
            options.progress_interval,
        );

        let arguments =
            extract_arguments(video_path, output_dir, frame_rate, options.ffmpeg_log_level);
        run_ffmpeg(&arguments, &mut tracker)?;

        // Over-width names from indices past the limit surface here as errors.
        let frame_count = FrameSequence::scan(output_dir)?.len() as u64;
        tracker.advance_to(frame_count);
        tracker.finish();

        Ok(ExtractedFrames {
            frame_rate,
            frame_count,
        })
    }

    fn assemble(
        &self,
        frames: &FrameSequence,
        output_path: &Path,
        frame_rate: FrameRate,
        options: &PipelineOptions,
    ) -> Result<(), FrameshiftError> {
        if !frames.is_contiguous() {
            log::warn!(
                "Frame indices in {} have gaps; reading them through a glob pattern",
                frames.directory().display()
            );
        }

        let mut tracker = ProgressTracker::new(
            options.progress.clone(),
            OperationType::FrameAssembly,
            Some(frames.len() as u64),
            options.progress_interval,
        );

        let arguments = assemble_arguments(
            frames,
            output_path,
            frame_rate,
            options.codec,
            options.ffmpeg_log_level,
        );
        run_ffmpeg(&arguments, &mut tracker)?;
        tracker.finish();
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Read the video stream rate from `ffprobe -print_format json` output.
///
/// Returns `Ok(None)` when the report lists no video stream.
fn parse_probe_output(json: &str) -> Result<Option<FrameRate>, FrameshiftError> {
    let probe: ProbeOutput = serde_json::from_str(json).map_err(|error| {
        FrameshiftError::external(format!("cannot parse ffprobe output: {error}"))
    })?;

    let Some(stream) = probe
        .streams
        .iter()
        .find(|stream| stream.codec_type.as_deref() == Some("video"))
    else {
        return Ok(None);
    };

    let raw_rate = stream
        .r_frame_rate
        .as_deref()
        .ok_or_else(|| FrameshiftError::InvalidFrameRate("stream reports no frame rate".into()))?;

    match FrameRate::from_metadata(raw_rate) {
        Ok(frame_rate) => Ok(Some(frame_rate)),
        Err(error) => match stream.avg_frame_rate.as_deref().map(FrameRate::from_metadata) {
            Some(Ok(frame_rate)) => Ok(Some(frame_rate)),
            _ => Err(error),
        },
    }
}

/// `ffprobe` must stay quiet enough that failures are readable.
fn probe_log_level(level: FfmpegLogLevel) -> &'static str {
    match level {
        FfmpegLogLevel::Quiet | FfmpegLogLevel::Panic | FfmpegLogLevel::Fatal => level.as_arg(),
        _ => FfmpegLogLevel::Error.as_arg(),
    }
}

fn common_arguments(level: FfmpegLogLevel) -> Vec<OsString> {
    ["-nostdin", "-hide_banner", "-y", "-loglevel", level.as_arg()]
        .into_iter()
        .map(OsString::from)
        .collect()
}

fn progress_arguments() -> [OsString; 3] {
    ["-progress".into(), "pipe:1".into(), "-nostats".into()]
}

fn extract_arguments(
    video_path: &Path,
    output_dir: &Path,
    frame_rate: FrameRate,
    level: FfmpegLogLevel,
) -> Vec<OsString> {
    let mut arguments = common_arguments(level);
    arguments.push("-i".into());
    arguments.push(video_path.into());
    arguments.extend(
        [
            "-map".to_string(),
            "0:v:0".to_string(),
            "-vf".to_string(),
            format!("fps={frame_rate}"),
            "-start_number".to_string(),
            "0".to_string(),
            "-q:v".to_string(),
            JPEG_QUALITY.to_string(),
        ]
        .map(OsString::from),
    );
    arguments.extend(progress_arguments());
    arguments.push(printf_input(output_dir));
    arguments
}

fn assemble_arguments(
    frames: &FrameSequence,
    output_path: &Path,
    frame_rate: FrameRate,
    codec: VideoCodec,
    level: FfmpegLogLevel,
) -> Vec<OsString> {
    let mut arguments = common_arguments(level);
    arguments.push("-framerate".into());
    arguments.push(frame_rate.to_string().into());

    match frames.first() {
        Some(first) if frames.is_contiguous() => {
            arguments.push("-start_number".into());
            arguments.push(first.index.to_string().into());
            arguments.push("-i".into());
            arguments.push(printf_input(frames.directory()));
        }
        _ => {
            arguments.push("-pattern_type".into());
            arguments.push("glob".into());
            arguments.push("-i".into());
            arguments.push(glob_input(frames.directory()));
        }
    }

    arguments.extend(
        ["-c:v", codec.encoder_name(), "-pix_fmt", "yuv420p"].map(OsString::from),
    );
    arguments.extend(progress_arguments());
    arguments.push(output_path.into());
    arguments
}

/// Spawn `ffmpeg`, follow its progress stream, and wait for it to exit.
fn run_ffmpeg(arguments: &[OsString], tracker: &mut ProgressTracker) -> Result<(), FrameshiftError> {
    let mut command = Command::new(FFMPEG_EXECUTABLE);
    command.args(arguments);
    run_with_progress(command, tracker)
}

fn run_with_progress(
    mut command: Command,
    tracker: &mut ProgressTracker,
) -> Result<(), FrameshiftError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    log::debug!("Running {command:?}");

    let mut child = command
        .spawn()
        .map_err(|error| FrameshiftError::external(format!("cannot run ffmpeg: {error}")))?;

    // Drain stderr separately so a chatty log level cannot fill the pipe
    // while stdout is being read.
    let stderr_reader = child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut buffer = String::new();
            let _ = stderr.read_to_string(&mut buffer);
            buffer
        })
    });

    let followed = match child.stdout.take() {
        Some(stdout) => follow_progress(stdout, tracker),
        None => Ok(()),
    };
    if followed.is_err() {
        // Nobody reads the progress pipe any more; stop the child before reaping it.
        let _ = child.kill();
    }

    let status = child.wait()?;
    let stderr = stderr_reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    followed?;

    if status.success() {
        Ok(())
    } else {
        Err(FrameshiftError::external(format!(
            "ffmpeg exited with {status}: {}",
            stderr.trim()
        )))
    }
}

/// Feed the `frame=N` lines of a `-progress` stream to `tracker`.
fn follow_progress(output: impl Read, tracker: &mut ProgressTracker) -> io::Result<()> {
    for line in BufReader::new(output).lines() {
        let line = line?;
        if let Some(frame) = line.strip_prefix("frame=") {
            if let Ok(frame) = frame.trim().parse::<u64>() {
                tracker.advance_to(frame);
            }
        }
    }
    Ok(())
}

/// `directory/pattern` for the image2 muxer and demuxer, which expand `%`.
fn printf_input(directory: &Path) -> OsString {
    escaped_join(directory, sequence::printf_pattern(), |character| {
        character == '%'
    })
}

/// `directory/pattern` for `-pattern_type glob`.
fn glob_input(directory: &Path) -> OsString {
    escaped_join(directory, sequence::glob_pattern(), |character| {
        matches!(character, '\\' | '*' | '?' | '[' | ']' | '{' | '}')
    })
}

/// Escape the directory part only. `%` doubles, glob characters take a
/// backslash. Non UTF-8 directories are passed through unchanged.
fn escaped_join(directory: &Path, pattern: String, special: impl Fn(char) -> bool) -> OsString {
    let Some(text) = directory.to_str() else {
        return directory.join(pattern).into_os_string();
    };

    let mut escaped = String::with_capacity(text.len());
    for character in text.chars() {
        if special(character) {
            escaped.push(if character == '%' { '%' } else { '\\' });
        }
        escaped.push(character);
    }
    Path::new(&escaped).join(pattern).into_os_string()
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        sync::Arc,
        time::{Duration, Instant},
    };

    use super::*;
    use crate::progress::NoOpProgress;

    fn to_strings(arguments: &[OsString]) -> Vec<String> {
        arguments
            .iter()
            .map(|argument| argument.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn probe_output_reads_rational_rate() {
        let json = r#"{
            "streams": [
                { "index": 0, "codec_type": "video", "r_frame_rate": "24000/1001", "avg_frame_rate": "24000/1001" }
            ]
        }"#;
        let frame_rate = parse_probe_output(json).unwrap().unwrap();
        assert_eq!(frame_rate.numerator(), 24000);
        assert_eq!(frame_rate.denominator(), 1001);
    }

    #[test]
    fn probe_output_falls_back_to_average_rate() {
        let json = r#"{"streams": [{"codec_type": "video", "r_frame_rate": "0/0", "avg_frame_rate": "25/1"}]}"#;
        let frame_rate = parse_probe_output(json).unwrap().unwrap();
        assert_eq!(frame_rate.to_string(), "25");
    }

    #[test]
    fn probe_output_rejects_unknown_rate() {
        let json = r#"{"streams": [{"codec_type": "video", "r_frame_rate": "0/0", "avg_frame_rate": "0/0"}]}"#;
        let result = parse_probe_output(json);
        assert!(matches!(result, Err(FrameshiftError::InvalidFrameRate(_))));
    }

    #[test]
    fn probe_output_without_video_stream() {
        let json = r#"{"streams": [{"codec_type": "audio", "r_frame_rate": "0/0"}]}"#;
        assert!(parse_probe_output(json).unwrap().is_none());
        assert!(parse_probe_output("{}").unwrap().is_none());
    }

    #[test]
    fn probe_output_rejects_garbage() {
        let result = parse_probe_output("not json");
        assert!(matches!(
            result,
            Err(FrameshiftError::BackendInvocationFailed {
                backend: BackendKind::External,
                ..
            })
        ));
    }

    #[test]
    fn extract_arguments_start_at_zero() {
        let frame_rate: FrameRate = "30000/1001".parse().unwrap();
        let arguments = to_strings(&extract_arguments(
            Path::new("in.mp4"),
            Path::new("out"),
            frame_rate,
            FfmpegLogLevel::Error,
        ));

        let position = |flag: &str| arguments.iter().position(|a| a == flag).unwrap();
        assert_eq!(arguments[position("-i") + 1], "in.mp4");
        assert_eq!(arguments[position("-vf") + 1], "fps=30000/1001");
        assert_eq!(arguments[position("-start_number") + 1], "0");
        assert_eq!(arguments[position("-loglevel") + 1], "error");
        assert!(arguments.last().unwrap().ends_with("frame_%06d.jpg"));
    }

    #[test]
    fn assemble_arguments_follow_sequence_layout() {
        let directory = tempfile::tempdir().unwrap();
        for index in 3..6 {
            let name = sequence::frame_file_name(index).unwrap();
            fs::write(directory.path().join(name), b"").unwrap();
        }
        let frames = FrameSequence::scan(directory.path()).unwrap();

        let arguments = to_strings(&assemble_arguments(
            &frames,
            Path::new("out.mp4"),
            FrameRate::validate(24.0).unwrap(),
            VideoCodec::H264,
            FfmpegLogLevel::Quiet,
        ));

        let position = |flag: &str| arguments.iter().position(|a| a == flag).unwrap();
        assert_eq!(arguments[position("-framerate") + 1], "24");
        assert_eq!(arguments[position("-start_number") + 1], "3");
        assert_eq!(arguments[position("-c:v") + 1], "libx264");
        assert_eq!(arguments[position("-pix_fmt") + 1], "yuv420p");
        assert!(!arguments.contains(&"glob".to_string()));
        assert_eq!(arguments.last().unwrap(), "out.mp4");
    }

    #[test]
    fn assemble_arguments_use_glob_for_gaps() {
        let directory = tempfile::tempdir().unwrap();
        for index in [0, 2, 7] {
            let name = sequence::frame_file_name(index).unwrap();
            fs::write(directory.path().join(name), b"").unwrap();
        }
        let frames = FrameSequence::scan(directory.path()).unwrap();

        let arguments = to_strings(&assemble_arguments(
            &frames,
            Path::new("out.mp4"),
            FrameRate::default(),
            VideoCodec::Mpeg4,
            FfmpegLogLevel::Error,
        ));

        let position = |flag: &str| arguments.iter().position(|a| a == flag).unwrap();
        assert_eq!(arguments[position("-pattern_type") + 1], "glob");
        assert!(arguments[position("-i") + 1].ends_with("frame_[0-9][0-9][0-9][0-9][0-9][0-9].jpg"));
        assert_eq!(arguments[position("-c:v") + 1], "mpeg4");
        assert_eq!(arguments[position("-framerate") + 1], "30");
    }

    #[test]
    fn probe_level_never_louder_than_error() {
        assert_eq!(probe_log_level(FfmpegLogLevel::Trace), "error");
        assert_eq!(probe_log_level(FfmpegLogLevel::Quiet), "quiet");
    }

    #[cfg(unix)]
    #[test]
    fn pattern_inputs_escape_the_directory() {
        let directory = Path::new("/data/100% [take 2]*?");
        assert_eq!(
            printf_input(directory).to_string_lossy(),
            "/data/100%% [take 2]*?/frame_%06d.jpg"
        );
        assert_eq!(
            glob_input(directory).to_string_lossy(),
            "/data/100% \\[take 2\\]\\*\\?/frame_[0-9][0-9][0-9][0-9][0-9][0-9].jpg"
        );

        let arguments = to_strings(&extract_arguments(
            Path::new("in.mp4"),
            Path::new("/tmp/50%"),
            FrameRate::default(),
            FfmpegLogLevel::Error,
        ));
        assert_eq!(arguments.last().unwrap(), "/tmp/50%%/frame_%06d.jpg");
    }

    #[cfg(unix)]
    #[test]
    fn broken_progress_stream_still_reaps_the_child() {
        let mut command = Command::new("sh");
        command.args(["-c", "printf 'frame=2\\n\\377\\376\\n'; exec sleep 30"]);
        let mut tracker = ProgressTracker::new(
            Arc::new(NoOpProgress),
            OperationType::FrameAssembly,
            None,
            1,
        );

        let started = Instant::now();
        let result = run_with_progress(command, &mut tracker);

        match result {
            Err(FrameshiftError::Io(error)) => {
                assert_eq!(error.kind(), io::ErrorKind::InvalidData)
            }
            other => panic!("expected an I/O error, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(20));
        assert_eq!(tracker.current(), 2);
    }
}
