//! Pipeline configuration.
//!
//! [`PipelineOptions`] is a builder that threads the progress callback,
//! reporting cadence, output codec, and FFmpeg verbosity through both
//! backends without widening every signature.
//!
//! # Example
//!
//! ```
//! use frameshift::{FfmpegLogLevel, PipelineOptions, VideoCodec};
//!
//! let options = PipelineOptions::new()
//!     .with_progress_interval(50)
//!     .with_codec(VideoCodec::Mpeg4)
//!     .with_ffmpeg_log_level(FfmpegLogLevel::Quiet);
//! assert_eq!(options.progress_interval(), 50);
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    str::FromStr,
    sync::Arc,
};

use crate::{
    ffmpeg::FfmpegLogLevel,
    progress::{NoOpProgress, ProgressCallback},
};

/// Default number of frames between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100;

/// Codec used when assembling frames into a video.
///
/// Output is always encoded as YUV420P.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoCodec {
    /// H.264 / AVC. The default.
    #[default]
    H264,
    /// MPEG-4 Part 2. Built into every libavcodec.
    Mpeg4,
}

impl VideoCodec {
    /// Encoder name as passed to `ffmpeg -c:v`.
    pub fn encoder_name(self) -> &'static str {
        match self {
            VideoCodec::H264 => "libx264",
            VideoCodec::Mpeg4 => "mpeg4",
        }
    }

    #[cfg(feature = "native")]
    pub(crate) fn to_codec_id(self) -> ffmpeg_next::codec::Id {
        match self {
            VideoCodec::H264 => ffmpeg_next::codec::Id::H264,
            VideoCodec::Mpeg4 => ffmpeg_next::codec::Id::MPEG4,
        }
    }
}

impl FromStr for VideoCodec {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "h264" | "avc" | "libx264" => Ok(VideoCodec::H264),
            "mpeg4" | "mp4v" => Ok(VideoCodec::Mpeg4),
            other => Err(format!("unsupported codec: {other}")),
        }
    }
}

/// Configuration shared by extraction and assembly.
///
/// A default-constructed value reports no progress, uses H.264, and keeps
/// FFmpeg quiet except for errors.
#[derive(Clone)]
pub struct PipelineOptions {
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) progress_interval: u64,
    pub(crate) codec: VideoCodec,
    pub(crate) ffmpeg_log_level: FfmpegLogLevel,
}

impl Debug for PipelineOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PipelineOptions")
            .field("progress_interval", &self.progress_interval)
            .field("codec", &self.codec)
            .field("ffmpeg_log_level", &self.ffmpeg_log_level)
            .finish_non_exhaustive()
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            codec: VideoCodec::default(),
            ffmpeg_log_level: FfmpegLogLevel::default(),
        }
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Set how many frames pass between progress reports.
    ///
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Set the codec used for assembly.
    #[must_use]
    pub fn with_codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Set FFmpeg's own console verbosity.
    #[must_use]
    pub fn with_ffmpeg_log_level(mut self, level: FfmpegLogLevel) -> Self {
        self.ffmpeg_log_level = level;
        self
    }

    /// Frames between progress reports.
    pub fn progress_interval(&self) -> u64 {
        self.progress_interval
    }

    /// Codec used for assembly.
    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    /// FFmpeg console verbosity.
    pub fn ffmpeg_log_level(&self) -> FfmpegLogLevel {
        self.ffmpeg_log_level
    }
}
