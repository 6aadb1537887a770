//! # frameshift
//!
//! Split a video into a numbered sequence of still frames, and join such a
//! sequence back into a video.
//!
//! Two interchangeable backends do the work, chosen once per [`Pipeline`] by
//! probing the environment:
//!
//! - **native** — the FFmpeg libraries, linked in-process through
//!   [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) (cargo feature
//!   `native`, on by default). Preferred when available.
//! - **external** — the `ffmpeg` and `ffprobe` executables found on `PATH`.
//!
//! Both write and read the same layout: `frame_000000.jpg`,
//! `frame_000001.jpg`, … (see [`sequence`]).
//!
//! ## Quick Start
//!
//! ```no_run
//! use frameshift::{FrameRate, Pipeline, PipelineOptions};
//!
//! let pipeline = Pipeline::new(PipelineOptions::default())?;
//!
//! // Video → frames
//! let extracted = pipeline.extract("input.mp4", "frames")?;
//! println!("{} frames at {} fps", extracted.frame_count, extracted.frame_rate);
//!
//! // Frames → video
//! pipeline.assemble("frames", "output.mp4", FrameRate::validate(24.0)?)?;
//! # Ok::<(), frameshift::FrameshiftError>(())
//! ```
//!
//! ## Frame rates
//!
//! Extraction reports the source rate as a [`FrameRate`], an exact rational
//! such as `24000/1001`. Assembly takes one from the caller; the CLI defaults
//! to [`DEFAULT_FRAME_RATE`].
//!
//! ## Requirements
//!
//! Either FFmpeg development libraries at build time (for the native
//! backend) or the FFmpeg executables at run time (for the external
//! backend).

pub mod backend;
pub mod capability;
pub mod configuration;
#[cfg(feature = "native")]
mod encode;
pub mod error;
pub mod external;
pub mod ffmpeg;
pub mod frame_rate;
#[cfg(feature = "native")]
pub mod native;
pub mod pipeline;
pub mod progress;
pub mod sequence;
#[cfg(feature = "native")]
mod utilities;

pub use backend::{ExtractedFrames, FrameBackend};
pub use capability::{BackendKind, CapabilityMap};
pub use configuration::{PipelineOptions, VideoCodec};
pub use error::FrameshiftError;
pub use external::ExternalBackend;
#[cfg(feature = "native")]
pub use ffmpeg::set_ffmpeg_log_level;
pub use ffmpeg::FfmpegLogLevel;
pub use frame_rate::{DEFAULT_FRAME_RATE, FrameRate};
#[cfg(feature = "native")]
pub use native::NativeBackend;
pub use pipeline::{AssemblySummary, ExtractionSummary, Pipeline};
pub use progress::{OperationType, ProgressCallback, ProgressInfo};
pub use sequence::{FrameFile, FrameSequence};
