//! The interface both backends implement.
//!
//! [`Pipeline`](crate::Pipeline) binds one [`FrameBackend`] at construction
//! and dispatches every run to it. Implementations must behave identically
//! from the caller's point of view: same inputs, same result shape, same
//! error taxonomy.

use std::path::Path;

use crate::{
    capability::BackendKind, configuration::PipelineOptions, error::FrameshiftError,
    frame_rate::FrameRate, sequence::FrameSequence,
};

/// Result of a backend extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractedFrames {
    /// Frame rate of the source stream.
    pub frame_rate: FrameRate,
    /// Number of frame files written.
    pub frame_count: u64,
}

/// Extract and assemble operations of one backend.
pub trait FrameBackend {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Write every frame of `video_path` into `output_dir`, named per
    /// [`sequence`](crate::sequence) from index 0.
    ///
    /// `output_dir` must already exist.
    fn extract(
        &self,
        video_path: &Path,
        output_dir: &Path,
        options: &PipelineOptions,
    ) -> Result<ExtractedFrames, FrameshiftError>;

    /// Encode `frames`, in order and each exactly once, into `output_path`
    /// at `frame_rate`.
    ///
    /// `frames` is never empty when called by the pipeline.
    fn assemble(
        &self,
        frames: &FrameSequence,
        output_path: &Path,
        frame_rate: FrameRate,
        options: &PipelineOptions,
    ) -> Result<(), FrameshiftError>;
}
