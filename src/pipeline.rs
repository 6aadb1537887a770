//! Backend selection and dispatch.
//!
//! A [`Pipeline`] detects the available backends once, binds the preferred
//! one for its whole lifetime, and runs extraction and assembly against it.
//! Construction fails with [`FrameshiftError::NoBackendAvailable`] before any
//! filesystem work when nothing is usable.
//!
//! # Example
//!
//! ```no_run
//! use frameshift::{FrameRate, Pipeline, PipelineOptions};
//!
//! let pipeline = Pipeline::new(PipelineOptions::default())?;
//!
//! let extracted = pipeline.extract("input.mp4", "frames")?;
//! println!("{} frames at {} fps", extracted.frame_count, extracted.frame_rate);
//!
//! let joined = pipeline.assemble("frames", "output.mp4", extracted.frame_rate)?;
//! println!("wrote {}", joined.output_path.display());
//! # Ok::<(), frameshift::FrameshiftError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
};

use crate::{
    backend::FrameBackend,
    capability::{BackendKind, CapabilityMap},
    configuration::PipelineOptions,
    error::FrameshiftError,
    external::ExternalBackend,
    frame_rate::FrameRate,
    sequence::FrameSequence,
};

/// Outcome of a successful extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[must_use]
pub struct ExtractionSummary {
    /// Frame rate of the source video.
    pub frame_rate: FrameRate,
    /// Number of frame files written.
    pub frame_count: u64,
    /// Backend that did the work.
    pub backend: BackendKind,
}

/// Outcome of a successful assembly.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct AssemblySummary {
    /// Video file that was written.
    pub output_path: PathBuf,
    /// Number of frame files fed to the encoder.
    pub frame_count: u64,
    /// Rate the video was encoded at.
    pub frame_rate: FrameRate,
    /// Backend that did the work.
    pub backend: BackendKind,
}

/// Splits videos into frames and joins frames into videos.
///
/// Each instance performs its own capability detection. Concurrent runs need
/// separate pipelines and separate output directories.
pub struct Pipeline {
    capabilities: CapabilityMap,
    backend: Box<dyn FrameBackend>,
    options: PipelineOptions,
}

impl Debug for Pipeline {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Pipeline")
            .field("capabilities", &self.capabilities)
            .field("backend", &self.backend.kind())
            .field("options", &self.options)
            .finish()
    }
}

impl Pipeline {
    /// Detect backends and bind the preferred one.
    ///
    /// # Errors
    ///
    /// [`FrameshiftError::NoBackendAvailable`] if neither backend is usable.
    pub fn new(options: PipelineOptions) -> Result<Self, FrameshiftError> {
        Self::with_capabilities(CapabilityMap::detect(), options)
    }

    /// Bind the preferred backend of an already-built capability map.
    ///
    /// # Errors
    ///
    /// [`FrameshiftError::NoBackendAvailable`] if `capabilities` lists no
    /// backend.
    pub fn with_capabilities(
        capabilities: CapabilityMap,
        options: PipelineOptions,
    ) -> Result<Self, FrameshiftError> {
        let kind = capabilities
            .preferred()
            .ok_or(FrameshiftError::NoBackendAvailable)?;
        let backend = instantiate(kind)?;
        log::debug!("Using the {kind} backend");

        Ok(Self {
            capabilities,
            backend,
            options,
        })
    }

    /// The capability map this pipeline was built from.
    pub fn capabilities(&self) -> CapabilityMap {
        self.capabilities
    }

    /// The backend every run is dispatched to.
    pub fn backend(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Options applied to every run.
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Write every frame of `video_path` into `output_dir`.
    ///
    /// Creates `output_dir` if needed. Frames already written are left in
    /// place when a run fails.
    ///
    /// # Errors
    ///
    /// - [`FrameshiftError::Io`] if the directory cannot be created.
    /// - [`FrameshiftError::SourceUnreadable`] if the video cannot be opened.
    /// - [`FrameshiftError::InvalidFrameRate`] if the source reports no usable
    ///   rate.
    /// - [`FrameshiftError::UnsupportedFrameIndexRange`] past 999 999 frames.
    /// - [`FrameshiftError::BackendInvocationFailed`] on backend failure.
    pub fn extract<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        video_path: P,
        output_dir: Q,
    ) -> Result<ExtractionSummary, FrameshiftError> {
        let video_path = video_path.as_ref();
        let output_dir = output_dir.as_ref();

        fs::create_dir_all(output_dir)?;

        log::info!(
            "Extracting frames from {} into {} ({} backend)",
            video_path.display(),
            output_dir.display(),
            self.backend.kind(),
        );
        let extracted = self.backend.extract(video_path, output_dir, &self.options)?;
        log::info!(
            "Extracted {} frame(s) at {} fps",
            extracted.frame_count,
            extracted.frame_rate,
        );

        Ok(ExtractionSummary {
            frame_rate: extracted.frame_rate,
            frame_count: extracted.frame_count,
            backend: self.backend.kind(),
        })
    }

    /// Encode the frame files in `frames_dir` into `output_path`.
    ///
    /// Frames are consumed in index order, each exactly once. Frame sizes are
    /// not compared; how a backend treats mismatched sizes is its own
    /// behaviour.
    ///
    /// # Errors
    ///
    /// - [`FrameshiftError::Io`] if `frames_dir` cannot be read.
    /// - [`FrameshiftError::NoFramesFound`] if it holds no frame files.
    /// - [`FrameshiftError::UnsupportedFrameIndexRange`] for over-width names.
    /// - [`FrameshiftError::BackendInvocationFailed`] on backend failure.
    pub fn assemble<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        frames_dir: P,
        output_path: Q,
        frame_rate: FrameRate,
    ) -> Result<AssemblySummary, FrameshiftError> {
        let frames_dir = frames_dir.as_ref();
        let output_path = output_path.as_ref();

        let frames = FrameSequence::scan(frames_dir)?;
        if frames.is_empty() {
            return Err(FrameshiftError::NoFramesFound(frames_dir.to_path_buf()));
        }

        log::info!(
            "Joining {} frame(s) from {} into {} at {} fps ({} backend)",
            frames.len(),
            frames_dir.display(),
            output_path.display(),
            frame_rate,
            self.backend.kind(),
        );
        self.backend
            .assemble(&frames, output_path, frame_rate, &self.options)?;
        log::info!("Saved video to {}", output_path.display());

        Ok(AssemblySummary {
            output_path: output_path.to_path_buf(),
            frame_count: frames.len() as u64,
            frame_rate,
            backend: self.backend.kind(),
        })
    }
}

fn instantiate(kind: BackendKind) -> Result<Box<dyn FrameBackend>, FrameshiftError> {
    match kind {
        #[cfg(feature = "native")]
        BackendKind::Native => Ok(Box::new(crate::native::NativeBackend::new())),
        #[cfg(not(feature = "native"))]
        BackendKind::Native => Err(FrameshiftError::NoBackendAvailable),
        BackendKind::External => Ok(Box::new(ExternalBackend::new())),
    }
}
