//! Error types for the `frameshift` crate.
//!
//! This module defines [`FrameshiftError`], the unified error type returned by
//! every fallible operation in the crate. Variants carry the path, backend, or
//! raw value involved so that callers can report failures without extra
//! context.

use std::{io::Error as IoError, path::PathBuf};

#[cfg(feature = "native")]
use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

use crate::capability::BackendKind;

/// The unified error type for all `frameshift` operations.
///
/// Errors surface unchanged from the backend that produced them. The pipeline
/// never retries and never switches backends after a run has started.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameshiftError {
    /// Neither the FFmpeg libraries nor the FFmpeg executables are usable.
    #[error(
        "No video backend available: FFmpeg executables (ffmpeg, ffprobe) were not found on PATH \
         and the in-process FFmpeg libraries are unavailable. Install FFmpeg from \
         https://ffmpeg.org/download.html, or build frameshift with the `native` feature and the \
         FFmpeg development libraries installed"
    )]
    NoBackendAvailable,

    /// The source video could not be opened or has no video stream.
    #[error("Failed to read source video at {path}: {reason}")]
    SourceUnreadable {
        /// Path that was passed to extraction.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// A frame rate was non-numeric, zero, negative, or not finite.
    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(String),

    /// The assembly input directory holds no frame files.
    #[error("No frames found in {0}")]
    NoFramesFound(PathBuf),

    /// The selected backend failed while decoding, encoding, or running a tool.
    #[error("{backend} backend failed: {reason}")]
    BackendInvocationFailed {
        /// Backend that reported the failure.
        backend: BackendKind,
        /// Upstream error message or tool diagnostics.
        reason: String,
    },

    /// A frame index does not fit the six-digit naming scheme.
    #[error("Frame index {0} exceeds the supported maximum of 999999")]
    UnsupportedFrameIndexRange(u64),

    /// An I/O error occurred while preparing or scanning directories.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

impl FrameshiftError {
    pub(crate) fn native(reason: impl Into<String>) -> Self {
        FrameshiftError::BackendInvocationFailed {
            backend: BackendKind::Native,
            reason: reason.into(),
        }
    }

    pub(crate) fn external(reason: impl Into<String>) -> Self {
        FrameshiftError::BackendInvocationFailed {
            backend: BackendKind::External,
            reason: reason.into(),
        }
    }
}

#[cfg(feature = "native")]
impl From<FfmpegError> for FrameshiftError {
    fn from(error: FfmpegError) -> Self {
        FrameshiftError::native(format!("FFmpeg error: {error}"))
    }
}

impl From<ImageError> for FrameshiftError {
    fn from(error: ImageError) -> Self {
        FrameshiftError::native(format!("image error: {error}"))
    }
}
