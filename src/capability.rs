//! Backend capability detection.
//!
//! [`CapabilityMap::detect`] probes the environment once for each supported
//! backend. Absence is recorded as `false`, never as an error; deciding what
//! to do when nothing is available is left to [`Pipeline`](crate::Pipeline).
//!
//! # Example
//!
//! ```no_run
//! use frameshift::CapabilityMap;
//!
//! let capabilities = CapabilityMap::detect();
//! println!("native: {}, external: {}", capabilities.native, capabilities.external);
//! println!("preferred: {:?}", capabilities.preferred());
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Executable used for extraction and assembly by the external backend.
pub const FFMPEG_EXECUTABLE: &str = "ffmpeg";

/// Executable used for the metadata probe by the external backend.
pub const FFPROBE_EXECUTABLE: &str = "ffprobe";

/// Identifies one of the two interchangeable backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// FFmpeg libraries linked in-process.
    Native,
    /// FFmpeg executables spawned as child processes.
    External,
}

impl BackendKind {
    /// Short lowercase identifier (`"native"` or `"external"`).
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Native => "native",
            BackendKind::External => "external",
        }
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// Which backends are usable in the current environment.
///
/// Built once per [`Pipeline`](crate::Pipeline) and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub struct CapabilityMap {
    /// The FFmpeg libraries are linked and initialise successfully.
    pub native: bool,
    /// `ffmpeg` and `ffprobe` both resolve on `PATH`.
    pub external: bool,
}

impl CapabilityMap {
    /// Probe the environment for both backends.
    ///
    /// Never fails. Initialising the FFmpeg libraries is idempotent and may
    /// take a moment on first use.
    pub fn detect() -> Self {
        let capabilities = Self {
            native: native_available(),
            external: external_available(),
        };
        log::debug!(
            "Detected backends: native={}, external={}",
            capabilities.native,
            capabilities.external,
        );
        capabilities
    }

    /// A map with no backend available.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether the given backend is usable.
    pub fn supports(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Native => self.native,
            BackendKind::External => self.external,
        }
    }

    /// Usable backends in preference order.
    pub fn available(&self) -> Vec<BackendKind> {
        [BackendKind::Native, BackendKind::External]
            .into_iter()
            .filter(|&kind| self.supports(kind))
            .collect()
    }

    /// The backend a pipeline will use: native first, then external.
    pub fn preferred(&self) -> Option<BackendKind> {
        self.available().into_iter().next()
    }
}

#[cfg(feature = "native")]
fn native_available() -> bool {
    match ffmpeg_next::init() {
        Ok(()) => true,
        Err(error) => {
            log::debug!("FFmpeg libraries failed to initialise: {error}");
            false
        }
    }
}

#[cfg(not(feature = "native"))]
fn native_available() -> bool {
    false
}

fn external_available() -> bool {
    [FFMPEG_EXECUTABLE, FFPROBE_EXECUTABLE]
        .iter()
        .all(|executable| match which::which(executable) {
            Ok(path) => {
                log::debug!("Found {executable} at {}", path.display());
                true
            }
            Err(_) => false,
        })
}
