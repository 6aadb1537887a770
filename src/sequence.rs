//! Frame file naming and ordering.
//!
//! Both directions and both backends share one naming contract: a frame is a
//! file called `frame_` + six-digit zero-padded index + `.jpg`. Because the
//! index has a fixed width, lexicographic order of the names equals numeric
//! order of the indices for every supported index (`0..=999_999`).
//!
//! # Example
//!
//! ```
//! use frameshift::sequence;
//!
//! let name = sequence::frame_file_name(42)?;
//! assert_eq!(name, "frame_000042.jpg");
//! assert_eq!(sequence::parse_frame_index(&name), Some(42));
//! assert_eq!(sequence::parse_frame_index("thumbnail.jpg"), None);
//! # Ok::<(), frameshift::FrameshiftError>(())
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::FrameshiftError;

/// File name prefix shared by every frame.
pub const FRAME_PREFIX: &str = "frame_";

/// Image extension of every frame (JPEG).
pub const FRAME_EXTENSION: &str = "jpg";

/// Number of digits in a frame index.
pub const FRAME_INDEX_WIDTH: usize = 6;

/// Largest index the naming scheme can represent.
pub const MAX_FRAME_INDEX: u64 = 999_999;

/// Build the file name for a frame index.
///
/// # Errors
///
/// [`FrameshiftError::UnsupportedFrameIndexRange`] if `index` exceeds
/// [`MAX_FRAME_INDEX`].
pub fn frame_file_name(index: u64) -> Result<String, FrameshiftError> {
    if index > MAX_FRAME_INDEX {
        return Err(FrameshiftError::UnsupportedFrameIndexRange(index));
    }
    Ok(format!(
        "{FRAME_PREFIX}{index:0width$}.{FRAME_EXTENSION}",
        width = FRAME_INDEX_WIDTH
    ))
}

/// Recover the index from a frame file name.
///
/// Returns `None` for anything that is not exactly prefix, six ASCII digits,
/// and the frame extension.
pub fn parse_frame_index(file_name: &str) -> Option<u64> {
    let digits = index_digits(file_name)?;
    if digits.len() != FRAME_INDEX_WIDTH {
        return None;
    }
    digits.parse().ok()
}

/// Keep only frame file names and order them.
pub fn sort_frame_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut frames: Vec<String> = names
        .into_iter()
        .map(Into::into)
        .filter(|name| parse_frame_index(name).is_some())
        .collect();
    frames.sort();
    frames
}

/// `printf`-style pattern FFmpeg's image2 muxer expands to frame names.
pub fn printf_pattern() -> String {
    format!("{FRAME_PREFIX}%0{FRAME_INDEX_WIDTH}d.{FRAME_EXTENSION}")
}

/// Glob that matches exactly the frame names and nothing else.
pub fn glob_pattern() -> String {
    format!(
        "{FRAME_PREFIX}{}.{FRAME_EXTENSION}",
        "[0-9]".repeat(FRAME_INDEX_WIDTH)
    )
}

/// The all-digit part between prefix and extension, of any width.
fn index_digits(file_name: &str) -> Option<&str> {
    let digits = file_name
        .strip_prefix(FRAME_PREFIX)?
        .strip_suffix(FRAME_EXTENSION)?
        .strip_suffix('.')?;
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    Some(digits)
}

/// One frame file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFile {
    /// Index encoded in the file name.
    pub index: u64,
    /// Full path to the image.
    pub path: PathBuf,
}

/// The ordered frame files of one directory.
///
/// Produced by [`FrameSequence::scan`], which assumes the caller has
/// exclusive use of the directory's `frame_*` names for the duration of a
/// run.
#[derive(Debug, Clone)]
pub struct FrameSequence {
    directory: PathBuf,
    frames: Vec<FrameFile>,
}

impl FrameSequence {
    /// List and order the frame files in `directory`.
    ///
    /// Files that do not follow the naming contract are ignored, including
    /// zero-padded names wider than six digits whose value is in range.
    ///
    /// # Errors
    ///
    /// - [`FrameshiftError::Io`] if the directory cannot be read.
    /// - [`FrameshiftError::UnsupportedFrameIndexRange`] if a frame file
    ///   carries an index above [`MAX_FRAME_INDEX`].
    pub fn scan<P: AsRef<Path>>(directory: P) -> Result<Self, FrameshiftError> {
        let directory = directory.as_ref();
        let mut frames = Vec::new();

        for entry in fs::read_dir(directory)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };

            let Some(digits) = index_digits(file_name) else {
                continue;
            };
            if digits.len() > FRAME_INDEX_WIDTH {
                // Padded names such as `frame_0000001.jpg` are stray files.
                let index = digits.parse().unwrap_or(u64::MAX);
                if index > MAX_FRAME_INDEX {
                    return Err(FrameshiftError::UnsupportedFrameIndexRange(index));
                }
                continue;
            }
            if let Some(index) = parse_frame_index(file_name) {
                frames.push(FrameFile {
                    index,
                    path: entry.path(),
                });
            }
        }

        // Fixed-width names: ordering by index is ordering by name.
        frames.sort_by_key(|frame| frame.index);

        log::debug!(
            "Found {} frame file(s) in {}",
            frames.len(),
            directory.display()
        );

        Ok(Self {
            directory: directory.to_path_buf(),
            frames,
        })
    }

    /// Directory that was scanned.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Frame files in order.
    pub fn frames(&self) -> &[FrameFile] {
        &self.frames
    }

    /// Number of frame files.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// `true` when no frame file was found.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// First frame in order, if any.
    pub fn first(&self) -> Option<&FrameFile> {
        self.frames.first()
    }

    /// `true` when indices run without gaps from the first to the last.
    pub fn is_contiguous(&self) -> bool {
        self.frames
            .windows(2)
            .all(|pair| pair[1].index == pair[0].index + 1)
    }
}
