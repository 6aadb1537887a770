//! Internal helpers for the native backend.
//!
//! Pixel-data copying between FFmpeg frames and `image` buffers, and
//! conversions between [`FrameRate`] and FFmpeg's [`Rational`].

use ffmpeg_next::{Rational, frame::Video as VideoFrame};
use image::RgbImage;

use crate::{error::FrameshiftError, frame_rate::FrameRate};

/// Copy pixel data from an RGB24 FFmpeg frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × 3).
pub fn frame_to_rgb_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * 3;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Copy a packed RGB image into an RGB24 FFmpeg frame of the same size.
pub fn rgb_image_to_frame(image: &RgbImage) -> VideoFrame {
    let (width, height) = image.dimensions();
    let mut frame = VideoFrame::new(ffmpeg_next::format::Pixel::RGB24, width, height);
    let stride = frame.stride(0);
    let row_len = (width as usize) * 3;
    let source = image.as_raw();
    let destination = frame.data_mut(0);

    for row in 0..(height as usize) {
        let source_start = row * row_len;
        let destination_start = row * stride;
        destination[destination_start..destination_start + row_len]
            .copy_from_slice(&source[source_start..source_start + row_len]);
    }
    frame
}

/// Read a stream rate reported by the demuxer.
///
/// # Errors
///
/// [`FrameshiftError::InvalidFrameRate`] for zero or negative terms, which
/// FFmpeg uses to mean "unknown".
pub fn rational_to_frame_rate(rational: Rational) -> Result<FrameRate, FrameshiftError> {
    let numerator = u64::try_from(rational.numerator()).unwrap_or(0);
    let denominator = u64::try_from(rational.denominator()).unwrap_or(0);
    FrameRate::from_ratio(numerator, denominator)
}

/// Express a frame rate as an FFmpeg rational.
///
/// Rates whose terms exceed `i32` are approximated.
pub fn frame_rate_to_rational(frame_rate: FrameRate) -> Rational {
    match (
        i32::try_from(frame_rate.numerator()),
        i32::try_from(frame_rate.denominator()),
    ) {
        (Ok(numerator), Ok(denominator)) => Rational::new(numerator, denominator),
        _ => Rational::from(frame_rate.as_f64()),
    }
}
