//! Streaming video encoder for the native backend.
//!
//! [`FrameWriter`] opens an output container, accepts frames one at a time,
//! and finalises the file on [`finish`](FrameWriter::finish). Frames are never
//! buffered beyond what the encoder itself holds, so arbitrarily long
//! sequences can be written.

use std::path::Path;

use ffmpeg_next::{
    Packet, Rational,
    codec::context::Context as CodecContext,
    encoder::video::Encoder as VideoEncoder,
    format::{Flags as FormatFlags, Pixel, context::Output},
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, imageops::FilterType};

use crate::{
    configuration::VideoCodec, error::FrameshiftError, frame_rate::FrameRate, utilities,
};

/// Pixel format every output stream is encoded in.
const OUTPUT_PIXEL_FORMAT: Pixel = Pixel::YUV420P;

/// Encodes frames into a video file, one at a time.
pub(crate) struct FrameWriter {
    output: Output,
    encoder: VideoEncoder,
    scaler: ScalingContext,
    stream_index: usize,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    width: u32,
    height: u32,
    next_pts: i64,
}

impl FrameWriter {
    /// Open `path` for writing. The container is inferred from its extension.
    ///
    /// `width` and `height` fix the canonical frame size for the whole file.
    pub(crate) fn create(
        path: &Path,
        width: u32,
        height: u32,
        frame_rate: FrameRate,
        codec: VideoCodec,
    ) -> Result<Self, FrameshiftError> {
        let codec_id = codec.to_codec_id();
        let rate = utilities::frame_rate_to_rational(frame_rate);
        let encoder_time_base = rate.invert();

        let mut output = ffmpeg_next::format::output(&path).map_err(|error| {
            FrameshiftError::native(format!("cannot open output {}: {error}", path.display()))
        })?;

        // Read before adding the stream to avoid a borrow conflict.
        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

        let encoder_codec = ffmpeg_next::encoder::find(codec_id)
            .ok_or_else(|| FrameshiftError::native(format!("codec {codec_id:?} not available")))?;

        let mut stream = output
            .add_stream(encoder_codec)
            .map_err(|error| FrameshiftError::native(format!("cannot add stream: {error}")))?;
        let stream_index = stream.index();

        let mut encoder = CodecContext::from_parameters(stream.parameters())
            .map_err(|error| {
                FrameshiftError::native(format!("cannot create codec context: {error}"))
            })?
            .encoder()
            .video()
            .map_err(|error| {
                FrameshiftError::native(format!("cannot create video encoder: {error}"))
            })?;

        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(OUTPUT_PIXEL_FORMAT);
        encoder.set_time_base(encoder_time_base);
        encoder.set_frame_rate(Some(rate));

        if needs_global_header {
            // SAFETY: the context is owned by `encoder` and not yet opened.
            unsafe {
                (*encoder.as_mut_ptr()).flags |=
                    ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }
        }

        let encoder = encoder
            .open_as(encoder_codec)
            .map_err(|error| FrameshiftError::native(format!("cannot open encoder: {error}")))?;

        stream.set_parameters(&encoder);
        stream.set_time_base(encoder_time_base);

        output
            .write_header()
            .map_err(|error| FrameshiftError::native(format!("cannot write header: {error}")))?;

        // The muxer may pick its own stream time base while writing the header.
        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| FrameshiftError::native("output stream disappeared"))?;

        let scaler = ScalingContext::get(
            Pixel::RGB24,
            width,
            height,
            OUTPUT_PIXEL_FORMAT,
            width,
            height,
            ScalingFlags::BILINEAR,
        )
        .map_err(|error| FrameshiftError::native(format!("cannot create scaler: {error}")))?;

        log::debug!(
            "Opened {} for writing ({width}x{height}, {codec_id:?}, {frame_rate} fps)",
            path.display(),
        );

        Ok(Self {
            output,
            encoder,
            scaler,
            stream_index,
            encoder_time_base,
            stream_time_base,
            width,
            height,
            next_pts: 0,
        })
    }

    /// Encode one frame.
    ///
    /// Frames of a different size are resized to the canonical size.
    pub(crate) fn push(&mut self, image: &DynamicImage) -> Result<(), FrameshiftError> {
        let rgb = if image.width() != self.width || image.height() != self.height {
            image
                .resize_exact(self.width, self.height, FilterType::Lanczos3)
                .to_rgb8()
        } else {
            image.to_rgb8()
        };

        let source_frame = utilities::rgb_image_to_frame(&rgb);
        let mut encoded_frame = VideoFrame::empty();
        self.scaler
            .run(&source_frame, &mut encoded_frame)
            .map_err(|error| FrameshiftError::native(format!("scaling failed: {error}")))?;

        encoded_frame.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder
            .send_frame(&encoded_frame)
            .map_err(|error| FrameshiftError::native(format!("send_frame failed: {error}")))?;
        self.drain_packets()
    }

    /// Flush the encoder and write the container trailer.
    ///
    /// Returns the number of frames submitted.
    pub(crate) fn finish(mut self) -> Result<u64, FrameshiftError> {
        self.encoder
            .send_eof()
            .map_err(|error| FrameshiftError::native(format!("send_eof failed: {error}")))?;
        self.drain_packets()?;

        self.output
            .write_trailer()
            .map_err(|error| FrameshiftError::native(format!("cannot write trailer: {error}")))?;

        Ok(self.next_pts as u64)
    }

    fn drain_packets(&mut self) -> Result<(), FrameshiftError> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            // One frame per packet; the muxer derives the stream duration from it.
            if packet.duration() == 0 {
                packet.set_duration(1);
            }
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .map_err(|error| {
                    FrameshiftError::native(format!("write packet failed: {error}"))
                })?;
        }
        Ok(())
    }
}
