//! In-process backend built on the FFmpeg libraries.
//!
//! Extraction demuxes the best video stream, decodes every frame in
//! presentation order, converts it to RGB, and saves it as a JPEG with the
//! `image` crate. Assembly reads the frame images back with `image` and feeds
//! them through a [`FrameWriter`].

use std::path::Path;

use ffmpeg_next::{
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::Pixel,
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, RgbImage};

use crate::{
    backend::{ExtractedFrames, FrameBackend},
    capability::BackendKind,
    configuration::PipelineOptions,
    encode::FrameWriter,
    error::FrameshiftError,
    ffmpeg::set_ffmpeg_log_level,
    frame_rate::FrameRate,
    progress::{OperationType, ProgressTracker},
    sequence::{self, FrameSequence},
    utilities,
};

/// Backend that calls the linked FFmpeg libraries directly.
#[derive(Debug, Default)]
pub struct NativeBackend;

impl NativeBackend {
    /// Create the backend. FFmpeg is initialised by capability detection.
    pub fn new() -> Self {
        Self
    }
}

impl FrameBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn extract(
        &self,
        video_path: &Path,
        output_dir: &Path,
        options: &PipelineOptions,
    ) -> Result<ExtractedFrames, FrameshiftError> {
        set_ffmpeg_log_level(options.ffmpeg_log_level);

        let unreadable = |reason: String| FrameshiftError::SourceUnreadable {
            path: video_path.to_path_buf(),
            reason,
        };

        let mut input_context =
            ffmpeg_next::format::input(&video_path).map_err(|error| unreadable(error.to_string()))?;

        let (video_stream_index, frame_rate, mut decoder) = {
            let stream = input_context
                .streams()
                .best(Type::Video)
                .ok_or_else(|| unreadable("no video stream".to_string()))?;

            let frame_rate = utilities::rational_to_frame_rate(stream.avg_frame_rate())
                .or_else(|_| utilities::rational_to_frame_rate(stream.rate()))?;

            let decoder = CodecContext::from_parameters(stream.parameters())
                .and_then(|context| context.decoder().video())
                .map_err(|error| unreadable(format!("cannot create video decoder: {error}")))?;

            (stream.index(), frame_rate, decoder)
        };

        log::debug!(
            "Decoding {} ({}x{}, {frame_rate} fps)",
            video_path.display(),
            decoder.width(),
            decoder.height(),
        );

        let mut sink = FrameSink::new(&decoder, output_dir, options)?;

        for (stream, packet) in input_context.packets() {
            if stream.index() != video_stream_index {
                continue;
            }
            decoder.send_packet(&packet)?;
            sink.drain(&mut decoder)?;
        }

        decoder.send_eof()?;
        sink.drain(&mut decoder)?;

        let frame_count = sink.finish();
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
        set_ffmpeg_log_level(options.ffmpeg_log_level);

        let first = frames
            .first()
            .ok_or_else(|| FrameshiftError::NoFramesFound(frames.directory().to_path_buf()))?;
        let first_image = image::open(&first.path)?;

        let mut writer = FrameWriter::create(
            output_path,
            first_image.width(),
            first_image.height(),
            frame_rate,
            options.codec,
        )?;

        let mut tracker = ProgressTracker::new(
            options.progress.clone(),
            OperationType::FrameAssembly,
            Some(frames.len() as u64),
            options.progress_interval,
        );

        writer.push(&first_image)?;
        tracker.advance();
        drop(first_image);

        for frame in &frames.frames()[1..] {
            let image = image::open(&frame.path)?;
            writer.push(&image)?;
            tracker.advance();
        }

        let written = writer.finish()?;
        tracker.finish();
        log::debug!("Encoded {written} frame(s) into {}", output_path.display());
        Ok(())
    }
}

/// Converts decoded frames to RGB and writes them out in sequence order.
struct FrameSink<'a> {
    scaler: ScalingContext,
    width: u32,
    height: u32,
    output_dir: &'a Path,
    tracker: ProgressTracker,
    decoded_frame: VideoFrame,
    rgb_frame: VideoFrame,
}

impl<'a> FrameSink<'a> {
    fn new(
        decoder: &VideoDecoder,
        output_dir: &'a Path,
        options: &PipelineOptions,
    ) -> Result<Self, FrameshiftError> {
        let width = decoder.width();
        let height = decoder.height();
        let scaler = ScalingContext::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            ScalingFlags::BILINEAR,
        )?;

        Ok(Self {
            scaler,
            width,
            height,
            output_dir,
            tracker: ProgressTracker::new(
                options.progress.clone(),
                OperationType::FrameExtraction,
                None,
                options.progress_interval,
            ),
            decoded_frame: VideoFrame::empty(),
            rgb_frame: VideoFrame::empty(),
        })
    }

    /// Write every frame the decoder has ready.
    fn drain(&mut self, decoder: &mut VideoDecoder) -> Result<(), FrameshiftError> {
        while decoder.receive_frame(&mut self.decoded_frame).is_ok() {
            let index = self.tracker.current();
            let file_name = sequence::frame_file_name(index)?;

            self.scaler.run(&self.decoded_frame, &mut self.rgb_frame)?;
            let buffer = utilities::frame_to_rgb_buffer(&self.rgb_frame, self.width, self.height);
            let rgb_image = RgbImage::from_raw(self.width, self.height, buffer).ok_or_else(|| {
                FrameshiftError::native("decoded frame does not fit an RGB image")
            })?;

            DynamicImage::ImageRgb8(rgb_image).save(self.output_dir.join(file_name))?;
            self.tracker.advance();
        }
        Ok(())
    }

    fn finish(mut self) -> u64 {
        self.tracker.finish();
        self.tracker.current()
    }
}
