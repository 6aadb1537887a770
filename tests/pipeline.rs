//! Backend selection and pipeline error handling tests.
//!
//! None of these tests need a working backend: they either inject a
//! capability map or fail before anything is dispatched.

use std::fs;

use frameshift::{
    BackendKind, CapabilityMap, FrameRate, FrameshiftError, Pipeline, PipelineOptions,
    VideoCodec, sequence,
};

fn external_only() -> CapabilityMap {
    CapabilityMap {
        native: false,
        external: true,
    }
}

#[test]
fn preference_order_is_native_then_external() {
    let both = CapabilityMap {
        native: true,
        external: true,
    };
    assert_eq!(both.preferred(), Some(BackendKind::Native));
    assert_eq!(
        both.available(),
        vec![BackendKind::Native, BackendKind::External]
    );

    assert_eq!(external_only().preferred(), Some(BackendKind::External));
    assert_eq!(external_only().available(), vec![BackendKind::External]);
    assert!(external_only().supports(BackendKind::External));
    assert!(!external_only().supports(BackendKind::Native));

    assert_eq!(CapabilityMap::none().preferred(), None);
    assert!(CapabilityMap::none().available().is_empty());
}

#[test]
fn detection_is_consistent_with_selection() {
    let capabilities = CapabilityMap::detect();
    match Pipeline::with_capabilities(capabilities, PipelineOptions::default()) {
        Ok(pipeline) => {
            assert_eq!(Some(pipeline.backend()), capabilities.preferred());
            assert_eq!(pipeline.capabilities(), capabilities);
        }
        Err(FrameshiftError::NoBackendAvailable) => {
            assert_eq!(capabilities.preferred(), None);
        }
        Err(other) => panic!("unexpected error: {other}"),
    }
}

#[test]
fn no_backend_fails_without_touching_the_filesystem() {
    let scratch = tempfile::tempdir().expect("Failed to create temp dir");
    let output_dir = scratch.path().join("frames");

    let result = Pipeline::with_capabilities(CapabilityMap::none(), PipelineOptions::default())
        .and_then(|pipeline| pipeline.extract("input.mp4", &output_dir));

    assert!(matches!(result, Err(FrameshiftError::NoBackendAvailable)));
    assert!(!output_dir.exists());
    assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[test]
fn no_backend_message_explains_how_to_fix_it() {
    let message = FrameshiftError::NoBackendAvailable.to_string();
    assert!(message.contains("ffmpeg"), "{message}");
    assert!(message.contains("https://ffmpeg.org/download.html"), "{message}");
    assert!(message.contains("native"), "{message}");
}

#[test]
fn external_only_map_binds_external_backend() {
    let pipeline = Pipeline::with_capabilities(external_only(), PipelineOptions::default())
        .expect("external backend needs no setup");
    assert_eq!(pipeline.backend(), BackendKind::External);
}

#[cfg(feature = "native")]
#[test]
fn native_wins_when_both_are_available() {
    let pipeline = Pipeline::with_capabilities(
        CapabilityMap {
            native: true,
            external: true,
        },
        PipelineOptions::default(),
    )
    .unwrap();
    assert_eq!(pipeline.backend(), BackendKind::Native);
}

#[test]
fn assembling_an_empty_directory_fails() {
    let scratch = tempfile::tempdir().expect("Failed to create temp dir");
    let frames_dir = scratch.path().join("frames");
    fs::create_dir(&frames_dir).unwrap();
    fs::write(frames_dir.join("cover.jpg"), b"not a frame").unwrap();
    let output = scratch.path().join("out.mp4");

    let pipeline =
        Pipeline::with_capabilities(external_only(), PipelineOptions::default()).unwrap();
    let result = pipeline.assemble(&frames_dir, &output, FrameRate::default());

    match result {
        Err(FrameshiftError::NoFramesFound(path)) => assert_eq!(path, frames_dir),
        other => panic!("expected NoFramesFound, got {other:?}"),
    }
    assert!(!output.exists(), "no video should be written");
}

#[test]
fn assembling_a_missing_directory_is_io_error() {
    let scratch = tempfile::tempdir().expect("Failed to create temp dir");
    let pipeline =
        Pipeline::with_capabilities(external_only(), PipelineOptions::default()).unwrap();
    let result = pipeline.assemble(
        scratch.path().join("missing"),
        scratch.path().join("out.mp4"),
        FrameRate::default(),
    );
    assert!(matches!(result, Err(FrameshiftError::Io(_))));
}

#[test]
fn assembling_over_width_frames_is_rejected_before_dispatch() {
    let scratch = tempfile::tempdir().expect("Failed to create temp dir");
    fs::write(
        scratch.path().join(sequence::frame_file_name(0).unwrap()),
        b"",
    )
    .unwrap();
    fs::write(scratch.path().join("frame_1234567.jpg"), b"").unwrap();

    let pipeline =
        Pipeline::with_capabilities(external_only(), PipelineOptions::default()).unwrap();
    let result = pipeline.assemble(
        scratch.path(),
        scratch.path().join("out.mp4"),
        FrameRate::default(),
    );
    assert!(matches!(
        result,
        Err(FrameshiftError::UnsupportedFrameIndexRange(1_234_567))
    ));
}

#[test]
fn unreadable_source_is_reported_by_detected_backend() {
    let capabilities = CapabilityMap::detect();
    let Ok(pipeline) = Pipeline::with_capabilities(capabilities, PipelineOptions::default())
    else {
        return;
    };

    let scratch = tempfile::tempdir().expect("Failed to create temp dir");
    let bogus = scratch.path().join("bogus.mp4");
    fs::write(&bogus, b"this is not a media file").unwrap();

    for source in [scratch.path().join("missing.mp4"), bogus] {
        let result = pipeline.extract(&source, scratch.path().join("frames"));
        match result {
            Err(FrameshiftError::SourceUnreadable { path, .. }) => assert_eq!(path, source),
            other => panic!("expected SourceUnreadable for {}, got {other:?}", source.display()),
        }
    }
}

#[test]
fn options_builder_applies_settings() {
    let options = PipelineOptions::new()
        .with_progress_interval(0)
        .with_codec(VideoCodec::Mpeg4)
        .with_ffmpeg_log_level(frameshift::FfmpegLogLevel::Quiet);

    assert_eq!(options.progress_interval(), 1);
    assert_eq!(options.codec(), VideoCodec::Mpeg4);
    assert_eq!(options.ffmpeg_log_level(), frameshift::FfmpegLogLevel::Quiet);

    let defaults = PipelineOptions::default();
    assert_eq!(defaults.progress_interval(), 100);
    assert_eq!(defaults.codec(), VideoCodec::H264);
    assert_eq!(defaults.ffmpeg_log_level(), frameshift::FfmpegLogLevel::Error);
}

#[test]
fn codec_and_log_level_parse_from_text() {
    assert_eq!("H264".parse::<VideoCodec>(), Ok(VideoCodec::H264));
    assert_eq!("mpeg4".parse::<VideoCodec>(), Ok(VideoCodec::Mpeg4));
    assert!("vp9".parse::<VideoCodec>().is_err());
    assert_eq!(VideoCodec::H264.encoder_name(), "libx264");

    assert_eq!(
        "warn".parse::<frameshift::FfmpegLogLevel>(),
        Ok(frameshift::FfmpegLogLevel::Warning)
    );
    assert!("loud".parse::<frameshift::FfmpegLogLevel>().is_err());
}
