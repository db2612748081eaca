use std::path::{Path, PathBuf};

use zvid_core::{FrameGeometry, FrameSource, PipelineConfig, ZoneHeader, ZonePipeline};

use super::VideoFrameSource;
use crate::audio::{AudioRenderConfig, render_wav};

const MONO_22K: AudioRenderConfig = AudioRenderConfig {
    sample_rate: crate::audio::DEFAULT_SAMPLE_RATE,
    channels: 1,
};

/// Path to scripts/test.mp4 relative to workspace root (parent of zvid-media). Works regardless of cwd.
fn test_mp4_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("scripts")
        .join("test.mp4")
}

#[test]
fn test_open_missing_file_fails() {
    crate::init().unwrap();
    assert!(VideoFrameSource::open(Path::new("does/not/exist.mp4"), 96, 54).is_err());
}

/// Requires scripts/test.mp4.
#[test]
fn test_frames_are_display_sized() -> anyhow::Result<()> {
    let input_path = test_mp4_path();
    if !input_path.exists() {
        eprintln!("skip: {} not found", input_path.display());
        return Ok(());
    }
    crate::init()?;

    let mut source = VideoFrameSource::open(&input_path, 96, 54)?;
    assert!(source.frame_rate().is_some());
    let mut count = 0;
    for frame in source.by_ref().take(5) {
        let frame = frame?;
        assert_eq!((frame.width(), frame.height()), (96, 54));
        assert_eq!(frame.data().len(), 96 * 54 * 3);
        count += 1;
    }
    assert_eq!(count, 5);
    Ok(())
}

/// Requires scripts/test.mp4.
#[test]
fn test_zone_run_from_file() -> anyhow::Result<()> {
    let input_path = test_mp4_path();
    if !input_path.exists() {
        eprintln!("skip: {} not found", input_path.display());
        return Ok(());
    }
    crate::init()?;
    let dir = tempfile::tempdir()?;

    let mut source = VideoFrameSource::open(&input_path, 96, 54)?;
    let pipeline = ZonePipeline::new(PipelineConfig {
        geometry: FrameGeometry::new(96, 54, 9, 6)?,
        target_fps: 10,
        output_dir: dir.path().to_path_buf(),
    });
    let summary = pipeline.run(&mut source)?;
    assert!(summary.frames_written > 0);
    assert!(summary.decode_error.is_none());
    let expected = summary.source_frames.div_ceil(summary.stride);
    assert_eq!(u64::from(summary.frames_written), expected);

    for path in &summary.zone_paths {
        let header = ZoneHeader::read_from(path)?;
        assert_eq!(header.frame_count, summary.frames_written);
        assert_eq!(std::fs::metadata(path)?.len(), header.expected_file_len());
    }
    Ok(())
}

/// Requires scripts/test.mp4 with an audio track.
#[test]
fn test_render_wav_then_extract() -> anyhow::Result<()> {
    let input_path = test_mp4_path();
    if !input_path.exists() {
        eprintln!("skip: {} not found", input_path.display());
        return Ok(());
    }
    crate::init()?;
    let dir = tempfile::tempdir()?;
    let wav_path = dir.path().join("audio_22k_mono.wav");

    let Some(rendered) = render_wav(&input_path, &wav_path, MONO_22K, || false)?
    else {
        eprintln!("skip: {} has no audio", input_path.display());
        return Ok(());
    };
    assert!(!rendered.interrupted);
    assert!(rendered.frames > 0);

    let wav = std::fs::read(&wav_path)?;
    let fmt = zvid_core::wav::format(&wav).unwrap();
    assert_eq!(fmt.sample_rate, 22_050);
    assert_eq!(fmt.channels, 1);
    assert_eq!(fmt.bits_per_sample, 16);

    let pcm = zvid_core::wav::extract(wav)?;
    assert_eq!(pcm.sample_count() as u64, rendered.frames);
    Ok(())
}

/// Requires scripts/test.mp4.
#[test]
fn test_render_wav_stops_when_asked() -> anyhow::Result<()> {
    let input_path = test_mp4_path();
    if !input_path.exists() {
        eprintln!("skip: {} not found", input_path.display());
        return Ok(());
    }
    crate::init()?;
    let dir = tempfile::tempdir()?;
    let wav_path = dir.path().join("stopped.wav");

    if let Some(rendered) = render_wav(&input_path, &wav_path, MONO_22K, || true)? {
        assert!(rendered.interrupted);
        assert_eq!(rendered.frames, 0);
        let wav = std::fs::read(&wav_path)?;
        assert!(zvid_core::wav::extract(wav)?.is_empty());
    }
    Ok(())
}
