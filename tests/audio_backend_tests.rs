// Tests for audio backend abstractions
//
// These verify device acquisition, stream delivery into chunk buffers,
// and that handles are released exactly once.

use anyhow::Result;
use std::time::{Duration, Instant};
use voice_note_capture::audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioEncoding, AudioFrame, AudioSource,
    ChunkBuffer, PermissionMode, SyntheticBackend,
};
use voice_note_capture::CaptureError;

#[test]
fn test_audio_backend_config_default() {
    let config = AudioBackendConfig::default();

    assert_eq!(config.target_sample_rate, 16000, "Default should be 16kHz");
    assert_eq!(config.target_channels, 1, "Default should be mono");
    assert_eq!(config.buffer_duration_ms, 100, "Default buffer should be 100ms");
    assert_eq!(config.frame_duration(), Duration::from_millis(100));
    assert_eq!(config.samples_per_chunk(), 1600);
}

#[test]
fn test_audio_frame_pcm_bytes_little_endian() {
    let frame = AudioFrame {
        samples: vec![0x0102, -2],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: 0,
    };

    assert_eq!(frame.to_pcm_bytes(), vec![0x02, 0x01, 0xfe, 0xff]);
}

#[tokio::test(start_paused = true)]
async fn test_synthetic_stream_fills_buffer() -> Result<()> {
    let backend = SyntheticBackend::new(AudioBackendConfig::default());
    let tally = backend.tally();

    let mut device = backend.acquire().await?;
    assert_eq!(device.backend(), "synthetic");
    assert_eq!(
        device.encoding(),
        &AudioEncoding::Pcm16 {
            sample_rate: 16000,
            channels: 1
        }
    );

    let buffer = ChunkBuffer::new();
    device.start_recording(buffer.sink())?;
    tokio::time::sleep(Duration::from_millis(550)).await;

    assert_eq!(buffer.len(), 5);
    assert_eq!(buffer.total_bytes(), 5 * 1600 * 2);

    device.release();
    assert!(device.is_released());
    assert_eq!(tally.live(), 0);

    // Nothing arrives once the stream is released
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(buffer.len(), 5);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_release_is_idempotent() -> Result<()> {
    let backend = SyntheticBackend::new(AudioBackendConfig::default());
    let tally = backend.tally();

    let mut device = backend.acquire().await?;
    device.release();
    device.release();
    drop(device);

    assert_eq!(tally.acquired(), 1);
    assert_eq!(tally.released(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_releases_device() -> Result<()> {
    let backend = SyntheticBackend::new(AudioBackendConfig::default());
    let tally = backend.tally();

    {
        let mut device = backend.acquire().await?;
        device.start_recording(ChunkBuffer::new().sink())?;
        assert_eq!(tally.live(), 1);
    }

    assert_eq!(tally.live(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_sealed_buffer_stops_accepting() -> Result<()> {
    let backend = SyntheticBackend::new(AudioBackendConfig::default());
    let mut device = backend.acquire().await?;

    let buffer = ChunkBuffer::new();
    let sink = buffer.sink();
    device.start_recording(buffer.sink())?;
    tokio::time::sleep(Duration::from_millis(250)).await;

    let sealed = buffer.seal();
    assert_eq!(sealed.len(), 2);
    assert!(sink.is_sealed());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(buffer.is_empty());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_grant_delay() -> Result<()> {
    let backend = SyntheticBackend::new(AudioBackendConfig::default())
        .with_grant_delay(Duration::from_secs(2));

    let before = tokio::time::Instant::now();
    let _device = backend.acquire().await?;
    assert!(before.elapsed() >= Duration::from_secs(2));

    Ok(())
}

#[tokio::test]
async fn test_refused_outcomes() {
    let denied = SyntheticBackend::new(AudioBackendConfig::default())
        .with_permission(PermissionMode::Denied);
    let unavailable = SyntheticBackend::new(AudioBackendConfig::default())
        .with_permission(PermissionMode::Unavailable);

    assert_eq!(
        denied.acquire().await.unwrap_err(),
        CaptureError::PermissionDenied
    );
    assert_eq!(
        unavailable.acquire().await.unwrap_err(),
        CaptureError::DeviceUnavailable
    );
    assert_eq!(denied.tally().refused(), 1);
    assert_eq!(denied.tally().acquired(), 0);
}

#[tokio::test]
async fn test_factory_builds_configured_backend() -> Result<()> {
    let started = Instant::now();
    let backend = AudioBackendFactory::create(
        AudioSource::Synthetic {
            permission: PermissionMode::Granted,
            grant_delay: Duration::ZERO,
        },
        AudioBackendConfig::default(),
    )?;
    assert_eq!(backend.name(), "synthetic");

    let device = backend.acquire().await?;
    assert!(!device.is_released());
    assert!(started.elapsed() < Duration::from_secs(1));

    let file = AudioBackendFactory::create(
        AudioSource::File("missing.wav".to_string()),
        AudioBackendConfig::default(),
    )?;
    assert_eq!(file.name(), "file");

    Ok(())
}

#[cfg(not(feature = "microphone"))]
#[test]
fn test_microphone_requires_feature() {
    let result = AudioBackendFactory::create(AudioSource::Microphone, AudioBackendConfig::default());
    assert!(result.is_err());
}
