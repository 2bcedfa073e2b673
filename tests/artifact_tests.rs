// Integration tests for artifact assembly
//
// Verifies that buffered chunks become a single playable voice note: WAV framing
// for raw PCM, passthrough for container encodings, deterministic bytes.

use anyhow::Result;
use chrono::{TimeZone, Utc};
use std::io::Cursor;
use voice_note_capture::audio::{ArtifactBuilder, AudioChunk, AudioEncoding};
use voice_note_capture::CaptureError;

fn pcm_chunk(samples: &[i16], timestamp_ms: u64) -> AudioChunk {
    let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    AudioChunk::new(data, timestamp_ms)
}

fn mono_16k() -> AudioEncoding {
    AudioEncoding::Pcm16 {
        sample_rate: 16000,
        channels: 1,
    }
}

#[test]
fn test_pcm_chunks_decode_in_order() -> Result<()> {
    let chunks = vec![
        pcm_chunk(&[1, 2, 3], 100),
        pcm_chunk(&[4, 5], 200),
        pcm_chunk(&[-6, 7, i16::MIN, i16::MAX], 300),
    ];

    let artifact = ArtifactBuilder::default().build(&chunks, &mono_16k())?;
    assert_eq!(artifact.mime_type(), "audio/wav");
    assert!(artifact.suggested_name().ends_with(".wav"));

    let mut reader = hound::WavReader::new(Cursor::new(artifact.bytes().to_vec()))?;
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 16000);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);

    let samples: Vec<i16> = reader.samples::<i16>().collect::<Result<_, _>>()?;
    assert_eq!(samples, vec![1, 2, 3, 4, 5, -6, 7, i16::MIN, i16::MAX]);

    Ok(())
}

#[test]
fn test_build_is_deterministic() -> Result<()> {
    let chunks = vec![pcm_chunk(&[10, 20, 30, 40], 100), pcm_chunk(&[50, 60], 200)];
    let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
    let builder = ArtifactBuilder::new("note");

    let first = builder.build_at(&chunks, &mono_16k(), at)?;
    let second = builder.build_at(&chunks, &mono_16k(), at)?;

    assert_eq!(first.bytes(), second.bytes());
    assert_eq!(first.suggested_name(), "note-20240309-140507-000.wav");
    assert_eq!(first.suggested_name(), second.suggested_name());

    Ok(())
}

#[test]
fn test_stereo_drops_partial_trailing_frame() -> Result<()> {
    let encoding = AudioEncoding::Pcm16 {
        sample_rate: 48000,
        channels: 2,
    };
    // Five samples: two whole stereo frames and one orphan
    let chunks = vec![pcm_chunk(&[1, -1, 2, -2, 3], 0)];

    let artifact = ArtifactBuilder::default().build(&chunks, &encoding)?;
    let mut reader = hound::WavReader::new(Cursor::new(artifact.bytes().to_vec()))?;
    assert_eq!(reader.spec().channels, 2);

    let samples: Vec<i16> = reader.samples::<i16>().collect::<Result<_, _>>()?;
    assert_eq!(samples, vec![1, -1, 2, -2]);

    Ok(())
}

#[test]
fn test_container_passthrough() -> Result<()> {
    let encoding = AudioEncoding::Container {
        mime_type: "audio/webm;codecs=opus".to_string(),
        extension: "webm".to_string(),
    };
    let chunks = vec![
        AudioChunk::new(b"\x1aE\xdf\xa3header".to_vec(), 0),
        AudioChunk::new(b"cluster-1".to_vec(), 250),
        AudioChunk::new(b"cluster-2".to_vec(), 500),
    ];

    let artifact = ArtifactBuilder::default().build(&chunks, &encoding)?;

    assert_eq!(artifact.bytes(), b"\x1aE\xdf\xa3headercluster-1cluster-2");
    assert_eq!(artifact.mime_type(), "audio/webm;codecs=opus");
    assert!(artifact.suggested_name().ends_with(".webm"));

    Ok(())
}

#[test]
fn test_invalid_pcm_format_is_an_encoding_error() {
    let chunks = vec![pcm_chunk(&[1, 2, 3, 4], 0)];
    let builder = ArtifactBuilder::default();

    for (sample_rate, channels) in [(0, 1), (16000, 0)] {
        let encoding = AudioEncoding::Pcm16 {
            sample_rate,
            channels,
        };
        match builder.build(&chunks, &encoding) {
            Err(CaptureError::Encoding(message)) => {
                assert!(message.contains("invalid PCM format"))
            }
            other => panic!(
                "unexpected result for {} Hz x{}: {:?}",
                sample_rate,
                channels,
                other.map(|artifact| artifact.len())
            ),
        }
    }
}

#[test]
fn test_empty_input_is_rejected() {
    let builder = ArtifactBuilder::default();

    assert_eq!(
        builder.build(&[], &mono_16k()).unwrap_err(),
        CaptureError::EmptyCapture
    );
    assert_eq!(
        builder
            .build(&[AudioChunk::new(Vec::new(), 0)], &mono_16k())
            .unwrap_err(),
        CaptureError::EmptyCapture
    );
}

#[test]
fn test_write_to_dir_uses_suggested_name() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let artifact = ArtifactBuilder::default().build(&[pcm_chunk(&[1, 2, 3, 4], 0)], &mono_16k())?;

    let path = artifact.write_to_dir(dir.path())?;

    assert_eq!(
        path.file_name().and_then(|n| n.to_str()),
        Some(artifact.suggested_name())
    );
    assert_eq!(std::fs::read(&path)?, artifact.bytes());

    Ok(())
}
