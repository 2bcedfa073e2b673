use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::backend::AudioEncoding;
use super::chunk::AudioChunk;
use crate::error::CaptureError;

/// Encoded voice note produced when a recording stops
///
/// Immutable once built; sessions and previews share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    bytes: Vec<u8>,
    mime_type: String,
    suggested_name: String,
    created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn suggested_name(&self) -> &str {
        &self.suggested_name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Write the artifact into `dir` under its suggested name
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(&self.suggested_name);
        self.write_to(&path)?;
        Ok(path)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, &self.bytes)
            .with_context(|| format!("Failed to write voice note: {:?}", path))?;
        info!(
            "Voice note written: {} ({} bytes, {})",
            path.display(),
            self.bytes.len(),
            self.mime_type
        );
        Ok(())
    }
}

/// Metadata the dialog renders next to the preview control
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactInfo {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&Artifact> for ArtifactInfo {
    fn from(artifact: &Artifact) -> Self {
        Self {
            name: artifact.suggested_name.clone(),
            mime_type: artifact.mime_type.clone(),
            size_bytes: artifact.bytes.len(),
            created_at: artifact.created_at,
        }
    }
}

/// Assembles buffered chunks into an [`Artifact`]
#[derive(Debug, Clone)]
pub struct ArtifactBuilder {
    name_prefix: String,
}

impl Default for ArtifactBuilder {
    fn default() -> Self {
        Self::new("voice-note")
    }
}

impl ArtifactBuilder {
    pub fn new(name_prefix: impl Into<String>) -> Self {
        Self {
            name_prefix: name_prefix.into(),
        }
    }

    pub fn build(
        &self,
        chunks: &[AudioChunk],
        encoding: &AudioEncoding,
    ) -> Result<Artifact, CaptureError> {
        self.build_at(chunks, encoding, Utc::now())
    }

    /// Build with an explicit capture time
    ///
    /// Byte content depends only on `chunks` and `encoding`.
    pub fn build_at(
        &self,
        chunks: &[AudioChunk],
        encoding: &AudioEncoding,
        created_at: DateTime<Utc>,
    ) -> Result<Artifact, CaptureError> {
        let payload_len: usize = chunks.iter().map(AudioChunk::len).sum();
        if payload_len == 0 {
            return Err(CaptureError::EmptyCapture);
        }

        let mut payload = Vec::with_capacity(payload_len);
        for chunk in chunks {
            payload.extend_from_slice(&chunk.data);
        }

        let (bytes, mime_type, extension) = match encoding {
            AudioEncoding::Pcm16 {
                sample_rate,
                channels,
            } => (
                frame_pcm_as_wav(&payload, *sample_rate, *channels)?,
                "audio/wav".to_string(),
                "wav".to_string(),
            ),
            AudioEncoding::Container {
                mime_type,
                extension,
            } => (payload, mime_type.clone(), extension.clone()),
        };

        let suggested_name = format!(
            "{}-{}.{}",
            self.name_prefix,
            created_at.format("%Y%m%d-%H%M%S-%3f"),
            extension
        );

        debug!(
            chunks = chunks.len(),
            bytes = bytes.len(),
            name = %suggested_name,
            "voice note assembled"
        );

        Ok(Artifact {
            bytes,
            mime_type,
            suggested_name,
            created_at,
        })
    }
}

/// Wrap raw little-endian PCM in a RIFF/WAVE container
///
/// Samples pass through unchanged. A trailing partial frame is dropped, it
/// cannot be represented in the container.
fn frame_pcm_as_wav(payload: &[u8], sample_rate: u32, channels: u16) -> Result<Vec<u8>, CaptureError> {
    if sample_rate == 0 || channels == 0 {
        return Err(CaptureError::Encoding(format!(
            "invalid PCM format: {} Hz, {} channels",
            sample_rate, channels
        )));
    }

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let frame_bytes = 2 * channels as usize;
    let whole = payload.len() - payload.len() % frame_bytes;
    if whole == 0 {
        return Err(CaptureError::EmptyCapture);
    }

    let mut cursor = Cursor::new(Vec::with_capacity(whole + 44));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| CaptureError::Encoding(e.to_string()))?;
        for pair in payload[..whole].chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .map_err(|e| CaptureError::Encoding(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| CaptureError::Encoding(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pcm() -> AudioEncoding {
        AudioEncoding::Pcm16 {
            sample_rate: 16000,
            channels: 1,
        }
    }

    #[test]
    fn test_empty_chunks_fail() {
        let builder = ArtifactBuilder::default();
        assert_eq!(builder.build(&[], &pcm()), Err(CaptureError::EmptyCapture));

        let empty = vec![AudioChunk::new(Vec::new(), 0)];
        assert_eq!(builder.build(&empty, &pcm()), Err(CaptureError::EmptyCapture));
    }

    #[test]
    fn test_single_byte_pcm_is_too_short() {
        let builder = ArtifactBuilder::default();
        let chunks = vec![AudioChunk::new(vec![7], 0)];
        assert_eq!(builder.build(&chunks, &pcm()), Err(CaptureError::EmptyCapture));
    }

    #[test]
    fn test_name_carries_timestamp() {
        let builder = ArtifactBuilder::new("rejection-note");
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let chunks = vec![AudioChunk::new(vec![0, 0, 1, 0], 0)];

        let artifact = builder.build_at(&chunks, &pcm(), at).unwrap();
        assert_eq!(artifact.suggested_name(), "rejection-note-20250314-092653-000.wav");
        assert_eq!(artifact.mime_type(), "audio/wav");
        assert_eq!(artifact.created_at(), at);
    }

    #[test]
    fn test_wav_payload_follows_header() {
        let builder = ArtifactBuilder::default();
        let chunks = vec![
            AudioChunk::new(vec![1, 0, 2, 0], 0),
            AudioChunk::new(vec![3, 0], 100),
        ];

        let artifact = builder.build(&chunks, &pcm()).unwrap();
        assert_eq!(&artifact.bytes()[..4], b"RIFF");
        assert_eq!(&artifact.bytes()[8..12], b"WAVE");
        assert!(artifact.bytes().ends_with(&[1, 0, 2, 0, 3, 0]));
    }

    #[test]
    fn test_info_from_artifact() {
        let builder = ArtifactBuilder::default();
        let chunks = vec![AudioChunk::new(vec![1, 0], 0)];
        let artifact = builder.build(&chunks, &pcm()).unwrap();

        let info = ArtifactInfo::from(&artifact);
        assert_eq!(info.size_bytes, artifact.len());
        assert_eq!(info.name, artifact.suggested_name());
    }
}
