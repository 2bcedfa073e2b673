use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::chunk::ChunkSink;
use super::synthetic::{PermissionMode, SyntheticBackend};
use crate::error::CaptureError;

/// Encoding a device stream produces
///
/// The artifact builder trusts this: it never transcodes, it only frames raw
/// PCM into a WAV container so the result is playable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AudioEncoding {
    /// 16-bit little-endian PCM, interleaved
    Pcm16 { sample_rate: u32, channels: u16 },
    /// Stream that is already containerized upstream
    Container { mime_type: String, extension: String },
}

impl AudioEncoding {
    /// Content type of the raw stream bytes
    pub fn stream_mime_type(&self) -> String {
        match self {
            AudioEncoding::Pcm16 {
                sample_rate,
                channels,
            } => format!("audio/L16;rate={};channels={}", sample_rate, channels),
            AudioEncoding::Container { mime_type, .. } => mime_type.clone(),
        }
    }
}

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since recording started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Little-endian PCM bytes, the wire form of a `Pcm16` stream
    pub fn to_pcm_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// Configuration for audio backend
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Sample rate the backend should produce
    pub target_sample_rate: u32,
    /// Channel count (1 = mono, 2 = stereo)
    pub target_channels: u16,
    /// Duration of each emitted chunk in milliseconds
    pub buffer_duration_ms: u64,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000,
            target_channels: 1,
            buffer_duration_ms: 100,
        }
    }
}

impl AudioBackendConfig {
    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(self.buffer_duration_ms.max(1))
    }

    /// Interleaved samples in one chunk, always a whole number of frames
    pub fn samples_per_chunk(&self) -> usize {
        let per_channel =
            (self.target_sample_rate as u64 * self.buffer_duration_ms.max(1) / 1000).max(1);
        per_channel as usize * self.target_channels.max(1) as usize
    }
}

/// A live input stream behind a device handle
///
/// `record` hands the stream the sink it appends chunks to. After `stop`
/// returns the stream must not push again.
pub trait InputStream: Send {
    fn record(&mut self, sink: ChunkSink) -> Result<(), CaptureError>;

    fn stop(&mut self);
}

/// Exclusive handle to a live audio input stream
///
/// Releasing is idempotent and also happens on drop, so every exit path can
/// call `release` unconditionally.
pub struct DeviceHandle {
    id: Uuid,
    backend: String,
    encoding: AudioEncoding,
    stream: Box<dyn InputStream>,
    released: bool,
}

impl DeviceHandle {
    pub fn new(
        backend: impl Into<String>,
        encoding: AudioEncoding,
        stream: Box<dyn InputStream>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            backend: backend.into(),
            encoding,
            stream,
            released: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn encoding(&self) -> &AudioEncoding {
        &self.encoding
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Begin delivering chunks into `sink`
    pub fn start_recording(&mut self, sink: ChunkSink) -> Result<(), CaptureError> {
        if self.released {
            return Err(CaptureError::StreamFailed(
                "device handle already released".to_string(),
            ));
        }
        self.stream.record(sink)
    }

    /// Stop the stream and give the device back
    pub fn release(&mut self) {
        if self.released {
            debug!(device = %self.id, "device already released");
            return;
        }
        self.released = true;
        self.stream.stop();
        info!(device = %self.id, backend = %self.backend, "audio input device released");
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("id", &self.id)
            .field("backend", &self.backend)
            .field("encoding", &self.encoding)
            .field("released", &self.released)
            .finish()
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - Synthetic: generated tone, scriptable permission outcome
/// - File: replays a WAV file as if it were live
/// - Microphone: default input device via cpal (`microphone` feature)
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Request exclusive access to an input device
    ///
    /// This is the only call that suspends; it may sit behind a host
    /// permission prompt.
    async fn acquire(&self) -> Result<DeviceHandle, CaptureError>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create audio backend based on configured source
    pub fn create(source: AudioSource, config: AudioBackendConfig) -> Result<Arc<dyn AudioBackend>> {
        match source {
            AudioSource::Synthetic {
                permission,
                grant_delay,
            } => Ok(Arc::new(
                SyntheticBackend::new(config)
                    .with_permission(permission)
                    .with_grant_delay(grant_delay),
            )),

            AudioSource::File(path) => {
                let backend = super::file::FileBackend::new(path, config);
                Ok(Arc::new(backend))
            }

            AudioSource::Microphone => {
                #[cfg(feature = "microphone")]
                {
                    Ok(Arc::new(super::microphone::MicrophoneBackend::new(config)))
                }

                #[cfg(not(feature = "microphone"))]
                {
                    anyhow::bail!("Microphone capture requires the `microphone` feature")
                }
            }
        }
    }
}

/// Audio source type
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Generated tone with a scripted permission outcome
    Synthetic {
        permission: PermissionMode,
        grant_delay: Duration,
    },
    /// Default input device
    Microphone,
    /// WAV file replayed as a live stream
    File(String),
}
