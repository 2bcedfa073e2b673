use anyhow::{Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioEncoding, AudioFrame, DeviceHandle, InputStream};
use super::chunk::{AudioChunk, ChunkSink};
use crate::error::CaptureError;

/// A WAV file loaded into memory as 16-bit samples
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            anyhow::bail!(
                "Unsupported WAV format: {:?} {}-bit (expected 16-bit PCM)",
                spec.sample_format,
                spec.bits_per_sample
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }
}

/// Replays a WAV file as a live input device
///
/// Useful for kiosks and demos without a microphone. A missing or unreadable
/// file is reported as an unavailable device.
pub struct FileBackend {
    path: PathBuf,
    config: AudioBackendConfig,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>, config: AudioBackendConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn acquire(&self) -> Result<DeviceHandle, CaptureError> {
        let path = self.path.clone();
        let loaded = tokio::task::spawn_blocking(move || AudioFile::open(&path))
            .await
            .map_err(|e| CaptureError::StreamFailed(format!("file reader panicked: {}", e)))?;

        let audio = match loaded {
            Ok(audio) => audio,
            Err(e) => {
                warn!("File device unavailable: {:#}", e);
                return Err(CaptureError::DeviceUnavailable);
            }
        };

        let encoding = AudioEncoding::Pcm16 {
            sample_rate: audio.sample_rate,
            channels: audio.channels,
        };
        let stream = FileStream {
            audio: Arc::new(audio),
            buffer_duration_ms: self.config.buffer_duration_ms.max(1),
            replay: None,
        };

        Ok(DeviceHandle::new(self.name(), encoding, Box::new(stream)))
    }

    fn name(&self) -> &str {
        "file"
    }
}

struct FileStream {
    audio: Arc<AudioFile>,
    buffer_duration_ms: u64,
    replay: Option<JoinHandle<()>>,
}

impl InputStream for FileStream {
    fn record(&mut self, sink: ChunkSink) -> Result<(), CaptureError> {
        if self.replay.is_some() {
            return Ok(());
        }

        let audio = Arc::clone(&self.audio);
        let frame_ms = self.buffer_duration_ms;
        self.replay = Some(tokio::spawn(async move {
            let channels = audio.channels.max(1) as usize;
            let per_chunk = ((audio.sample_rate as u64 * frame_ms / 1000).max(1) as usize) * channels;
            let period = time::Duration::from_millis(frame_ms);
            let mut interval = time::interval_at(Instant::now() + period, period);
            let mut timestamp_ms = 0u64;

            for samples in audio.samples.chunks(per_chunk) {
                interval.tick().await;
                timestamp_ms += frame_ms;
                let frame = AudioFrame {
                    samples: samples.to_vec(),
                    sample_rate: audio.sample_rate,
                    channels: audio.channels,
                    timestamp_ms,
                };
                if !sink.push(AudioChunk::from(&frame)) {
                    return;
                }
            }

            debug!("File replay reached end of {}", audio.path);
        }));

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(replay) = self.replay.take() {
            replay.abort();
        }
    }
}
