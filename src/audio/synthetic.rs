//! Synthetic audio backend
//!
//! Stands in for a real input device: acquisition resolves after an optional
//! delay (the permission prompt) to a configured outcome, and a granted stream
//! emits a continuous sine tone one chunk per buffer duration.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioEncoding, AudioFrame, DeviceHandle, InputStream};
use super::chunk::{AudioChunk, ChunkSink};
use crate::error::CaptureError;

/// Outcome of a synthetic permission prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    #[default]
    Granted,
    Denied,
    Unavailable,
}

/// Counters describing device ownership over a backend's lifetime
#[derive(Debug, Clone, Default)]
pub struct DeviceTally {
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    refused: Arc<AtomicUsize>,
}

impl DeviceTally {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn refused(&self) -> usize {
        self.refused.load(Ordering::SeqCst)
    }

    /// Handles currently open
    pub fn live(&self) -> usize {
        self.acquired().saturating_sub(self.released())
    }
}

/// In-process device producing a 440 Hz tone
pub struct SyntheticBackend {
    config: AudioBackendConfig,
    permission: PermissionMode,
    grant_delay: Duration,
    tally: DeviceTally,
}

impl SyntheticBackend {
    pub fn new(config: AudioBackendConfig) -> Self {
        Self {
            config,
            permission: PermissionMode::Granted,
            grant_delay: Duration::ZERO,
            tally: DeviceTally::default(),
        }
    }

    pub fn with_permission(mut self, permission: PermissionMode) -> Self {
        self.permission = permission;
        self
    }

    /// Delay before the permission prompt resolves
    pub fn with_grant_delay(mut self, delay: Duration) -> Self {
        self.grant_delay = delay;
        self
    }

    pub fn tally(&self) -> DeviceTally {
        self.tally.clone()
    }
}

#[async_trait::async_trait]
impl AudioBackend for SyntheticBackend {
    async fn acquire(&self) -> Result<DeviceHandle, CaptureError> {
        if !self.grant_delay.is_zero() {
            time::sleep(self.grant_delay).await;
        }

        match self.permission {
            PermissionMode::Denied => {
                self.tally.refused.fetch_add(1, Ordering::SeqCst);
                warn!("synthetic device: permission denied");
                Err(CaptureError::PermissionDenied)
            }
            PermissionMode::Unavailable => {
                self.tally.refused.fetch_add(1, Ordering::SeqCst);
                warn!("synthetic device: no input device");
                Err(CaptureError::DeviceUnavailable)
            }
            PermissionMode::Granted => {
                self.tally.acquired.fetch_add(1, Ordering::SeqCst);
                info!(
                    "Synthetic device acquired ({}Hz, {} channels)",
                    self.config.target_sample_rate, self.config.target_channels
                );

                let encoding = AudioEncoding::Pcm16 {
                    sample_rate: self.config.target_sample_rate,
                    channels: self.config.target_channels,
                };
                let stream = SyntheticStream {
                    config: self.config.clone(),
                    generator: None,
                    tally: self.tally.clone(),
                    stopped: false,
                };
                Ok(DeviceHandle::new(self.name(), encoding, Box::new(stream)))
            }
        }
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

struct SyntheticStream {
    config: AudioBackendConfig,
    generator: Option<JoinHandle<()>>,
    tally: DeviceTally,
    stopped: bool,
}

impl InputStream for SyntheticStream {
    fn record(&mut self, sink: ChunkSink) -> Result<(), CaptureError> {
        if self.stopped {
            return Err(CaptureError::StreamFailed("stream already stopped".to_string()));
        }
        if self.generator.is_some() {
            return Ok(());
        }

        let config = self.config.clone();
        self.generator = Some(tokio::spawn(async move {
            let period = config.frame_duration();
            let mut interval = time::interval_at(Instant::now() + period, period);
            let mut tone = ToneGenerator::new(config.target_sample_rate, config.target_channels);
            let mut timestamp_ms = 0u64;

            loop {
                interval.tick().await;
                timestamp_ms += config.buffer_duration_ms;
                let frame = tone.next_frame(config.samples_per_chunk(), timestamp_ms);
                if !sink.push(AudioChunk::from(&frame)) {
                    debug!("synthetic stream: buffer sealed");
                    break;
                }
            }
        }));

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(generator) = self.generator.take() {
            generator.abort();
        }
        if !self.stopped {
            self.stopped = true;
            self.tally.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Phase-continuous sine source
struct ToneGenerator {
    sample_rate: u32,
    channels: u16,
    position: u64,
}

impl ToneGenerator {
    const FREQUENCY_HZ: f64 = 440.0;
    const AMPLITUDE: f64 = 0.2;

    fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            position: 0,
        }
    }

    fn next_frame(&mut self, samples: usize, timestamp_ms: u64) -> AudioFrame {
        let channels = self.channels as usize;
        let mut out = Vec::with_capacity(samples);

        for _ in 0..samples / channels {
            let t = self.position as f64 / self.sample_rate as f64;
            let value = (2.0 * std::f64::consts::PI * Self::FREQUENCY_HZ * t).sin() * Self::AMPLITUDE;
            let sample = (value * i16::MAX as f64) as i16;
            out.extend(std::iter::repeat(sample).take(channels));
            self.position += 1;
        }

        AudioFrame {
            samples: out,
            sample_rate: self.sample_rate,
            channels: self.channels,
            timestamp_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_is_phase_continuous() {
        let mut a = ToneGenerator::new(16000, 1);
        let first = a.next_frame(160, 10);
        let second = a.next_frame(160, 20);

        let mut b = ToneGenerator::new(16000, 1);
        let whole = b.next_frame(320, 20);

        let joined: Vec<i16> = first.samples.into_iter().chain(second.samples).collect();
        assert_eq!(joined, whole.samples);
    }

    #[test]
    fn test_tone_duplicates_across_channels() {
        let mut tone = ToneGenerator::new(8000, 2);
        let frame = tone.next_frame(20, 0);
        assert_eq!(frame.samples.len(), 20);
        for pair in frame.samples.chunks_exact(2) {
            assert_eq!(pair[0], pair[1]);
        }
    }

    #[tokio::test]
    async fn test_denied_backend_counts_refusal() {
        let backend = SyntheticBackend::new(AudioBackendConfig::default())
            .with_permission(PermissionMode::Denied);
        let tally = backend.tally();

        let result = backend.acquire().await;
        assert_eq!(result.unwrap_err(), CaptureError::PermissionDenied);
        assert_eq!(tally.refused(), 1);
        assert_eq!(tally.acquired(), 0);
    }

    #[tokio::test]
    async fn test_dropping_handle_releases_device() {
        let backend = SyntheticBackend::new(AudioBackendConfig::default());
        let tally = backend.tally();

        let handle = backend.acquire().await.unwrap();
        assert_eq!(tally.live(), 1);
        drop(handle);
        assert_eq!(tally.live(), 0);
        assert_eq!(tally.released(), 1);
    }
}
