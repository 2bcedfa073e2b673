//! Default input device capture using cpal
//!
//! cpal streams are not `Send` on every platform, so each acquired device
//! lives on its own thread. The thread builds and plays the stream while the
//! acquisition is pending, then parks until the handle is released.

use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, PoisonError};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioEncoding, DeviceHandle, InputStream};
use super::chunk::{AudioChunk, ChunkSink};
use crate::error::CaptureError;

type SinkSlot = Arc<Mutex<Option<ChunkSink>>>;

/// Captures from the host's default input device
pub struct MicrophoneBackend {
    config: AudioBackendConfig,
}

impl MicrophoneBackend {
    pub fn new(config: AudioBackendConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl AudioBackend for MicrophoneBackend {
    async fn acquire(&self) -> Result<DeviceHandle, CaptureError> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (release_tx, release_rx) = std_mpsc::channel::<()>();
        let slot: SinkSlot = Arc::new(Mutex::new(None));
        let thread_slot = Arc::clone(&slot);
        let preferred_rate = self.config.target_sample_rate;

        std::thread::Builder::new()
            .name("voice-note-mic".to_string())
            .spawn(move || run_device(preferred_rate, thread_slot, ready_tx, release_rx))
            .map_err(|e| CaptureError::StreamFailed(e.to_string()))?;

        let encoding = ready_rx
            .await
            .map_err(|_| CaptureError::StreamFailed("device thread exited".to_string()))??;

        let stream = MicrophoneStream {
            slot,
            release: Some(release_tx),
        };
        Ok(DeviceHandle::new(self.name(), encoding, Box::new(stream)))
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

struct MicrophoneStream {
    slot: SinkSlot,
    release: Option<std_mpsc::Sender<()>>,
}

impl InputStream for MicrophoneStream {
    fn record(&mut self, sink: ChunkSink) -> Result<(), CaptureError> {
        if self.release.is_none() {
            return Err(CaptureError::StreamFailed("stream already stopped".to_string()));
        }
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        // Wakes the device thread, which drops the stream.
        if let Some(release) = self.release.take() {
            let _ = release.send(());
        }
    }
}

fn run_device(
    preferred_rate: u32,
    slot: SinkSlot,
    ready: oneshot::Sender<Result<AudioEncoding, CaptureError>>,
    release: std_mpsc::Receiver<()>,
) {
    let stream = match open_stream(preferred_rate, slot) {
        Ok((stream, encoding)) => {
            let _ = ready.send(Ok(encoding));
            stream
        }
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    // Blocks until the handle is released or dropped.
    let _ = release.recv();
    drop(stream);
    info!("Microphone stream closed");
}

fn open_stream(preferred_rate: u32, slot: SinkSlot) -> Result<(Stream, AudioEncoding), CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(CaptureError::DeviceUnavailable)?;

    info!("Using audio input device: {:?}", device.name());

    let supported = device.default_input_config().map_err(|e| classify(e.to_string()))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();

    if config.sample_rate.0 != preferred_rate {
        warn!(
            "Input device runs at {} Hz (configured {} Hz), recording at device rate",
            config.sample_rate.0, preferred_rate
        );
    }

    let stream = match sample_format {
        SampleFormat::I16 => build_stream::<i16>(&device, &config, slot),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, slot),
        SampleFormat::F32 => build_stream::<f32>(&device, &config, slot),
        other => Err(CaptureError::StreamFailed(format!(
            "unsupported sample format {:?}",
            other
        ))),
    }?;

    stream.play().map_err(|e| classify(e.to_string()))?;

    let encoding = AudioEncoding::Pcm16 {
        sample_rate: config.sample_rate.0,
        channels: config.channels,
    };
    Ok((stream, encoding))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    slot: SinkSlot,
) -> Result<Stream, CaptureError>
where
    T: SizedSample + Send + 'static,
    i16: FromSample<T>,
{
    let sample_rate = config.sample_rate.0 as u64;
    let channels = config.channels.max(1) as u64;
    let mut written: u64 = 0;

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
                let Some(sink) = guard.as_ref() else {
                    return;
                };

                let bytes: Vec<u8> = data
                    .iter()
                    .flat_map(|&s| s.to_sample::<i16>().to_le_bytes())
                    .collect();
                written += data.len() as u64;
                let timestamp_ms = written / channels * 1000 / sample_rate.max(1);
                sink.push(AudioChunk::new(bytes, timestamp_ms));
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| classify(e.to_string()))
}

/// Map host errors onto the capture taxonomy
fn classify(message: String) -> CaptureError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized") {
        CaptureError::PermissionDenied
    } else if lower.contains("not available") || lower.contains("no device") {
        CaptureError::DeviceUnavailable
    } else {
        CaptureError::StreamFailed(message)
    }
}
