use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::backend::AudioFrame;

/// One encoded fragment of a continuous capture stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Encoded bytes exactly as the stream produced them
    pub data: Vec<u8>,
    /// Milliseconds since the stream started recording
    pub timestamp_ms: u64,
}

impl AudioChunk {
    pub fn new(data: Vec<u8>, timestamp_ms: u64) -> Self {
        Self { data, timestamp_ms }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<&AudioFrame> for AudioChunk {
    fn from(frame: &AudioFrame) -> Self {
        Self::new(frame.to_pcm_bytes(), frame.timestamp_ms)
    }
}

#[derive(Debug, Default)]
struct ChunkState {
    chunks: Vec<AudioChunk>,
    total_bytes: usize,
    sealed: bool,
}

/// Append-only buffer owned by a recording session
///
/// Streams only ever see a [`ChunkSink`]; once the owner seals the buffer,
/// further pushes are dropped so the capture is frozen.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    state: Arc<Mutex<ChunkState>>,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer side handed to the device stream
    pub fn sink(&self) -> ChunkSink {
        ChunkSink {
            state: Arc::clone(&self.state),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.state).chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_bytes(&self) -> usize {
        lock(&self.state).total_bytes
    }

    /// Stop accepting chunks and take everything captured, in order
    pub fn seal(&self) -> Vec<AudioChunk> {
        let mut state = lock(&self.state);
        state.sealed = true;
        state.total_bytes = 0;
        std::mem::take(&mut state.chunks)
    }

    /// Seal and throw away whatever was captured
    pub fn clear(&self) {
        let dropped = self.seal();
        if !dropped.is_empty() {
            debug!(chunks = dropped.len(), "discarded buffered audio");
        }
    }
}

/// Producer handle a device stream appends through
#[derive(Debug, Clone)]
pub struct ChunkSink {
    state: Arc<Mutex<ChunkState>>,
}

impl ChunkSink {
    /// Append a chunk; returns false once the buffer is sealed
    pub fn push(&self, chunk: AudioChunk) -> bool {
        let mut state = lock(&self.state);
        if state.sealed {
            return false;
        }
        if chunk.is_empty() {
            return true;
        }
        state.total_bytes += chunk.len();
        state.chunks.push(chunk);
        true
    }

    pub fn is_sealed(&self) -> bool {
        lock(&self.state).sealed
    }
}

fn lock(state: &Mutex<ChunkState>) -> MutexGuard<'_, ChunkState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
