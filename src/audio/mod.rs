pub mod artifact;
pub mod backend;
pub mod chunk;
pub mod file;
pub mod preview;
pub mod synthetic;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use artifact::{Artifact, ArtifactBuilder, ArtifactInfo};
pub use backend::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioEncoding, AudioFrame, AudioSource,
    DeviceHandle, InputStream,
};
pub use chunk::{AudioChunk, ChunkBuffer, ChunkSink};
pub use file::{AudioFile, FileBackend};
pub use preview::{PreviewHandle, PreviewRegistry};
pub use synthetic::{DeviceTally, PermissionMode, SyntheticBackend};
