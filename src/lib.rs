pub mod audio;
pub mod config;
pub mod dialog;
pub mod error;
pub mod http;
pub mod session;

pub use audio::{
    Artifact, ArtifactBuilder, AudioBackend, AudioBackendConfig, AudioBackendFactory,
    AudioEncoding, AudioSource, DeviceHandle, PreviewHandle, PreviewRegistry, SyntheticBackend,
};
pub use config::Config;
pub use dialog::{ArtifactUploader, Submission, SubmitError, VoiceNoteDialog};
pub use error::CaptureError;
pub use http::{create_router, AppState};
pub use session::{
    CloseTrigger, RecordingSession, SessionConfig, SessionSnapshot, SessionState, TeardownTrigger,
};
