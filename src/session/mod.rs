//! Voice note capture sessions
//!
//! This module provides the `RecordingSession` state machine that manages:
//! - Device acquisition and release
//! - Chunk buffering and the elapsed-time ticker
//! - Artifact assembly and preview registration
//! - Teardown from every exit path (close, reset, unmount, submission)

mod config;
mod session;
mod snapshot;

pub use config::SessionConfig;
pub use session::{CloseTrigger, RecordingSession, TeardownTrigger};
pub use snapshot::{format_ticks, SessionSnapshot, SessionState};
