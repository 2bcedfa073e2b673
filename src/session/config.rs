use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "voice-note-<uuid>")
    pub session_id: String,

    /// Granularity of the elapsed-time counter
    /// Default: 1 second
    pub tick_interval: Duration,

    /// Prefix for generated artifact names
    pub artifact_name_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("voice-note-{}", uuid::Uuid::new_v4()),
            tick_interval: Duration::from_secs(1),
            artifact_name_prefix: "voice-note".to_string(),
        }
    }
}

impl SessionConfig {
    /// Same settings under a freshly generated session id
    pub fn fresh(&self) -> Self {
        Self {
            session_id: format!("voice-note-{}", uuid::Uuid::new_v4()),
            ..self.clone()
        }
    }
}
