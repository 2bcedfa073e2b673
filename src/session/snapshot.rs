use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audio::ArtifactInfo;
use crate::error::CaptureError;

/// Observable state of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Requesting,
    Recording,
    Captured,
    Error,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Requesting => write!(f, "Requesting"),
            SessionState::Recording => write!(f, "Recording"),
            SessionState::Captured => write!(f, "Captured"),
            SessionState::Error => write!(f, "Error"),
        }
    }
}

impl SessionState {
    /// Submission is allowed with a captured note, or when none was started
    pub fn allows_submission(self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Captured)
    }
}

/// Everything the dialog needs to render the capture control
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,

    pub state: SessionState,

    /// Ticks recorded so far, frozen once captured
    pub elapsed_ticks: u64,

    /// `mm:ss` rendering of `elapsed_ticks` for one-second ticks
    pub elapsed_display: String,

    /// Current recording attempt, while requesting or recording
    pub attempt_id: Option<Uuid>,

    /// Whether a device stream is open right now
    pub device_open: bool,

    /// Chunks buffered in the current recording
    pub buffered_chunks: usize,

    /// Metadata of the captured voice note
    pub artifact: Option<ArtifactInfo>,

    /// Playable reference to the captured voice note
    pub preview_id: Option<Uuid>,

    /// `preview://` key of the captured voice note
    pub preview_url: Option<String>,

    /// Error kind in `Error`, or the notice left by a too-short recording
    pub error: Option<CaptureError>,

    /// Whether the enclosing form may be submitted now
    pub can_submit: bool,
}

/// Render a tick count as `mm:ss`
pub fn format_ticks(ticks: u64) -> String {
    format!("{:02}:{:02}", ticks / 60, ticks % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ticks() {
        assert_eq!(format_ticks(0), "00:00");
        assert_eq!(format_ticks(7), "00:07");
        assert_eq!(format_ticks(83), "01:23");
        assert_eq!(format_ticks(3600), "60:00");
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&SessionState::Captured).unwrap();
        assert_eq!(json, r#""captured""#);
    }
}
