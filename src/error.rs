use serde::Serialize;
use thiserror::Error;

/// Failures a capture session can run into
///
/// `PermissionDenied`, `DeviceUnavailable` and `StreamFailed` end the current
/// attempt and leave the session in `Error`; `EmptyCapture` sends it back to
/// `Idle`. `TeardownRace` is only ever logged.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CaptureError {
    #[error("microphone access was denied")]
    PermissionDenied,

    #[error("no audio input device is available")]
    DeviceUnavailable,

    #[error("recording too short")]
    EmptyCapture,

    #[error("device resolved after the session was torn down")]
    TeardownRace,

    #[error("audio stream failed: {0}")]
    StreamFailed(String),

    #[error("failed to encode voice note: {0}")]
    Encoding(String),
}

impl CaptureError {
    /// Stable identifier used by the HTTP layer and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::PermissionDenied => "permission_denied",
            CaptureError::DeviceUnavailable => "device_unavailable",
            CaptureError::EmptyCapture => "empty_capture",
            CaptureError::TeardownRace => "teardown_race",
            CaptureError::StreamFailed(_) => "stream_failed",
            CaptureError::Encoding(_) => "encoding",
        }
    }

    /// Whether the dialog should render this error to the user
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, CaptureError::TeardownRace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teardown_race_is_internal() {
        assert!(!CaptureError::TeardownRace.is_user_visible());
        assert!(CaptureError::PermissionDenied.is_user_visible());
        assert!(CaptureError::EmptyCapture.is_user_visible());
    }

    #[test]
    fn test_error_serialization() {
        let json = serde_json::to_string(&CaptureError::PermissionDenied).unwrap();
        assert_eq!(json, r#"{"kind":"permission_denied"}"#);

        let json = serde_json::to_string(&CaptureError::StreamFailed("busy".into())).unwrap();
        assert!(json.contains("stream_failed"));
        assert!(json.contains("busy"));
    }

    #[test]
    fn test_empty_capture_message() {
        assert_eq!(CaptureError::EmptyCapture.to_string(), "recording too short");
    }
}
