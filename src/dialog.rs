//! Lifecycle adapter for the dialog that embeds a voice note
//!
//! The dialog owns the visible lifetime of a capture session: opening creates
//! a fresh session, and every way of leaving (close button, backdrop, escape,
//! submission, unmount) converges on a single teardown.

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time;
use tracing::{debug, info, warn};

use crate::audio::{Artifact, AudioBackend, PreviewRegistry};
use crate::error::CaptureError;
use crate::session::{
    CloseTrigger, RecordingSession, SessionConfig, SessionSnapshot, SessionState, TeardownTrigger,
};

/// Form payload handed to the upload collaborator
#[derive(Debug, Clone)]
pub struct Submission {
    /// Captured voice note, if the user recorded one
    pub voice_note: Option<Arc<Artifact>>,
    /// Remaining form fields, opaque to the capture session
    pub fields: Value,
}

/// Receives submitted forms (server upload lives behind this)
#[async_trait::async_trait]
pub trait ArtifactUploader: Send + Sync {
    async fn upload(&self, submission: Submission) -> anyhow::Result<()>;
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("dialog is not open")]
    NotOpen,

    #[error("voice note is not ready to submit (state: {0})")]
    NotReady(SessionState),

    #[error("upload failed: {0}")]
    Upload(String),
}

/// The modal hosting a voice note capture
pub struct VoiceNoteDialog {
    backend: Arc<dyn AudioBackend>,
    previews: PreviewRegistry,
    session_defaults: SessionConfig,
    max_recording: Option<Duration>,
    session: Option<Arc<RecordingSession>>,
}

impl VoiceNoteDialog {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        previews: PreviewRegistry,
        session_defaults: SessionConfig,
    ) -> Self {
        Self {
            backend,
            previews,
            session_defaults,
            max_recording: None,
            session: None,
        }
    }

    /// Stop recordings automatically once they run this long
    pub fn with_max_recording(mut self, limit: Duration) -> Self {
        self.max_recording = Some(limit);
        self
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Arc<RecordingSession>> {
        self.session.as_ref()
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.session.as_ref().map(|session| session.snapshot())
    }

    /// Open the dialog with a fresh session in Idle
    pub fn open(&mut self) -> Arc<RecordingSession> {
        if let Some(previous) = self.session.take() {
            previous.teardown(TeardownTrigger::Reset);
        }

        let session = Arc::new(RecordingSession::new(
            self.session_defaults.fresh(),
            Arc::clone(&self.backend),
            self.previews.clone(),
        ));
        info!(session_id = session.id(), "voice note dialog opened");
        self.session = Some(Arc::clone(&session));
        session
    }

    /// Close request from any dismissal control
    pub fn close(&mut self, trigger: CloseTrigger) {
        match self.session.take() {
            Some(session) => {
                session.teardown(TeardownTrigger::Close(trigger));
                info!(session_id = session.id(), %trigger, "voice note dialog closed");
            }
            None => debug!(%trigger, "close ignored: dialog not open"),
        }
    }

    /// Begin recording in the open session
    ///
    /// The returned future owns its session reference, so the dialog can be
    /// closed while the device request is still pending.
    pub fn start_recording(&self) -> impl Future<Output = Result<(), CaptureError>> + Send + 'static {
        let session = self.session.clone();
        let limit = self.max_recording;
        async move {
            let Some(session) = session else {
                warn!("start ignored: dialog not open");
                return Ok(());
            };
            session.start().await?;
            schedule_auto_stop(&session, limit);
            Ok(())
        }
    }

    pub fn stop_recording(&self) -> Result<Option<Arc<Artifact>>, CaptureError> {
        match self.session.as_ref() {
            Some(session) => session.stop(),
            None => Ok(None),
        }
    }

    pub fn re_record(&self) -> impl Future<Output = Result<(), CaptureError>> + Send + 'static {
        let session = self.session.clone();
        let limit = self.max_recording;
        async move {
            let Some(session) = session else {
                return Ok(());
            };
            session.re_record().await?;
            schedule_auto_stop(&session, limit);
            Ok(())
        }
    }

    /// Hand the form and voice note to `uploader`, then tear the session down
    ///
    /// Rejected without side effects while a recording is pending, running,
    /// or failed. Once the upload has been attempted the session is torn down
    /// whatever the outcome.
    pub async fn submit(
        &mut self,
        uploader: &dyn ArtifactUploader,
        fields: Value,
    ) -> Result<(), SubmitError> {
        let session = self.session.as_ref().map(Arc::clone).ok_or(SubmitError::NotOpen)?;

        let state = session.state();
        if !state.allows_submission() {
            warn!(session_id = session.id(), %state, "submission rejected");
            return Err(SubmitError::NotReady(state));
        }

        let submission = Submission {
            voice_note: session.artifact(),
            fields,
        };
        let has_voice_note = submission.voice_note.is_some();
        let result = uploader.upload(submission).await;

        if let Some(current) = self.session.take() {
            current.teardown(TeardownTrigger::Submitted);
        }

        match result {
            Ok(()) => {
                info!(session_id = session.id(), has_voice_note, "voice note submitted");
                Ok(())
            }
            Err(e) => {
                warn!(session_id = session.id(), "submission failed: {:#}", e);
                Err(SubmitError::Upload(format!("{:#}", e)))
            }
        }
    }
}

/// Stop the current attempt once `limit` elapses
///
/// Bound to the attempt id, so a stale timer never stops a later re-record.
pub fn schedule_auto_stop(session: &Arc<RecordingSession>, limit: Option<Duration>) {
    let Some(limit) = limit else {
        return;
    };
    if session.state() != SessionState::Recording {
        return;
    }
    let Some(attempt) = session.attempt_id() else {
        return;
    };

    let session = Arc::downgrade(session);
    tokio::spawn(async move {
        time::sleep(limit).await;
        let Some(session) = session.upgrade() else {
            return;
        };
        match session.stop_attempt(attempt) {
            Ok(Some(artifact)) => info!(
                session_id = session.id(),
                name = artifact.suggested_name(),
                "recording limit reached, stopped automatically"
            ),
            Ok(None) => {}
            Err(err) => warn!(session_id = session.id(), error = %err, "automatic stop failed"),
        }
    });
}

impl Drop for VoiceNoteDialog {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.teardown(TeardownTrigger::Unmount);
        }
    }
}
