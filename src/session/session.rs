use super::config::SessionConfig;
use super::snapshot::{format_ticks, SessionSnapshot, SessionState};
use crate::audio::{
    Artifact, ArtifactBuilder, ArtifactInfo, AudioBackend, ChunkBuffer, DeviceHandle,
    PreviewHandle, PreviewRegistry,
};
use crate::error::CaptureError;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shortest tick period the elapsed-time counter runs at
const MIN_TICK: Duration = Duration::from_millis(1);

/// How the user dismissed the enclosing dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseTrigger {
    #[default]
    Button,
    Backdrop,
    Escape,
}

impl std::fmt::Display for CloseTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseTrigger::Button => write!(f, "button"),
            CloseTrigger::Backdrop => write!(f, "backdrop"),
            CloseTrigger::Escape => write!(f, "escape"),
        }
    }
}

/// Why a session is being torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownTrigger {
    /// Fresh attempt requested (dialog re-opened, validation reset)
    Reset,
    /// Dialog close request
    Close(CloseTrigger),
    /// Owning component went away
    Unmount,
    /// Artifact handed off after submission
    Submitted,
}

impl std::fmt::Display for TeardownTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeardownTrigger::Reset => write!(f, "reset"),
            TeardownTrigger::Close(trigger) => write!(f, "close:{}", trigger),
            TeardownTrigger::Unmount => write!(f, "unmount"),
            TeardownTrigger::Submitted => write!(f, "submitted"),
        }
    }
}

/// A single voice note capture, from device request to captured artifact
///
/// All transitions take `&self`: state lives behind a short-held lock that is
/// never kept across an await, so `teardown` can run while `start` is still
/// waiting on the device.
pub struct RecordingSession {
    config: SessionConfig,
    backend: Arc<dyn AudioBackend>,
    builder: ArtifactBuilder,
    previews: PreviewRegistry,
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    phase: Phase,
    elapsed_ticks: u64,
    /// Error surfaced while back in Idle (too-short recording)
    notice: Option<CaptureError>,
}

impl Inner {
    fn visible_error(&self) -> Option<CaptureError> {
        let err = match &self.phase {
            Phase::Error(err) => Some(err),
            Phase::Idle => self.notice.as_ref(),
            _ => None,
        };
        err.filter(|err| err.is_user_visible()).cloned()
    }
}

enum Phase {
    Idle,
    Requesting { attempt: Uuid },
    Recording(ActiveRecording),
    Captured(CapturedNote),
    Error(CaptureError),
}

impl Phase {
    fn state(&self) -> SessionState {
        match self {
            Phase::Idle => SessionState::Idle,
            Phase::Requesting { .. } => SessionState::Requesting,
            Phase::Recording(_) => SessionState::Recording,
            Phase::Captured(_) => SessionState::Captured,
            Phase::Error(_) => SessionState::Error,
        }
    }

    fn is_requesting(&self, id: Uuid) -> bool {
        matches!(self, Phase::Requesting { attempt } if *attempt == id)
    }
}

struct ActiveRecording {
    attempt: Uuid,
    device: DeviceHandle,
    buffer: ChunkBuffer,
    ticker: JoinHandle<()>,
    started_at: Instant,
}

impl ActiveRecording {
    /// Cancel the ticker, then stop and release the device
    fn shut_down(&mut self) {
        self.ticker.abort();
        self.device.release();
    }
}

struct CapturedNote {
    artifact: Arc<Artifact>,
    preview: PreviewHandle,
}

impl RecordingSession {
    pub fn new(
        config: SessionConfig,
        backend: Arc<dyn AudioBackend>,
        previews: PreviewRegistry,
    ) -> Self {
        info!(
            "Creating voice note session: {} (backend: {})",
            config.session_id,
            backend.name()
        );

        Self {
            builder: ArtifactBuilder::new(config.artifact_name_prefix.clone()),
            config,
            backend,
            previews,
            inner: Arc::new(Mutex::new(Inner {
                phase: Phase::Idle,
                elapsed_ticks: 0,
                notice: None,
            })),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.session_id
    }

    pub fn state(&self) -> SessionState {
        self.lock().phase.state()
    }

    pub fn elapsed_ticks(&self) -> u64 {
        self.lock().elapsed_ticks
    }

    /// Current recording attempt, while requesting or recording
    pub fn attempt_id(&self) -> Option<Uuid> {
        match &self.lock().phase {
            Phase::Requesting { attempt } => Some(*attempt),
            Phase::Recording(active) => Some(active.attempt),
            _ => None,
        }
    }

    pub fn artifact(&self) -> Option<Arc<Artifact>> {
        match &self.lock().phase {
            Phase::Captured(note) => Some(Arc::clone(&note.artifact)),
            _ => None,
        }
    }

    pub fn preview_id(&self) -> Option<Uuid> {
        match &self.lock().phase {
            Phase::Captured(note) => Some(note.preview.id()),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<CaptureError> {
        self.lock().visible_error()
    }

    pub fn can_submit(&self) -> bool {
        self.state().allows_submission()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        let state = inner.phase.state();

        let (attempt_id, device_open, buffered_chunks) = match &inner.phase {
            Phase::Requesting { attempt } => (Some(*attempt), false, 0),
            Phase::Recording(active) => (
                Some(active.attempt),
                !active.device.is_released(),
                active.buffer.len(),
            ),
            _ => (None, false, 0),
        };

        let (artifact, preview_id, preview_url) = match &inner.phase {
            Phase::Captured(note) => (
                Some(ArtifactInfo::from(note.artifact.as_ref())),
                Some(note.preview.id()),
                Some(note.preview.url()),
            ),
            _ => (None, None, None),
        };

        SessionSnapshot {
            session_id: self.config.session_id.clone(),
            state,
            elapsed_ticks: inner.elapsed_ticks,
            elapsed_display: format_ticks(inner.elapsed_ticks),
            attempt_id,
            device_open,
            buffered_chunks,
            artifact,
            preview_id,
            preview_url,
            error: inner.visible_error(),
            can_submit: state.allows_submission(),
        }
    }

    /// Acquire a device and begin recording
    ///
    /// No-op while a request or recording is already in flight, and while a
    /// captured note is waiting (use [`re_record`](Self::re_record)).
    pub async fn start(&self) -> Result<(), CaptureError> {
        let attempt = {
            let mut inner = self.lock();
            match &inner.phase {
                Phase::Idle | Phase::Error(_) => {}
                Phase::Requesting { .. } | Phase::Recording(_) => {
                    debug!(session_id = %self.config.session_id, "start ignored: capture already active");
                    return Ok(());
                }
                Phase::Captured(_) => {
                    warn!(session_id = %self.config.session_id, "start ignored: discard the captured note first");
                    return Ok(());
                }
            }

            let attempt = Uuid::new_v4();
            inner.phase = Phase::Requesting { attempt };
            inner.elapsed_ticks = 0;
            inner.notice = None;
            attempt
        };

        info!(
            session_id = %self.config.session_id,
            %attempt,
            backend = self.backend.name(),
            "requesting audio input device"
        );

        let mut pending = PendingAcquire {
            inner: &self.inner,
            attempt,
            armed: true,
        };
        let result = self.backend.acquire().await;
        pending.armed = false;

        self.complete_start(attempt, result)
    }

    fn complete_start(
        &self,
        attempt: Uuid,
        result: Result<DeviceHandle, CaptureError>,
    ) -> Result<(), CaptureError> {
        let mut inner = self.lock();
        let current = inner.phase.is_requesting(attempt);

        match result {
            Ok(mut device) if !current => {
                warn!(
                    session_id = %self.config.session_id,
                    %attempt,
                    device = %device.id(),
                    reason = %CaptureError::TeardownRace,
                    "releasing late device"
                );
                device.release();
                Ok(())
            }
            Err(err) if !current => {
                debug!(%attempt, error = %err, "device request failed after teardown");
                Ok(())
            }
            Ok(mut device) => {
                let buffer = ChunkBuffer::new();
                if let Err(err) = device.start_recording(buffer.sink()) {
                    device.release();
                    warn!(session_id = %self.config.session_id, error = %err, "input stream failed to start");
                    inner.phase = Phase::Error(err.clone());
                    return Err(err);
                }

                let ticker = self.spawn_ticker(attempt);
                info!(
                    session_id = %self.config.session_id,
                    %attempt,
                    device = %device.id(),
                    backend = device.backend(),
                    encoding = %device.encoding().stream_mime_type(),
                    "recording started"
                );
                inner.phase = Phase::Recording(ActiveRecording {
                    attempt,
                    device,
                    buffer,
                    ticker,
                    started_at: Instant::now(),
                });
                Ok(())
            }
            Err(err) => {
                warn!(session_id = %self.config.session_id, error = %err, "device request failed");
                inner.phase = Phase::Error(err.clone());
                Err(err)
            }
        }
    }

    fn spawn_ticker(&self, attempt: Uuid) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        let period = self.config.tick_interval.max(MIN_TICK);

        tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let mut inner = lock(&inner);
                let live = matches!(&inner.phase, Phase::Recording(active) if active.attempt == attempt);
                if !live {
                    break;
                }
                inner.elapsed_ticks += 1;
            }
        })
    }

    /// Stop recording and capture the voice note
    ///
    /// Returns `Ok(None)` when nothing is recording. A recording with no
    /// audio yields `EmptyCapture` and leaves the session in Idle.
    pub fn stop(&self) -> Result<Option<Arc<Artifact>>, CaptureError> {
        self.finish_recording(None)
    }

    /// Stop only if `attempt` is still the active recording
    ///
    /// Used by timers scheduled against one attempt so they never stop a
    /// later re-record.
    pub fn stop_attempt(&self, attempt: Uuid) -> Result<Option<Arc<Artifact>>, CaptureError> {
        self.finish_recording(Some(attempt))
    }

    fn finish_recording(
        &self,
        expected: Option<Uuid>,
    ) -> Result<Option<Arc<Artifact>>, CaptureError> {
        let mut inner = self.lock();
        let matches = match &inner.phase {
            Phase::Recording(active) => expected.map_or(true, |id| id == active.attempt),
            _ => false,
        };
        if !matches {
            debug!(state = %inner.phase.state(), "stop ignored");
            return Ok(None);
        }

        let Phase::Recording(mut active) = std::mem::replace(&mut inner.phase, Phase::Idle) else {
            return Ok(None);
        };

        active.shut_down();
        let chunks = active.buffer.seal();
        let recorded_ms = active.started_at.elapsed().as_millis() as u64;

        match self.builder.build(&chunks, active.device.encoding()) {
            Ok(artifact) => {
                let artifact = Arc::new(artifact);
                let preview = self.previews.register(Arc::clone(&artifact));
                info!(
                    session_id = %self.config.session_id,
                    ticks = inner.elapsed_ticks,
                    recorded_ms,
                    chunks = chunks.len(),
                    bytes = artifact.len(),
                    name = artifact.suggested_name(),
                    "voice note captured"
                );
                inner.phase = Phase::Captured(CapturedNote {
                    artifact: Arc::clone(&artifact),
                    preview,
                });
                Ok(Some(artifact))
            }
            Err(err) => {
                warn!(session_id = %self.config.session_id, recorded_ms, error = %err, "discarding capture");
                inner.elapsed_ticks = 0;
                inner.notice = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Discard the captured note and record again
    pub async fn re_record(&self) -> Result<(), CaptureError> {
        {
            let mut inner = self.lock();
            match std::mem::replace(&mut inner.phase, Phase::Idle) {
                Phase::Captured(mut note) => {
                    note.preview.release();
                    inner.elapsed_ticks = 0;
                    info!(
                        session_id = %self.config.session_id,
                        discarded = note.artifact.suggested_name(),
                        "re-recording"
                    );
                }
                other => {
                    debug!(state = %other.state(), "re-record ignored");
                    inner.phase = other;
                    return Ok(());
                }
            }
        }

        self.start().await
    }

    /// Return to Idle, discarding any capture in progress or captured
    pub fn reset(&self) {
        self.teardown(TeardownTrigger::Reset);
    }

    /// Release everything the session owns
    ///
    /// Safe to call any number of times and while `start` is waiting on the
    /// device: the pending attempt is invalidated first, and its late result
    /// is released on arrival.
    pub fn teardown(&self, trigger: TeardownTrigger) {
        let mut inner = self.lock();
        let previous = std::mem::replace(&mut inner.phase, Phase::Idle);
        let from = previous.state();

        match previous {
            Phase::Idle => {
                inner.elapsed_ticks = 0;
                inner.notice = None;
                debug!(session_id = %self.config.session_id, %trigger, "teardown: nothing held");
                return;
            }
            Phase::Requesting { attempt } => {
                debug!(%attempt, "pending device request invalidated");
            }
            Phase::Recording(mut active) => {
                active.shut_down();
                active.buffer.clear();
            }
            Phase::Captured(mut note) => {
                note.preview.release();
            }
            Phase::Error(_) => {}
        }

        inner.elapsed_ticks = 0;
        inner.notice = None;
        info!(session_id = %self.config.session_id, %trigger, %from, "session torn down");
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.teardown(TeardownTrigger::Unmount);
    }
}

/// Returns the session to Idle if a `start` future is dropped mid-request
struct PendingAcquire<'a> {
    inner: &'a Mutex<Inner>,
    attempt: Uuid,
    armed: bool,
}

impl Drop for PendingAcquire<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = lock(self.inner);
        if inner.phase.is_requesting(self.attempt) {
            inner.phase = Phase::Idle;
            warn!(attempt = %self.attempt, "device request abandoned");
        }
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}
