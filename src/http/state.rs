use crate::audio::{AudioBackend, PreviewRegistry};
use crate::session::{RecordingSession, SessionConfig, TeardownTrigger};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info};

/// Open session plus the last time a request touched it
pub struct SessionEntry {
    pub session: Arc<RecordingSession>,
    pub last_seen: Instant,
}

impl SessionEntry {
    pub fn new(session: Arc<RecordingSession>) -> Self {
        Self {
            session,
            last_seen: Instant::now(),
        }
    }
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Open capture sessions (session_id → entry)
    pub sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,

    /// Playable references to captured voice notes
    pub previews: PreviewRegistry,

    /// Device source shared by every session
    pub backend: Arc<dyn AudioBackend>,

    /// Template for new sessions (ids are generated per session)
    pub session_defaults: SessionConfig,

    /// Automatic stop for long recordings
    pub max_recording: Option<Duration>,
}

impl AppState {
    pub fn new(backend: Arc<dyn AudioBackend>, session_defaults: SessionConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            previews: PreviewRegistry::new(),
            backend,
            session_defaults,
            max_recording: None,
        }
    }

    pub fn with_max_recording(mut self, limit: Option<Duration>) -> Self {
        self.max_recording = limit;
        self
    }

    /// Look up a session and mark it as seen
    pub async fn session(&self, session_id: &str) -> Option<Arc<RecordingSession>> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(session_id)?;
        entry.last_seen = Instant::now();
        Some(Arc::clone(&entry.session))
    }

    /// Tear down sessions no request has touched for `max_idle`
    ///
    /// Returns how many were expired.
    pub async fn expire_idle(&self, max_idle: Duration) -> usize {
        let expired: Vec<(String, SessionEntry)> = {
            let mut sessions = self.sessions.write().await;
            let stale: Vec<String> = sessions
                .iter()
                .filter(|(_, entry)| entry.last_seen.elapsed() >= max_idle)
                .map(|(id, _)| id.clone())
                .collect();
            stale
                .into_iter()
                .filter_map(|id| sessions.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        for (session_id, entry) in &expired {
            info!(
                session_id = %session_id,
                state = %entry.session.state(),
                "expiring idle voice note session"
            );
            entry.session.teardown(TeardownTrigger::Unmount);
        }
        expired.len()
    }

    /// Periodically expire sessions idle for longer than `max_idle`
    pub fn spawn_expiry(&self, max_idle: Duration) -> JoinHandle<()> {
        let state = self.clone();
        let period = (max_idle / 4).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                let expired = state.expire_idle(max_idle).await;
                if expired > 0 {
                    debug!(expired, "idle session sweep");
                }
            }
        })
    }

    /// Tear down every open session (server shutdown)
    pub async fn close_all(&self) {
        let sessions: Vec<_> = self.sessions.write().await.drain().collect();
        let count = sessions.len();
        for (_, entry) in sessions {
            entry.session.teardown(TeardownTrigger::Unmount);
        }
        info!(count, "closed all voice note sessions");
    }
}
