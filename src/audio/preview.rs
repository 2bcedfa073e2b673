//! Playable references to captured voice notes
//!
//! The registry plays the role of an object-URL store: a captured artifact is
//! registered once, the dialog plays it back through the returned key, and the
//! key is revoked when the artifact is discarded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};
use uuid::Uuid;

use super::artifact::Artifact;

#[derive(Debug, Default)]
struct RegistryState {
    entries: HashMap<Uuid, Arc<Artifact>>,
    created: usize,
    revoked: usize,
}

/// Shared store of live previews
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `artifact` playable until the returned handle is released
    pub fn register(&self, artifact: Arc<Artifact>) -> PreviewHandle {
        let id = Uuid::new_v4();
        {
            let mut state = self.lock();
            state.entries.insert(id, artifact);
            state.created += 1;
        }
        debug!(preview = %id, "preview registered");
        PreviewHandle {
            id,
            registry: self.clone(),
            released: false,
        }
    }

    /// Look up a live preview for playback
    pub fn resolve(&self, id: Uuid) -> Option<Arc<Artifact>> {
        self.lock().entries.get(&id).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn created_count(&self) -> usize {
        self.lock().created
    }

    pub fn revoked_count(&self) -> usize {
        self.lock().revoked
    }

    fn revoke(&self, id: Uuid) -> bool {
        let mut state = self.lock();
        if state.entries.remove(&id).is_some() {
            state.revoked += 1;
            true
        } else {
            false
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owned reference to one registered preview
///
/// Released at most once; dropping an unreleased handle revokes it.
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    registry: PreviewRegistry,
    released: bool,
}

impl PreviewHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> String {
        format!("preview://{}", self.id)
    }

    /// Free the preview memory
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if self.registry.revoke(self.id) {
            debug!(preview = %self.id, "preview revoked");
        } else {
            warn!(preview = %self.id, "preview was already gone from the registry");
        }
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{ArtifactBuilder, AudioChunk, AudioEncoding};

    fn artifact() -> Arc<Artifact> {
        let chunks = vec![AudioChunk::new(vec![0, 1, 2, 3], 0)];
        let encoding = AudioEncoding::Container {
            mime_type: "audio/webm;codecs=opus".to_string(),
            extension: "webm".to_string(),
        };
        Arc::new(ArtifactBuilder::default().build(&chunks, &encoding).unwrap())
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = PreviewRegistry::new();
        let handle = registry.register(artifact());

        assert_eq!(registry.live_count(), 1);
        assert!(handle.url().starts_with("preview://"));
        assert!(registry.resolve(handle.id()).is_some());
    }

    #[test]
    fn test_release_is_idempotent() {
        let registry = PreviewRegistry::new();
        let mut handle = registry.register(artifact());
        let id = handle.id();

        handle.release();
        handle.release();
        drop(handle);

        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.revoked_count(), 1);
        assert!(registry.resolve(id).is_none());
    }

    #[test]
    fn test_drop_revokes() {
        let registry = PreviewRegistry::new();
        {
            let _handle = registry.register(artifact());
            assert_eq!(registry.live_count(), 1);
        }
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.created_count(), 1);
        assert_eq!(registry.revoked_count(), 1);
    }
}
