use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;

use super::SessionStore;
use crate::dao::{
    models::{BuzzClaim, SessionPatch},
    storage::{StorageError, StorageResult},
};
use crate::state::game::{GameState, SessionId};

const BACKEND: &str = "memory";

/// Process-local session store, used when no database is configured and by tests.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    sessions: DashMap<SessionId, GameState>,
    offline: AtomicBool,
}

impl MemorySessionStore {
    /// Create an empty, online store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while offline every call fails with [`StorageError::Offline`].
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Whether no session has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            Err(StorageError::Offline { backend: BACKEND })
        } else {
            Ok(())
        }
    }

    fn create(&self, id: SessionId, initial: GameState) -> StorageResult<bool> {
        self.ensure_online()?;
        match self.inner.sessions.entry(id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(initial);
                Ok(true)
            }
        }
    }

    fn find(&self, id: &SessionId) -> StorageResult<Option<GameState>> {
        self.ensure_online()?;
        Ok(self.inner.sessions.get(id).map(|entry| entry.clone()))
    }

    fn save(&self, id: SessionId, state: GameState) -> StorageResult<()> {
        self.ensure_online()?;
        self.inner.sessions.insert(id, state);
        Ok(())
    }

    fn merge(&self, id: &SessionId, patch: SessionPatch) -> StorageResult<Option<GameState>> {
        self.ensure_online()?;
        Ok(self.inner.sessions.get_mut(id).map(|mut entry| {
            patch.apply_to(entry.value_mut());
            entry.clone()
        }))
    }

    fn claim(&self, id: &SessionId, name: String) -> StorageResult<BuzzClaim> {
        self.ensure_online()?;
        let Some(mut entry) = self.inner.sessions.get_mut(id) else {
            return Ok(BuzzClaim::SessionMissing);
        };
        if entry.has_buzzed_player() {
            return Ok(BuzzClaim::AlreadyClaimed);
        }
        entry.buzzed_player = Some(name);
        Ok(BuzzClaim::Claimed(entry.clone()))
    }
}

impl SessionStore for MemorySessionStore {
    fn create_session(
        &self,
        id: SessionId,
        initial: GameState,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.create(id, initial) })
    }

    fn session_exists(&self, id: SessionId) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.find(&id).map(|found| found.is_some()) })
    }

    fn find_session(&self, id: SessionId) -> BoxFuture<'static, StorageResult<Option<GameState>>> {
        let store = self.clone();
        Box::pin(async move { store.find(&id) })
    }

    fn save_session(
        &self,
        id: SessionId,
        state: GameState,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save(id, state) })
    }

    fn merge_session(
        &self,
        id: SessionId,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<Option<GameState>>> {
        let store = self.clone();
        Box::pin(async move { store.merge(&id, patch) })
    }

    fn claim_buzzer(
        &self,
        id: SessionId,
        name: String,
    ) -> BoxFuture<'static, StorageResult<BuzzClaim>> {
        let store = self.clone();
        Box::pin(async move { store.claim(&id, name) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> SessionId {
        SessionId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let store = MemorySessionStore::new();
        let first = GameState {
            round_counter: 7,
            ..GameState::default()
        };
        assert!(store.create_session(id("AB12"), first).await.unwrap());
        assert!(
            !store
                .create_session(id("AB12"), GameState::default())
                .await
                .unwrap()
        );
        assert_eq!(store.len(), 1);
        let kept = store.find_session(id("AB12")).await.unwrap().unwrap();
        assert_eq!(kept.round_counter, 7);
    }

    #[tokio::test]
    async fn claim_is_first_write_wins() {
        let store = MemorySessionStore::new();
        store
            .create_session(id("AB12"), GameState::default())
            .await
            .unwrap();

        let first = store.claim_buzzer(id("AB12"), "X".into()).await.unwrap();
        assert!(matches!(first, BuzzClaim::Claimed(ref s) if s.buzzed_player.as_deref() == Some("X")));
        let second = store.claim_buzzer(id("AB12"), "Y".into()).await.unwrap();
        assert_eq!(second, BuzzClaim::AlreadyClaimed);
        let missing = store.claim_buzzer(id("ZZ99"), "Y".into()).await.unwrap();
        assert_eq!(missing, BuzzClaim::SessionMissing);
    }

    #[tokio::test]
    async fn merge_on_missing_session_returns_none() {
        let store = MemorySessionStore::new();
        let merged = store
            .merge_session(id("AB12"), SessionPatch::starting_team(crate::state::game::Team::B))
            .await
            .unwrap();
        assert!(merged.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = MemorySessionStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.session_exists(id("AB12")).await,
            Err(StorageError::Offline { .. })
        ));
        assert!(store.health_check().await.is_err());
        store.set_offline(false);
        assert!(store.health_check().await.is_ok());
    }
}
