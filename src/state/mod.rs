pub mod game;
pub mod hub;
pub mod rooms;
pub mod state_machine;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, watch};

use crate::{
    config::AppConfig,
    dao::session_store::SessionStore,
    error::ServiceError,
    state::{
        game::SessionId, hub::BroadcastHub, rooms::RoomRegistry,
        state_machine::SessionStateMachine,
    },
};

pub type SharedState = Arc<AppState>;

type GateMap = DashMap<SessionId, Arc<Mutex<()>>>;

/// Exclusive mutation rights on one session.
///
/// The gate entry is dropped from the map once no task holds or waits on it.
pub struct SessionGate {
    guard: Option<OwnedMutexGuard<()>>,
    gates: Arc<GateMap>,
    id: SessionId,
}

impl Drop for SessionGate {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.gates
            .remove_if(&self.id, |_, gate| Arc::strong_count(gate) == 1);
    }
}

/// Central application state storing live connections and the session store handle.
pub struct AppState {
    session_store: RwLock<Option<Arc<dyn SessionStore>>>,
    degraded: watch::Sender<bool>,
    rooms: RoomRegistry,
    hub: BroadcastHub,
    machine: SessionStateMachine,
    session_gates: Arc<GateMap>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            session_store: RwLock::new(None),
            degraded: degraded_tx,
            rooms: RoomRegistry::new(),
            hub: BroadcastHub::new(),
            machine: SessionStateMachine::new(config.session_ttl()),
            session_gates: Arc::new(DashMap::new()),
            config,
        })
    }

    /// Obtain a handle to the current session store, if one is installed.
    pub async fn session_store(&self) -> Option<Arc<dyn SessionStore>> {
        let guard = self.session_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new session store implementation and leave degraded mode.
    pub async fn set_session_store(&self, store: Arc<dyn SessionStore>) {
        {
            let mut guard = self.session_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Store handle for a session operation, or the reason none is usable.
    pub async fn require_session_store(&self) -> Result<Arc<dyn SessionStore>, ServiceError> {
        if self.is_degraded().await {
            return Err(ServiceError::Degraded);
        }
        self.session_store().await.ok_or(ServiceError::Degraded)
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Registry of session rooms and player seats.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Outbound queues of every live connection.
    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    pub fn state_machine(&self) -> &SessionStateMachine {
        &self.machine
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Wait for exclusive mutation rights on a session.
    ///
    /// Waiters are served in arrival order. Returns `None` when mutations are not serialized.
    pub async fn lock_session(&self, id: &SessionId) -> Option<SessionGate> {
        if !self.config.serialize_session_mutations {
            return None;
        }
        let gate = self
            .session_gates
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = gate.lock_owned().await;
        Some(SessionGate {
            guard: Some(guard),
            gates: Arc::clone(&self.session_gates),
            id: id.clone(),
        })
    }

    /// Number of sessions with a held or awaited mutation gate.
    pub fn active_gates(&self) -> usize {
        self.session_gates.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dao::session_store::MemorySessionStore;

    #[tokio::test]
    async fn starts_degraded_until_store_installed() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded().await);
        assert!(matches!(
            state.require_session_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .set_session_store(Arc::new(MemorySessionStore::new()))
            .await;
        assert!(!state.is_degraded().await);
        assert!(state.require_session_store().await.is_ok());

        state.update_degraded(true).await;
        assert!(state.require_session_store().await.is_err());
    }

    #[tokio::test]
    async fn session_gate_serializes_mutations() {
        let state = AppState::new(AppConfig::default());
        let id = SessionId::parse("AB12").unwrap();

        let guard = state.lock_session(&id).await;
        assert!(guard.is_some());

        let waiter = {
            let state = state.clone();
            let id = id.clone();
            tokio::spawn(async move { state.lock_session(&id).await.is_some() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        assert!(waiter.await.unwrap());
        assert_eq!(state.active_gates(), 0);
    }

    #[tokio::test]
    async fn released_gates_leave_no_entry() {
        let state = AppState::new(AppConfig::default());
        for raw in ["0000", "0001", "0002"] {
            let id = SessionId::parse(raw).unwrap();
            let gate = state.lock_session(&id).await;
            assert_eq!(state.active_gates(), 1);
            drop(gate);
        }
        assert_eq!(state.active_gates(), 0);
    }

    #[tokio::test]
    async fn gate_disabled_by_config() {
        let state = AppState::new(AppConfig {
            serialize_session_mutations: false,
            ..AppConfig::default()
        });
        let id = SessionId::parse("AB12").unwrap();
        assert!(state.lock_session(&id).await.is_none());
    }
}
