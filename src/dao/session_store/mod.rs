pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;

use crate::dao::models::{BuzzClaim, SessionPatch};
use crate::dao::storage::StorageResult;
use crate::state::game::{GameState, SessionId};

pub use memory::MemorySessionStore;

/// Abstraction over the document store holding one game state per session.
pub trait SessionStore: Send + Sync {
    /// Insert `initial` unless a record already exists. Returns `true` when a record was created.
    fn create_session(
        &self,
        id: SessionId,
        initial: GameState,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    fn session_exists(&self, id: SessionId) -> BoxFuture<'static, StorageResult<bool>>;
    fn find_session(&self, id: SessionId) -> BoxFuture<'static, StorageResult<Option<GameState>>>;
    /// Replace the whole snapshot of the session.
    fn save_session(&self, id: SessionId, state: GameState)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Merge individual fields into an existing record. Returns the merged state, or `None` when the session is missing.
    fn merge_session(
        &self,
        id: SessionId,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<Option<GameState>>>;
    /// Set `buzzedPlayer` to `name` only if no player holds the buzzer yet.
    fn claim_buzzer(&self, id: SessionId, name: String)
    -> BoxFuture<'static, StorageResult<BuzzClaim>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
