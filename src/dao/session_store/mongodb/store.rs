use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{
    Client, Collection, Database,
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::ReturnDocument,
};
use tokio::sync::RwLock;
use tracing::info;

use super::{
    config::MongoConfig,
    connection::{establish_connection, ping},
    error::{MongoDaoError, MongoResult},
    models::{MongoSessionDocument, doc_id, patch_update, unclaimed_buzzer},
};
use crate::dao::{
    models::{BuzzClaim, SessionPatch},
    session_store::SessionStore,
    storage::StorageResult,
};
use crate::state::game::{GameState, SessionId};

const SESSION_COLLECTION_NAME: &str = "sessions";
const DUPLICATE_KEY: i32 = 11000;

/// MongoDB-backed [`SessionStore`].
#[derive(Clone)]
pub struct MongoSessionStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        ping(&database)
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoSessionStore {
    /// Connect to MongoDB, retrying the initial ping a few times.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;
        info!(database = %config.database_name, "connected to MongoDB");

        Ok(Self {
            inner: Arc::new(MongoInner {
                state: RwLock::new(MongoState { client, database }),
                config,
            }),
        })
    }

    async fn collection(&self) -> Collection<MongoSessionDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME)
    }

    async fn create(&self, id: SessionId, initial: GameState) -> MongoResult<bool> {
        let collection = self.collection().await;
        let document = MongoSessionDocument::new(&id, initial);
        match collection.insert_one(&document).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::CreateSession {
                id: id.to_string(),
                source,
            }),
        }
    }

    async fn exists(&self, id: SessionId) -> MongoResult<bool> {
        let collection = self.collection().await;
        let count = collection
            .count_documents(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::LoadSession {
                id: id.to_string(),
                source,
            })?;
        Ok(count > 0)
    }

    async fn find(&self, id: SessionId) -> MongoResult<Option<GameState>> {
        let collection = self.collection().await;
        let document = collection
            .find_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::LoadSession {
                id: id.to_string(),
                source,
            })?;
        Ok(document.map(|doc| doc.state))
    }

    async fn save(&self, id: SessionId, state: GameState) -> MongoResult<()> {
        let collection = self.collection().await;
        let document = MongoSessionDocument::new(&id, state);
        collection
            .replace_one(doc_id(&id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveSession {
                id: id.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn merge(&self, id: SessionId, patch: SessionPatch) -> MongoResult<Option<GameState>> {
        if patch.is_empty() {
            return self.find(id).await;
        }
        let collection = self.collection().await;
        let document = collection
            .find_one_and_update(doc_id(&id), patch_update(patch))
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateSession {
                id: id.to_string(),
                source,
            })?;
        Ok(document.map(|doc| doc.state))
    }

    async fn claim(&self, id: SessionId, name: String) -> MongoResult<BuzzClaim> {
        let collection = self.collection().await;
        let document = collection
            .find_one_and_update(
                unclaimed_buzzer(&id),
                doc! { "$set": { "buzzedPlayer": name } },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateSession {
                id: id.to_string(),
                source,
            })?;

        match document {
            Some(doc) => Ok(BuzzClaim::Claimed(doc.state)),
            None if self.exists(id).await? => Ok(BuzzClaim::AlreadyClaimed),
            None => Ok(BuzzClaim::SessionMissing),
        }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

impl SessionStore for MongoSessionStore {
    fn create_session(
        &self,
        id: SessionId,
        initial: GameState,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.create(id, initial).await.map_err(Into::into) })
    }

    fn session_exists(&self, id: SessionId) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.exists(id).await.map_err(Into::into) })
    }

    fn find_session(&self, id: SessionId) -> BoxFuture<'static, StorageResult<Option<GameState>>> {
        let store = self.clone();
        Box::pin(async move { store.find(id).await.map_err(Into::into) })
    }

    fn save_session(
        &self,
        id: SessionId,
        state: GameState,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save(id, state).await.map_err(Into::into) })
    }

    fn merge_session(
        &self,
        id: SessionId,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<Option<GameState>>> {
        let store = self.clone();
        Box::pin(async move { store.merge(id, patch).await.map_err(Into::into) })
    }

    fn claim_buzzer(
        &self,
        id: SessionId,
        name: String,
    ) -> BoxFuture<'static, StorageResult<BuzzClaim>> {
        let store = self.clone();
        Box::pin(async move { store.claim(id, name).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
