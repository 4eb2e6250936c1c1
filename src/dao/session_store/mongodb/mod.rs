mod config;
mod connection;
mod error;
mod models;
mod store;

pub use config::{DEFAULT_DATABASE, MongoConfig};
pub use error::MongoDaoError;
pub use store::MongoSessionStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
