use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{Collection, Database, bson::doc};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::{RetryPolicy, establish_connection},
    error::{MongoDaoError, MongoResult},
    models::{MongoPhaseDocument, phase_filter},
};
use crate::dao::{models::PhaseSnapshotEntity, phase_store::PhaseStore, storage::StorageResult};

const PHASE_COLLECTION_NAME: &str = "phase_state";

/// Phase store backed by a single MongoDB document.
#[derive(Clone)]
pub struct MongoPhaseStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoInner {
    async fn collection(&self) -> Collection<MongoPhaseDocument> {
        self.database
            .read()
            .await
            .collection::<MongoPhaseDocument>(PHASE_COLLECTION_NAME)
    }

    async fn ping(&self) -> MongoResult<()> {
        let database = self.database.read().await.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (_client, database) = establish_connection(
            &self.config.options,
            &self.config.database_name,
            RetryPolicy::RECONNECT,
        )
        .await?;
        *self.database.write().await = database;
        Ok(())
    }

    async fn load(&self) -> MongoResult<Option<PhaseSnapshotEntity>> {
        let document = self
            .collection()
            .await
            .find_one(phase_filter())
            .await
            .map_err(|source| MongoDaoError::LoadSnapshot { source })?;
        Ok(document.map(Into::into))
    }

    async fn save(&self, snapshot: PhaseSnapshotEntity) -> MongoResult<()> {
        let document = MongoPhaseDocument::from(snapshot);
        self.collection()
            .await
            .replace_one(phase_filter(), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveSnapshot { source })?;
        Ok(())
    }
}

impl MongoPhaseStore {
    /// Connect to MongoDB, retrying the initial ping.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_client, database) =
            establish_connection(&config.options, &config.database_name, RetryPolicy::STARTUP)
                .await?;

        Ok(Self {
            inner: Arc::new(MongoInner {
                database: RwLock::new(database),
                config,
            }),
        })
    }
}

impl PhaseStore for MongoPhaseStore {
    fn load_snapshot(&self) -> BoxFuture<'static, StorageResult<Option<PhaseSnapshotEntity>>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.load().await.map_err(Into::into) })
    }

    fn save_snapshot(&self, snapshot: PhaseSnapshotEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.save(snapshot).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.reconnect().await.map_err(Into::into) })
    }
}
