use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use tokio::sync::Mutex;
use tracing::debug;

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{CouchPhaseDocument, PHASE_DOC_ID, PutResponse},
};
use crate::dao::{models::PhaseSnapshotEntity, phase_store::PhaseStore, storage::StorageResult};

/// Phase store backed by a single CouchDB document.
#[derive(Clone)]
pub struct CouchPhaseStore {
    client: Client,
    database_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
    /// Last revision seen for the phase document.
    rev: Arc<Mutex<Option<String>>>,
}

impl CouchPhaseStore {
    /// Build the client and make sure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let store = Self {
            client,
            database_url: Arc::from(config.database_url()),
            database: Arc::from(config.database),
            auth: config
                .credentials
                .map(|(user, pass)| (Arc::<str>::from(user), Arc::<str>::from(pass))),
            rev: Arc::new(Mutex::new(None)),
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some((user, pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn document_request(&self, method: Method) -> RequestBuilder {
        let url = format!("{}/{}", self.database_url, PHASE_DOC_ID);
        self.authorize(self.client.request(method, url))
    }

    async fn database_status(&self, method: Method) -> CouchResult<StatusCode> {
        let response = self
            .authorize(self.client.request(method, self.database_url.as_ref()))
            .send()
            .await
            .map_err(|source| CouchDaoError::Database {
                database: self.database.to_string(),
                source,
            })?;
        Ok(response.status())
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        match self.database_status(Method::GET).await? {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let status = self.database_status(Method::PUT).await?;
                // 412 means another instance created it first.
                if status.is_success() || status == StatusCode::PRECONDITION_FAILED {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database: self.database.to_string(),
                        status,
                    })
                }
            }
            status => Err(CouchDaoError::DatabaseStatus {
                database: self.database.to_string(),
                status,
            }),
        }
    }

    async fn fetch(&self) -> CouchResult<Option<CouchPhaseDocument>> {
        let response = self
            .document_request(Method::GET)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: PHASE_DOC_ID.to_owned(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<CouchPhaseDocument>()
                .await
                .map(Some)
                .map_err(|source| CouchDaoError::DecodeResponse {
                    path: PHASE_DOC_ID.to_owned(),
                    source,
                }),
            status => Err(CouchDaoError::RequestStatus {
                path: PHASE_DOC_ID.to_owned(),
                status,
            }),
        }
    }

    async fn put(&self, document: &CouchPhaseDocument) -> CouchResult<Result<String, StatusCode>> {
        let response = self
            .document_request(Method::PUT)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: PHASE_DOC_ID.to_owned(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(Err(StatusCode::CONFLICT)),
            status if status.is_success() => {
                let ack = response.json::<PutResponse>().await.map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: PHASE_DOC_ID.to_owned(),
                        source,
                    }
                })?;
                Ok(Ok(ack.rev))
            }
            status => Err(CouchDaoError::RequestStatus {
                path: PHASE_DOC_ID.to_owned(),
                status,
            }),
        }
    }

    /// Write with the cached revision, refreshing it once on conflict.
    async fn save(&self, entity: PhaseSnapshotEntity) -> CouchResult<()> {
        let mut rev = self.rev.lock().await;
        if rev.is_none() {
            *rev = self.fetch().await?.and_then(|doc| doc.rev);
        }

        let mut document = CouchPhaseDocument::from_entity(entity, rev.clone());
        match self.put(&document).await? {
            Ok(new_rev) => {
                *rev = Some(new_rev);
                return Ok(());
            }
            Err(_) => debug!("phase document revision is stale; refreshing"),
        }

        document.rev = self.fetch().await?.and_then(|doc| doc.rev);
        match self.put(&document).await? {
            Ok(new_rev) => {
                *rev = Some(new_rev);
                Ok(())
            }
            Err(status) => {
                *rev = None;
                Err(CouchDaoError::RequestStatus {
                    path: PHASE_DOC_ID.to_owned(),
                    status,
                })
            }
        }
    }

    async fn load(&self) -> CouchResult<Option<PhaseSnapshotEntity>> {
        let document = self.fetch().await?;
        let mut rev = self.rev.lock().await;
        *rev = document.as_ref().and_then(|doc| doc.rev.clone());
        Ok(document.map(CouchPhaseDocument::into_entity))
    }
}

impl PhaseStore for CouchPhaseStore {
    fn load_snapshot(&self) -> BoxFuture<'static, StorageResult<Option<PhaseSnapshotEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load().await.map_err(Into::into) })
    }

    fn save_snapshot(&self, snapshot: PhaseSnapshotEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save(snapshot).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let status = store.database_status(Method::GET).await?;
            if status.is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::DatabaseStatus {
                    database: store.database.to_string(),
                    status,
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
