//! Error types for the CouchDB phase store.

use reqwest::StatusCode;
use thiserror::Error;

/// Result alias for CouchDB store operations.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures that can occur while talking to CouchDB.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum CouchDaoError {
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// Creating or probing the database failed.
    #[error("CouchDB database `{database}` is not reachable")]
    Database {
        database: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected CouchDB database response status {status} for `{database}`")]
    DatabaseStatus {
        database: String,
        status: StatusCode,
    },
    #[error("failed to send CouchDB request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected CouchDB response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    #[error("failed to decode CouchDB response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}
