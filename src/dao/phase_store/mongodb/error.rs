use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias for MongoDB store operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised by the MongoDB phase store.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to save phase snapshot")]
    SaveSnapshot {
        #[source]
        source: MongoError,
    },
    #[error("failed to load phase snapshot")]
    LoadSnapshot {
        #[source]
        source: MongoError,
    },
}
