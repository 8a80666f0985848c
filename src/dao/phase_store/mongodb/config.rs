use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_URI: &str = "mongodb://localhost:27017";
const DEFAULT_DATABASE: &str = "pitchlive";

/// Parsed client options plus the database holding the phase collection.
#[derive(Clone)]
pub struct MongoConfig {
    /// Driver options parsed from the URI.
    pub options: ClientOptions,
    /// Database holding the phase collection.
    pub database_name: String,
}

impl MongoConfig {
    /// Parse `uri`; `db_name` falls back to `pitchlive`.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: uri.to_owned(),
                source,
            })?;

        Ok(Self {
            options,
            database_name: db_name
                .filter(|name| !name.is_empty())
                .unwrap_or(DEFAULT_DATABASE)
                .to_owned(),
        })
    }

    /// Read `MONGO_URI` and `MONGO_DB`, both optional.
    pub async fn from_env() -> MongoResult<Self> {
        let uri = std::env::var("MONGO_URI").unwrap_or_else(|_| DEFAULT_URI.to_owned());
        let db = std::env::var("MONGO_DB").ok();
        Self::from_uri(&uri, db.as_deref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn database_name_defaults_when_missing_or_empty() {
        let config = MongoConfig::from_uri(DEFAULT_URI, None).await.unwrap();
        assert_eq!(config.database_name, "pitchlive");

        let config = MongoConfig::from_uri(DEFAULT_URI, Some("")).await.unwrap();
        assert_eq!(config.database_name, "pitchlive");

        let config = MongoConfig::from_uri(DEFAULT_URI, Some("events")).await.unwrap();
        assert_eq!(config.database_name, "events");
    }

    #[tokio::test]
    async fn malformed_uri_is_reported() {
        let err = MongoConfig::from_uri("not-a-uri", None).await.err().unwrap();
        assert!(matches!(err, MongoDaoError::InvalidUri { .. }));
    }
}
