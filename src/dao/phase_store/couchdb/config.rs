use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "pitchlive";

/// Runtime configuration describing how to reach CouchDB.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Server URL, e.g. `http://localhost:5984`.
    pub base_url: String,
    /// Database holding the phase document.
    pub database: String,
    /// Basic-auth user and password.
    pub credentials: Option<(String, String)>,
}

impl CouchConfig {
    /// Configuration without credentials.
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            credentials: None,
        }
    }

    /// Attach basic-auth credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Read `COUCH_BASE_URL` (required), `COUCH_DB` and the optional
    /// `COUCH_USERNAME`/`COUCH_PASSWORD` pair.
    pub fn from_env() -> CouchResult<Self> {
        let base_url =
            std::env::var("COUCH_BASE_URL").map_err(|_| CouchDaoError::MissingEnvVar {
                var: "COUCH_BASE_URL",
            })?;
        let database = std::env::var("COUCH_DB").unwrap_or_else(|_| DEFAULT_DATABASE.to_owned());

        let config = Self::new(base_url, database);
        Ok(
            match (
                std::env::var("COUCH_USERNAME").ok(),
                std::env::var("COUCH_PASSWORD").ok(),
            ) {
                (Some(username), Some(password)) => config.with_credentials(username, password),
                _ => config,
            },
        )
    }

    /// Database URL without a trailing slash on the base.
    pub fn database_url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_url_ignores_trailing_slashes() {
        let config = CouchConfig::new("http://localhost:5984/", "pitchlive");
        assert_eq!(config.database_url(), "http://localhost:5984/pitchlive");
    }
}
