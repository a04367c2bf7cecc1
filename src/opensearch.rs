use crate::error::StoreError;
use crate::sink::StructuredStore;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};

/// Connection settings for [`OpenSearchStore`].
#[derive(Clone)]
pub struct OpenSearchConfig {
    /// Base URL of the cluster, e.g. "http://localhost:9200".
    pub base_url: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for OpenSearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenSearchConfig")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl OpenSearchConfig {
    /// Build from host and port; a missing scheme defaults to `http://`.
    pub fn from_host_port(host: &str, port: u16) -> Self {
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", host)
        };
        OpenSearchConfig {
            base_url: format!("{}:{}", base, port),
            user: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }
}

/// OpenSearch implementation of [`StructuredStore`] over the REST index
/// API.
#[derive(Clone)]
pub struct OpenSearchStore {
    client: Client,
    config: OpenSearchConfig,
}

impl OpenSearchStore {
    pub fn new(config: OpenSearchConfig) -> Self {
        OpenSearchStore { client: Client::new(), config }
    }

    fn url(&self, index: &str, suffix: &str) -> String {
        format!(
            "{}/{}{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(index),
            suffix
        )
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config.user {
            Some(user) => req.basic_auth(user, self.config.password.as_deref()),
            None => req,
        }
    }
}

async fn status_error(resp: reqwest::Response) -> StoreError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
    StoreError::Status { status, body }
}

#[async_trait]
impl StructuredStore for OpenSearchStore {
    async fn exists(&self, index: &str) -> Result<bool, StoreError> {
        let resp = self.authorized(self.client.head(self.url(index, ""))).send().await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error(resp).await),
        }
    }

    async fn create(&self, index: &str, schema: &Value) -> Result<(), StoreError> {
        let resp = self
            .authorized(self.client.put(self.url(index, "")))
            .json(schema)
            .send()
            .await?;
        if resp.status().is_success() {
            return Ok(());
        }
        match status_error(resp).await {
            StoreError::Status { status: 400, body } if body.contains("resource_already_exists_exception") => {
                Err(StoreError::AlreadyExists(index.to_string()))
            }
            other => Err(other),
        }
    }

    async fn write(&self, index: &str, document: &Value) -> Result<(), StoreError> {
        let resp = self
            .authorized(self.client.post(self.url(index, "/_doc")))
            .json(document)
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(status_error(resp).await)
        }
    }
}

/// Index settings and mappings for machine-mode log documents.
pub fn default_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "body": { "type": "text" },
                "text": { "type": "text" },
                "severity_text": { "type": "keyword" },
                "severity_number": { "type": "integer" },
                "attributes": { "type": "object", "dynamic": true },
                "dropped_attributes": { "type": "integer" },
                "timestamp": { "type": "date_nanos" },
                "observed_timestamp": { "type": "date_nanos" },
                "trace_id": { "type": "keyword" },
                "span_id": { "type": "keyword" },
                "trace_flags": { "type": "integer" },
                "thread": { "type": "keyword" },
                "source": {
                    "properties": {
                        "name": { "type": "keyword" },
                        "function": { "type": "keyword" },
                        "file": { "type": "keyword" },
                        "line": { "type": "integer" }
                    }
                },
                "resource": {
                    "properties": {
                        "attributes": { "type": "object", "dynamic": true },
                        "schema_url": { "type": "keyword" }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_encode_index_names() {
        let store = OpenSearchStore::new(OpenSearchConfig::from_host_port("localhost", 9200));
        assert_eq!(store.url("logs commons", "/_doc"), "http://localhost:9200/logs%20commons/_doc");
    }

    #[test]
    fn host_with_scheme_is_kept() {
        let cfg = OpenSearchConfig::from_host_port("https://search.internal/", 443);
        assert_eq!(cfg.base_url, "https://search.internal:443");
    }

    #[test]
    fn debug_hides_password() {
        let cfg = OpenSearchConfig::from_host_port("h", 1).with_credentials("admin", "secret");
        assert!(!format!("{:?}", cfg).contains("secret"));
    }
}
