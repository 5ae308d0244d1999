//! Remote document-store adapter implementing the `GuestStore` port.
//!
//! Talks to a hosted document collection over a small REST surface:
//! - `GET    /v1/projects/{project}/collections/{collection}`: list documents
//! - `PUT    .../collections/{collection}/{id}`: upsert one document (the
//!   caller-generated id keys the document; the server never assigns ids)
//! - `DELETE .../collections/{collection}/{id}`: delete one document
//! - `DELETE .../collections/{collection}`: drop the whole collection
//!
//! Notes:
//! - `DocstoreClient::connect` is the init step: it performs one probe round
//!   trip and no other call is possible before it succeeds.
//! - The domain `GuestStore` trait is synchronous. We bridge to the async
//!   `reqwest` client using an internal `tokio::runtime::Runtime` and
//!   `block_on`, reusing an ambient runtime when one already exists.

use std::path::Path;
use std::sync::Arc;

use domain::{CoreError, GuestId, GuestRecord, GuestStore, Snapshot};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Opaque connection descriptor supplied externally (config file or the
/// saved copy in the local kv space).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocstoreConfig {
    pub endpoint: String,
    pub project_id: String,
    pub api_key: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_collection() -> String {
    "guests".to_string()
}

impl DocstoreConfig {
    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| CoreError::Config(format!("docstore config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(&path)
            .map_err(|e| CoreError::Config(format!("read {}: {e}", path.as_ref().display())))?;
        Self::from_json(&text)
    }

    fn validate(&self) -> Result<(), CoreError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(CoreError::Config(
                "endpoint must start with http:// or https://".into(),
            ));
        }
        if self.project_id.trim().is_empty() {
            return Err(CoreError::Config("project_id is empty".into()));
        }
        if self.api_key.trim().is_empty() {
            return Err(CoreError::Config("api_key is empty".into()));
        }
        Ok(())
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/collections/{}",
            self.endpoint.trim_end_matches('/'),
            self.project_id,
            self.collection
        )
    }

    fn doc_url(&self, id: &GuestId) -> String {
        format!("{}/{}", self.collection_url(), id.as_str())
    }
}

/// Client for the remote guest collection.
///
/// Supports both standalone mode (creates its own Tokio runtime) and hosted
/// mode (reuses the existing runtime via `Handle::current()`).
pub struct DocstoreClient {
    config: DocstoreConfig,
    http: reqwest::Client,
    // Optional runtime - None when an ambient runtime already exists
    rt: Option<Arc<tokio::runtime::Runtime>>,
}

#[derive(Deserialize)]
struct ListDocs {
    #[serde(default)]
    documents: Vec<GuestRecord>,
}

impl DocstoreClient {
    /// Initialize the remote connection.
    ///
    /// Validates the descriptor and performs one probe round trip against the
    /// collection; a connectivity or permission failure surfaces here so the
    /// caller can fall back to offline mode before any other call is made.
    pub fn connect(config: DocstoreConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let rt = Self::maybe_create_runtime()?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("docstore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CoreError::Store(format!("http client init: {e}")))?;
        let client = Self { config, http, rt };
        client.probe()?;
        Ok(client)
    }

    /// Check if we're inside a Tokio runtime. If yes, return None (reuse
    /// existing). If no, create a new runtime.
    fn maybe_create_runtime() -> Result<Option<Arc<tokio::runtime::Runtime>>, CoreError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            Ok(None)
        } else {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .map_err(|e| CoreError::Store(format!("tokio runtime init: {e}")))?;
            Ok(Some(Arc::new(rt)))
        }
    }

    /// Run an async future, using either our owned runtime or the current one.
    fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        match &self.rt {
            Some(rt) => rt.block_on(fut),
            None => {
                tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
            }
        }
    }

    fn probe(&self) -> Result<(), CoreError> {
        let url = self.config.collection_url();
        let fut = async {
            let resp = self
                .http
                .get(&url)
                .query(&[("key", self.config.api_key.as_str()), ("limit", "1")])
                .send()
                .await
                .map_err(map_net_err)?;
            let status = resp.status();
            // A collection that does not exist yet still proves the endpoint
            // and credentials work
            if status.is_success() || status == StatusCode::NOT_FOUND {
                Ok(())
            } else {
                Err(status_err("probe", status))
            }
        };
        self.block_on(fut)
    }
}

fn map_net_err(e: reqwest::Error) -> CoreError {
    CoreError::Store(format!("docstore request failed: {e}"))
}

fn status_err(op: &str, status: StatusCode) -> CoreError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        CoreError::Store(format!("{op}: permission denied ({status})"))
    } else {
        CoreError::Store(format!("{op}: unexpected status {status}"))
    }
}

impl GuestStore for DocstoreClient {
    fn list(&self) -> Result<Snapshot, CoreError> {
        let url = self.config.collection_url();
        let fut = async {
            let resp = self
                .http
                .get(&url)
                .query(&[("key", self.config.api_key.as_str())])
                .send()
                .await
                .map_err(map_net_err)?;
            let status = resp.status();
            if status == StatusCode::NOT_FOUND {
                // No collection yet: an empty party, not a failure
                return Ok(Snapshot::clean(Vec::new()));
            }
            if !status.is_success() {
                return Err(status_err("list", status));
            }
            let body: ListDocs = resp
                .json()
                .await
                .map_err(|e| CoreError::Store(format!("decode collection: {e}")))?;
            Ok(Snapshot::clean(body.documents))
        };
        self.block_on(fut)
    }

    fn add(&self, guest: &GuestRecord) -> Result<(), CoreError> {
        let url = self.config.doc_url(&guest.id);
        let fut = async {
            let resp = self
                .http
                .put(&url)
                .query(&[("key", self.config.api_key.as_str())])
                .json(guest)
                .send()
                .await
                .map_err(map_net_err)?;
            if resp.status().is_success() {
                Ok(())
            } else {
                Err(status_err("add", resp.status()))
            }
        };
        self.block_on(fut)
    }

    fn delete_by_id(&self, id: &GuestId) -> Result<(), CoreError> {
        let url = self.config.doc_url(id);
        let fut = async {
            let resp = self
                .http
                .delete(&url)
                .query(&[("key", self.config.api_key.as_str())])
                .send()
                .await
                .map_err(map_net_err)?;
            let status = resp.status();
            // Deleting an absent document leaves the collection unchanged
            if status.is_success() || status == StatusCode::NOT_FOUND {
                Ok(())
            } else {
                Err(status_err("delete", status))
            }
        };
        self.block_on(fut)
    }

    fn clear(&self) -> Result<(), CoreError> {
        let url = self.config.collection_url();
        let fut = async {
            let resp = self
                .http
                .delete(&url)
                .query(&[("key", self.config.api_key.as_str())])
                .send()
                .await
                .map_err(map_net_err)?;
            let status = resp.status();
            if status.is_success() || status == StatusCode::NOT_FOUND {
                Ok(())
            } else {
                Err(status_err("clear", status))
            }
        };
        self.block_on(fut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> DocstoreConfig {
        DocstoreConfig {
            endpoint: "https://db.fiesta.example".into(),
            project_id: "fiesta-prod".into(),
            api_key: "k123".into(),
            collection: "guests".into(),
        }
    }

    #[test]
    fn config_parses_with_default_collection() {
        let config = DocstoreConfig::from_json(
            r#"{"endpoint":"https://db.fiesta.example","project_id":"p","api_key":"k"}"#,
        )
        .unwrap();
        assert_eq!(config.collection, "guests");
    }

    #[test]
    fn config_rejects_missing_fields() {
        let err = DocstoreConfig::from_json(r#"{"endpoint":"https://x"}"#).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn config_rejects_bad_endpoint() {
        let err = DocstoreConfig::from_json(
            r#"{"endpoint":"ftp://x","project_id":"p","api_key":"k"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn url_building() {
        let config = sample_config();
        assert_eq!(
            config.collection_url(),
            "https://db.fiesta.example/v1/projects/fiesta-prod/collections/guests"
        );
        let id = GuestId::new("18c2a-0001").unwrap();
        assert_eq!(
            config.doc_url(&id),
            "https://db.fiesta.example/v1/projects/fiesta-prod/collections/guests/18c2a-0001"
        );
    }

    #[test]
    fn trailing_slash_in_endpoint_is_tolerated() {
        let mut config = sample_config();
        config.endpoint = "https://db.fiesta.example/".into();
        assert!(!config.collection_url().contains("example//"));
    }

    #[test]
    fn empty_list_body_decodes_to_no_documents() {
        let body: ListDocs = serde_json::from_str("{}").unwrap();
        assert!(body.documents.is_empty());
    }

    #[test]
    fn list_body_decodes_documents() {
        let body: ListDocs = serde_json::from_str(
            r#"{"documents":[{"id":"g1","name":"Ana","phone":"555","companions":2,
                 "created_at_ms":1700000000000,"entry_time":"1/1/24, 10:00"}]}"#,
        )
        .unwrap();
        assert_eq!(body.documents.len(), 1);
        assert_eq!(body.documents[0].name.as_str(), "Ana");
    }
}
