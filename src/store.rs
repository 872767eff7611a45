//! Access to the live namespace population
//!
//! The limiter asks a [`NamespaceStore`] for a fresh snapshot on every
//! decision. Nothing is cached between calls.

use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, ListParams};
use kube::Client;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tracing::debug;

/// Default number of namespaces requested per list page
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Errors returned while fetching the namespace snapshot
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Namespace list timed out after {0:?}")]
    Timeout(Duration),
}

/// Read-only source of the current namespace names
///
/// Implementations must be safe to query concurrently.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NamespaceStore: Send + Sync {
    /// List the names of every namespace that currently exists
    async fn list_names(&self) -> Result<Vec<String>, StoreError>;
}

/// Namespace store backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeNamespaceStore {
    api: Api<Namespace>,
    page_size: u32,
    timeout: Option<Duration>,
}

impl KubeNamespaceStore {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
            page_size: DEFAULT_PAGE_SIZE,
            timeout: None,
        }
    }

    /// Set the number of namespaces requested per page (0 disables paging)
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Bound the whole listing (all pages) by a timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Walk every page of namespace metadata
    async fn list_all_pages(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let mut continue_token: Option<String> = None;

        loop {
            let mut params = ListParams::default();
            if self.page_size > 0 {
                params = params.limit(self.page_size);
            }
            if let Some(token) = &continue_token {
                params = params.continue_token(token);
            }

            let page = self.api.list_metadata(&params).await?;
            names.extend(page.items.into_iter().filter_map(|ns| ns.metadata.name));

            match page.metadata.continue_ {
                Some(token) if !token.is_empty() => continue_token = Some(token),
                _ => break,
            }
        }

        debug!(count = names.len(), "Listed namespaces");
        Ok(names)
    }
}

#[async_trait]
impl NamespaceStore for KubeNamespaceStore {
    async fn list_names(&self) -> Result<Vec<String>, StoreError> {
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.list_all_pages())
                .await
                .map_err(|_| StoreError::Timeout(timeout))?,
            None => self.list_all_pages().await,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};

    use axum::http::{Request, Response};
    use kube::client::Body;
    use serde_json::{Value, json};

    fn namespace_list(names: &[&str], continue_token: Option<&str>) -> Value {
        json!({
            "apiVersion": "meta.k8s.io/v1",
            "kind": "PartialObjectMetadataList",
            "metadata": { "continue": continue_token },
            "items": names
                .iter()
                .map(|name| json!({
                    "apiVersion": "meta.k8s.io/v1",
                    "kind": "PartialObjectMetadata",
                    "metadata": { "name": name }
                }))
                .collect::<Vec<_>>()
        })
    }

    /// Client that answers each list request with the next page and records
    /// the request URIs
    fn paged_client(pages: Vec<Value>) -> (Client, Arc<Mutex<Vec<String>>>) {
        let uris = Arc::new(Mutex::new(Vec::new()));
        let pages = Arc::new(Mutex::new(pages.into_iter()));

        let recorded = uris.clone();
        let service = tower::service_fn(move |req: Request<Body>| {
            recorded.lock().unwrap().push(req.uri().to_string());
            let page = pages.lock().unwrap().next().expect("unexpected extra list request");
            async move {
                let body = serde_json::to_vec(&page).unwrap();
                Ok::<_, Infallible>(Response::new(Body::from(body)))
            }
        });

        (Client::new(service, "default"), uris)
    }

    #[test]
    fn test_timeout_error_message() {
        let err = StoreError::Timeout(Duration::from_secs(10));
        assert_eq!(err.to_string(), "Namespace list timed out after 10s");
    }

    #[tokio::test]
    async fn test_list_follows_continue_tokens() {
        let (client, uris) = paged_client(vec![
            namespace_list(&["a", "b"], Some("tok")),
            namespace_list(&["c"], None),
        ]);
        let store = KubeNamespaceStore::new(client).with_page_size(2);

        let names = store.list_names().await.unwrap();
        assert_eq!(names, vec!["a", "b", "c"]);

        let uris = uris.lock().unwrap();
        assert_eq!(uris.len(), 2);
        assert!(uris[0].starts_with("/api/v1/namespaces?"));
        assert!(uris[0].contains("limit=2"));
        assert!(!uris[0].contains("continue="));
        assert!(uris[1].contains("limit=2"));
        assert!(uris[1].contains("continue=tok"));
    }

    #[tokio::test]
    async fn test_empty_continue_token_ends_listing() {
        let (client, uris) = paged_client(vec![namespace_list(&["a"], Some(""))]);
        let store = KubeNamespaceStore::new(client);

        assert_eq!(store.list_names().await.unwrap(), vec!["a"]);
        assert_eq!(uris.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_page_size_sends_no_limit() {
        let (client, uris) = paged_client(vec![namespace_list(&["a", "b", "c"], None)]);
        let store = KubeNamespaceStore::new(client).with_page_size(0);

        assert_eq!(store.list_names().await.unwrap().len(), 3);

        let uris = uris.lock().unwrap();
        assert_eq!(uris.len(), 1);
        assert!(!uris[0].contains("limit="));
    }

    #[tokio::test]
    async fn test_unresponsive_api_times_out() {
        let service = tower::service_fn(|_req: Request<Body>| {
            std::future::pending::<Result<Response<Body>, Infallible>>()
        });
        let timeout = Duration::from_millis(50);
        let store = KubeNamespaceStore::new(Client::new(service, "default")).with_timeout(timeout);

        match store.list_names().await {
            Err(StoreError::Timeout(elapsed)) => assert_eq!(elapsed, timeout),
            other => panic!("expected a timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let service = tower::service_fn(|_req: Request<Body>| async {
            let status = json!({
                "apiVersion": "v1",
                "kind": "Status",
                "status": "Failure",
                "message": "namespaces is forbidden",
                "reason": "Forbidden",
                "code": 403
            });
            let response = Response::builder()
                .status(403)
                .body(Body::from(serde_json::to_vec(&status).unwrap()))
                .unwrap();
            Ok::<_, Infallible>(response)
        });
        let store = KubeNamespaceStore::new(Client::new(service, "default"));

        assert!(matches!(
            store.list_names().await,
            Err(StoreError::KubeError(_))
        ));
    }
}
