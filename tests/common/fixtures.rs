//! Namespace stores and admission payload builders for tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kube::api::DynamicObject;
use tokio::sync::Notify;
use namespace_limiter::{NamePattern, NamespaceLimiter, NamespaceStore, StoreError};
use serde_json::{Value, json};

/// Store returning a fixed snapshot and counting how often it was queried
#[derive(Default)]
pub struct StaticNamespaceStore {
    names: Vec<String>,
    calls: AtomicUsize,
}

impl StaticNamespaceStore {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NamespaceStore for StaticNamespaceStore {
    async fn list_names(&self) -> Result<Vec<String>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.names.clone())
    }
}

/// Store whose list blocks until released, tracking started and finished lists
#[derive(Default)]
pub struct PendingNamespaceStore {
    release: Notify,
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl PendingNamespaceStore {
    /// Let one blocked list return an empty snapshot
    pub fn release(&self) {
        self.release.notify_one();
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NamespaceStore for PendingNamespaceStore {
    async fn list_names(&self) -> Result<Vec<String>, StoreError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.release.notified().await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

/// Store whose list always times out
pub struct FailingNamespaceStore;

#[async_trait]
impl NamespaceStore for FailingNamespaceStore {
    async fn list_names(&self) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Timeout(Duration::from_secs(10)))
    }
}

/// Build a limiter over a fixed set of existing namespaces
pub fn limiter(pattern: &str, limit: usize, existing: &[&str]) -> NamespaceLimiter {
    NamespaceLimiter::new(
        NamePattern::compile(pattern).unwrap(),
        limit,
        Arc::new(StaticNamespaceStore::new(existing)),
    )
}

/// Build a limiter whose namespace list always fails
pub fn failing_limiter(pattern: &str, limit: usize) -> NamespaceLimiter {
    NamespaceLimiter::new(
        NamePattern::compile(pattern).unwrap(),
        limit,
        Arc::new(FailingNamespaceStore),
    )
}

/// Serialized v1 Namespace
pub fn namespace_json(name: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": { "name": name }
    })
}

/// Decoded v1 Namespace as the webhook sees it
pub fn namespace_object(name: &str) -> DynamicObject {
    serde_json::from_value(namespace_json(name)).unwrap()
}

/// AdmissionReview for a Namespace with the given operation and object
pub fn admission_review(operation: &str, object: Option<Value>) -> Value {
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
            "kind": { "group": "", "version": "v1", "kind": "Namespace" },
            "resource": { "group": "", "version": "v1", "resource": "namespaces" },
            "operation": operation,
            "name": object
                .as_ref()
                .and_then(|o| o["metadata"]["name"].as_str())
                .map(String::from),
            "object": object,
            "oldObject": null
        }
    })
}
