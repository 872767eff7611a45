//! Admission decision for namespace creation
//!
//! Each decision is a one-shot evaluation:
//!
//! ```text
//! type check -> list namespaces -> count matches -> compare -> allow | deny
//! ```
//!
//! The decision is a pure function of the candidate, the namespace snapshot,
//! the pattern and the limit. Nothing from earlier decisions is consulted.
//!
//! ## Concurrency
//!
//! Every call fetches its own snapshot. Two CREATE requests evaluated
//! concurrently can both observe `limit - 1` matches and both be allowed,
//! leaving `limit + 1` matching namespaces. This check-then-act race is a
//! known property of the limiter and is not closed here; closing it would
//! require serializing admission through the API server itself.

use std::sync::Arc;

use kube::api::DynamicObject;
use tracing::{debug, info};

use super::counter::count_matching;
use super::pattern::NamePattern;
use crate::error::{Error, Result};
use crate::store::NamespaceStore;

/// Message attached to allowed requests
pub const ALLOWED_MESSAGE: &str = "namespace is valid";

/// Outcome of one admission evaluation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub message: String,
}

impl Decision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            message: ALLOWED_MESSAGE.to_string(),
        }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            message: message.into(),
        }
    }
}

/// A namespace proposed for creation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
}

impl Candidate {
    /// Checked cast from a decoded admission object
    ///
    /// Only core `v1/Namespace` objects are accepted. Anything else means
    /// the webhook was registered for the wrong resource.
    pub fn from_object(object: &DynamicObject) -> Result<Self> {
        let types = object
            .types
            .as_ref()
            .ok_or_else(|| Error::UnexpectedKind("object without apiVersion/kind".to_string()))?;

        if types.api_version != "v1" || types.kind != "Namespace" {
            return Err(Error::UnexpectedKind(format!(
                "{}/{}",
                types.api_version, types.kind
            )));
        }

        let name = object
            .metadata
            .name
            .clone()
            .or_else(|| object.metadata.generate_name.clone())
            .unwrap_or_default();

        Ok(Self { name })
    }
}

/// Decide whether a namespace may be created given the existing names
///
/// The candidate is never part of `existing`; only namespaces that already
/// exist are counted. A limit of 0 denies every candidate.
pub fn evaluate<S: AsRef<str>>(
    candidate: &str,
    existing: &[S],
    pattern: &NamePattern,
    limit: usize,
) -> Decision {
    compare(candidate, count_matching(pattern, existing), pattern, limit)
}

fn compare(candidate: &str, matched: usize, pattern: &NamePattern, limit: usize) -> Decision {
    if matched >= limit {
        return Decision::deny(format!(
            "too many ({}) namespaces matching regex {:?} (limit {}). {} namespace denied",
            matched,
            pattern.as_str(),
            limit,
            candidate
        ));
    }

    Decision::allow()
}

/// Enforces a cap on the number of namespaces matching a pattern
pub struct NamespaceLimiter {
    pattern: NamePattern,
    limit: usize,
    store: Arc<dyn NamespaceStore>,
}

impl NamespaceLimiter {
    pub fn new(pattern: NamePattern, limit: usize, store: Arc<dyn NamespaceStore>) -> Self {
        Self {
            pattern,
            limit,
            store,
        }
    }

    pub fn pattern(&self) -> &NamePattern {
        &self.pattern
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Evaluate a CREATE request for the given object
    ///
    /// Returns `Error::UnexpectedKind` when the object is not a namespace and
    /// `Error::Store` when the snapshot cannot be fetched. Neither is turned
    /// into an allow or a deny here.
    pub async fn decide(&self, object: &DynamicObject) -> Result<Decision> {
        let candidate = Candidate::from_object(object)?;

        let existing = self.store.list_names().await?;
        debug!(
            namespace = %candidate.name,
            existing = existing.len(),
            "Fetched namespace snapshot"
        );

        let matched = count_matching(&self.pattern, &existing);
        let decision = compare(&candidate.name, matched, &self.pattern, self.limit);

        if decision.allowed {
            info!(namespace = %candidate.name, matched, limit = self.limit, "namespace is valid");
        } else {
            info!(
                namespace = %candidate.name,
                matched,
                limit = self.limit,
                "namespace denied, too many namespaces match the regex"
            );
        }

        Ok(decision)
    }
}
