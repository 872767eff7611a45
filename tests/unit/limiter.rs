//! Admission decisions through the public limiter API

use std::sync::Arc;
use std::time::Duration;

use namespace_limiter::{Error, NamePattern, NamespaceLimiter};

use crate::common::*;

// =============================================================================
// Quota scenarios
// =============================================================================

struct Scenario {
    regex: &'static str,
    max: usize,
    existing: &'static [&'static str],
    candidate: &'static str,
    allowed: bool,
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        regex: "^t",
        max: 2,
        existing: &["test"],
        candidate: "test2",
        allowed: true,
    },
    Scenario {
        regex: "^t",
        max: 1,
        existing: &["test"],
        candidate: "test2",
        allowed: false,
    },
    Scenario {
        regex: "^t",
        max: 5,
        existing: &["test", "test2", "test3", "test4", "test5"],
        candidate: "test6",
        allowed: false,
    },
    Scenario {
        regex: "^t",
        max: 6,
        existing: &["test", "test2", "test3", "test4", "test5"],
        candidate: "test6",
        allowed: true,
    },
    Scenario {
        regex: ".*",
        max: 0,
        existing: &[],
        candidate: "test",
        allowed: false,
    },
];

#[tokio::test]
async fn test_quota_scenarios() {
    for (i, scenario) in SCENARIOS.iter().enumerate() {
        let limiter = limiter(scenario.regex, scenario.max, scenario.existing);
        let decision = limiter
            .decide(&namespace_object(scenario.candidate))
            .await
            .unwrap();
        assert_eq!(
            decision.allowed, scenario.allowed,
            "scenario {} ({:?}, max {}, {} existing, candidate {})",
            i,
            scenario.regex,
            scenario.max,
            scenario.existing.len(),
            scenario.candidate
        );
    }
}

#[tokio::test]
async fn test_system_namespaces_do_not_count_against_prefix_quota() {
    let limiter = limiter(
        "^preview-",
        2,
        &["default", "kube-system", "kube-public", "preview-1"],
    );
    let decision = limiter
        .decide(&namespace_object("preview-2"))
        .await
        .unwrap();
    assert!(decision.allowed);
}

#[tokio::test]
async fn test_non_matching_candidate_still_subject_to_existing_count() {
    // The candidate is never counted, so its own name does not matter
    let limiter = limiter("^t", 1, &["test"]);
    let decision = limiter
        .decide(&namespace_object("production"))
        .await
        .unwrap();
    assert!(!decision.allowed);
}

#[tokio::test]
async fn test_deny_message_contains_count_limit_and_name() {
    let limiter = limiter("^t", 2, &["test", "test2"]);
    let decision = limiter
        .decide(&namespace_object("test3"))
        .await
        .unwrap();
    assert!(!decision.allowed);
    assert!(decision.message.contains("too many (2)"));
    assert!(decision.message.contains("limit 2"));
    assert!(decision.message.contains("test3 namespace denied"));
}

// =============================================================================
// Snapshot handling
// =============================================================================

#[tokio::test]
async fn test_every_decision_requeries_store() {
    let store = Arc::new(StaticNamespaceStore::new(&["test"]));
    let limiter = NamespaceLimiter::new(NamePattern::compile("^t").unwrap(), 2, store.clone());

    let first = limiter.decide(&namespace_object("test2")).await.unwrap();
    let second = limiter.decide(&namespace_object("test2")).await.unwrap();

    assert_eq!(first, second, "Decisions over the same snapshot must agree");
    assert_eq!(store.calls(), 2);
}

#[tokio::test]
async fn test_store_failure_is_not_a_decision() {
    let limiter = failing_limiter("^t", 10);
    let err = limiter
        .decide(&namespace_object("test"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Store(_)));
    assert!(err.is_indeterminate());
}

#[tokio::test]
async fn test_wrong_kind_is_integration_fault() {
    let store = Arc::new(StaticNamespaceStore::new(&[]));
    let limiter = NamespaceLimiter::new(NamePattern::compile(".*").unwrap(), 10, store.clone());

    let pod = serde_json::from_value(serde_json::json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": { "name": "web", "namespace": "default" }
    }))
    .unwrap();

    let err = limiter.decide(&pod).await.unwrap_err();
    assert!(matches!(err, Error::UnexpectedKind(_)));
    assert!(!err.is_indeterminate());
    assert_eq!(store.calls(), 0, "Store must not be queried for a bad object");
}

#[tokio::test]
async fn test_dropped_decision_abandons_list() {
    let store = Arc::new(PendingNamespaceStore::default());
    let limiter = NamespaceLimiter::new(NamePattern::compile("^t").unwrap(), 10, store.clone());

    let result =
        tokio::time::timeout(Duration::from_millis(50), limiter.decide(&namespace_object("test")))
            .await;
    assert!(result.is_err(), "No decision may be produced while the list is pending");
    assert_eq!(store.started(), 1);

    // Nothing is left waiting on the store once the decision is dropped
    store.release();
    tokio::task::yield_now().await;
    assert_eq!(store.finished(), 0);
}
