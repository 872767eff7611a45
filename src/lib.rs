pub mod config;
pub mod error;
pub mod health;
pub mod limiter;
pub mod store;
pub mod webhooks;

pub use config::{Config, FailurePolicy};
pub use error::{Error, Result};
pub use health::{DecisionOutcome, HealthState, Metrics};
pub use limiter::{Candidate, Decision, NamePattern, NamespaceLimiter, count_matching, evaluate};
pub use store::{KubeNamespaceStore, NamespaceStore, StoreError};
pub use webhooks::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WebhookError, WebhookState, create_webhook_router,
    run_webhook_server,
};
