//! Admission webhook for Namespace creation
//!
//! Implements a ValidatingAdmissionWebhook that enforces the namespace quota
//! before new namespaces are persisted to etcd.
//!
//! Responses:
//! - quota not reached: allowed
//! - quota reached: denied with code 403, reason `NamespaceLimitExceeded`
//! - namespace list failed: decided by the configured failure policy
//! - request is not a Namespace CREATE with an object: denied with code 500

mod server;

pub use server::{
    AdmissionRequest, AdmissionResponse, AdmissionReview, AdmissionReviewResponse,
    AdmissionStatus, INTERNAL_ERROR_REASON, LIMIT_EXCEEDED_REASON, LIST_FAILED_REASON,
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WebhookError, WebhookState, create_webhook_router,
    run_webhook_server,
};
