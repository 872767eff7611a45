//! Webhook HTTP server handlers
//!
//! Implements the ValidatingAdmissionWebhook HTTP endpoint for Namespace
//! CREATE requests.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use axum_server::Handle;
use kube::api::DynamicObject;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::FailurePolicy;
use crate::error::Error;
use crate::health::{DecisionOutcome, HealthState};
use crate::limiter::NamespaceLimiter;

/// Status reason for requests denied by the namespace quota
pub const LIMIT_EXCEEDED_REASON: &str = "NamespaceLimitExceeded";
/// Status reason when the namespace list failed and the failure policy is `Fail`
pub const LIST_FAILED_REASON: &str = "NamespaceListFailed";
/// Status reason for malformed or misrouted admission requests
pub const INTERNAL_ERROR_REASON: &str = "InternalError";

/// Kubernetes AdmissionReview request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    pub api_version: String,
    pub kind: String,
    pub request: Option<AdmissionRequest>,
}

/// AdmissionRequest contains the details of the admission request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    pub kind: GroupVersionKind,
    pub resource: GroupVersionResource,
    pub operation: String,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub object: Option<serde_json::Value>,
    pub old_object: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    pub resource: String,
}

/// AdmissionReview response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub response: AdmissionResponse,
}

/// AdmissionResponse contains the result
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AdmissionStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionStatus {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Shared state for webhook handlers
pub struct WebhookState {
    pub limiter: Arc<NamespaceLimiter>,
    pub failure_policy: FailurePolicy,
    pub health: Option<Arc<HealthState>>,
}

impl WebhookState {
    pub fn new(limiter: Arc<NamespaceLimiter>, failure_policy: FailurePolicy) -> Self {
        Self {
            limiter,
            failure_policy,
            health: None,
        }
    }

    /// Record decision metrics into the given health state
    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = Some(health);
        self
    }

    fn record(&self, outcome: DecisionOutcome, started: Instant) {
        if let Some(health) = &self.health {
            health
                .metrics
                .record_decision(outcome, started.elapsed().as_secs_f64());
        }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/validate", post(validate_namespace))
        .with_state(state)
}

/// Validate Namespace admission webhook handler
///
/// If the API server drops the request, axum drops this future and with it
/// the in-flight namespace list. No partial decision is sent.
pub(crate) async fn validate_namespace(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview>,
) -> impl IntoResponse {
    let started = Instant::now();

    let request = match review.request {
        Some(req) => req,
        None => {
            error!("Admission review missing request");
            return (
                StatusCode::BAD_REQUEST,
                Json(create_response(
                    "",
                    false,
                    "Missing request in AdmissionReview",
                    None,
                )),
            );
        }
    };

    let uid = request.uid.clone();
    info!(
        uid = %uid,
        operation = %request.operation,
        kind = %request.kind.kind,
        name = ?request.name,
        "Processing admission request"
    );

    // Only creation changes the namespace count
    if request.operation != "CREATE" {
        debug!(uid = %uid, operation = %request.operation, "Non-CREATE operation allowed");
        return (StatusCode::OK, Json(create_response(&uid, true, "", None)));
    }

    let object: DynamicObject = match request.object {
        Some(obj) => match serde_json::from_value(obj) {
            Ok(o) => o,
            Err(e) => {
                let err = Error::from(e);
                error!(uid = %uid, error = %err, "Failed to parse admission object");
                state.record(DecisionOutcome::Error, started);
                return (
                    StatusCode::OK,
                    Json(create_error_response(
                        &uid,
                        &err.to_string(),
                        INTERNAL_ERROR_REASON,
                    )),
                );
            }
        },
        None => {
            error!(uid = %uid, "CREATE admission request without object");
            state.record(DecisionOutcome::Error, started);
            return (
                StatusCode::OK,
                Json(create_error_response(
                    &uid,
                    "Missing object in request",
                    INTERNAL_ERROR_REASON,
                )),
            );
        }
    };

    let response = match state.limiter.decide(&object).await {
        Ok(decision) if decision.allowed => {
            state.record(DecisionOutcome::Allowed, started);
            info!(uid = %uid, "Admission request allowed");
            create_response(&uid, true, &decision.message, None)
        }
        Ok(decision) => {
            state.record(DecisionOutcome::Denied, started);
            warn!(uid = %uid, message = %decision.message, "Admission request denied");
            create_response(
                &uid,
                false,
                &decision.message,
                Some(LIMIT_EXCEEDED_REASON),
            )
        }
        Err(e) if e.is_indeterminate() => {
            state.record(DecisionOutcome::Error, started);
            match state.failure_policy {
                FailurePolicy::Fail => {
                    error!(uid = %uid, error = %e, "Namespace quota could not be evaluated, denying (failure policy: fail)");
                    create_error_response(
                        &uid,
                        &format!("Unable to evaluate namespace quota: {}", e),
                        LIST_FAILED_REASON,
                    )
                }
                FailurePolicy::Ignore => {
                    warn!(uid = %uid, error = %e, "Namespace quota could not be evaluated, allowing (failure policy: ignore)");
                    let mut response = create_response(&uid, true, "", None);
                    response.response.warnings.push(format!(
                        "namespace quota was not enforced: {}",
                        e
                    ));
                    response
                }
            }
        }
        Err(e) => {
            state.record(DecisionOutcome::Error, started);
            error!(uid = %uid, error = %e, "Admission request could not be processed");
            create_error_response(&uid, &e.to_string(), INTERNAL_ERROR_REASON)
        }
    };

    (StatusCode::OK, Json(response))
}

/// Create an AdmissionReview response
fn create_response(
    uid: &str,
    allowed: bool,
    message: &str,
    reason: Option<&str>,
) -> AdmissionReviewResponse {
    let status = if allowed {
        (!message.is_empty()).then(|| AdmissionStatus {
            code: 200,
            message: message.to_string(),
            reason: None,
        })
    } else {
        Some(AdmissionStatus {
            code: 403,
            message: message.to_string(),
            reason: reason.map(String::from),
        })
    };
    review_response(uid, allowed, status)
}

/// Create a denied AdmissionReview response for a request that could not be evaluated
fn create_error_response(uid: &str, message: &str, reason: &str) -> AdmissionReviewResponse {
    review_response(
        uid,
        false,
        Some(AdmissionStatus {
            code: 500,
            message: message.to_string(),
            reason: Some(reason.to_string()),
        }),
    )
}

fn review_response(
    uid: &str,
    allowed: bool,
    status: Option<AdmissionStatus>,
) -> AdmissionReviewResponse {
    AdmissionReviewResponse {
        api_version: "admission.k8s.io/v1".to_string(),
        kind: "AdmissionReview".to_string(),
        response: AdmissionResponse {
            uid: uid.to_string(),
            allowed,
            status,
            warnings: Vec::new(),
        },
    }
}

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";

/// Run the webhook server with TLS
///
/// Serves the /validate endpoint on `addr` until `handle` is shut down.
/// Missing or unreadable TLS material is an error; the server never falls
/// back to plain HTTP.
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    addr: SocketAddr,
    cert_path: &Path,
    key_path: &Path,
    handle: Handle,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;

    for path in [cert_path, key_path] {
        if !path.exists() {
            return Err(WebhookError::TlsConfig(format!(
                "{} does not exist",
                path.display()
            )));
        }
    }

    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    info!("Webhook server listening on {} with TLS", addr);

    axum_server::bind_rustls(addr, config)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    /// Server error
    #[error("Webhook server error: {0}")]
    Server(String),
}
