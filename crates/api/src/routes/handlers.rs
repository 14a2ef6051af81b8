// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP request handlers module
//!
//! This module provides HTTP request handlers for the URL scanner server:
//! liveness, health, and the URL check itself.

use std::time::Instant;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use shared_types::Verdict;
use tracing::{debug, error, warn};
use utoipa::ToSchema;

use crate::{
    error::{ErrorBody, ServerError},
    extractors::JsonExtractor,
    metrics::record_url_check,
    state::{HealthCheck, ServerState},
};

/// Plain-text liveness message served on `/`
pub const LIVENESS_MESSAGE: &str = "QR Code Safety Scanner API is running!";

/// Liveness endpoint handler
#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    summary = "Liveness probe",
    description = "Answers with a fixed text message whenever the process is up, whether or not a classifier is loaded.",
    responses(
        (status = 200, description = "Process is running", body = String, content_type = "text/plain")
    )
)]
pub async fn root_handler() -> &'static str {
    LIVENESS_MESSAGE
}

/// Health check endpoint handler
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    summary = "Health check endpoint",
    description = "Returns version and environment information plus whether a classifier artifact is loaded. A degraded service reports `Down` with the load failure reason.",
    responses(
        (status = 200, description = "Current service health", body = HealthCheck)
    )
)]
pub async fn health_handler(State(state): State<ServerState>) -> Json<HealthCheck> {
    Json(state.health_check())
}

/// URL check request
///
/// `url` may be absent; the handler reports that as a 400 rather than a
/// deserialization failure.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckUrlRequest {
    /// URL decoded from a QR code
    #[schema(example = "http://paypal-login.example.xyz/verify.php")]
    pub url: Option<String>,
}

/// URL check verdict
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct CheckUrlResponse {
    /// `SAFE` for benign URLs, `MALICIOUS` for every other category
    pub status: Verdict,
}

/// Classify a URL as safe or malicious
///
/// # Errors
///
/// Returns `ServerError::ModelUnavailable` while serving degraded, whatever
/// the body holds; otherwise `ServerError::JsonError` for an unreadable body,
/// `ServerError::InvalidInput` when no URL is supplied, and
/// `ServerError::Internal` if classification fails.
#[utoipa::path(
    post,
    path = "/check-url",
    tag = "scanner",
    summary = "Check a URL",
    description = "Extracts lexical features from the URL, runs the random forest classifier and maps the predicted category to SAFE or MALICIOUS.",
    request_body = CheckUrlRequest,
    responses(
        (status = 200, description = "URL classified", body = CheckUrlResponse),
        (status = 400, description = "No URL provided or malformed JSON", body = ErrorBody),
        (status = 429, description = "Rate limit exceeded", body = ErrorBody),
        (status = 500, description = "Classification failed", body = ErrorBody),
        (status = 503, description = "No classifier artifact loaded", body = ErrorBody)
    )
)]
pub async fn check_url_handler(
    State(state): State<ServerState>,
    body: Result<JsonExtractor<CheckUrlRequest>, ServerError>,
) -> Result<Json<CheckUrlResponse>, ServerError> {
    let started = Instant::now();
    let outcome = classify(&state, body);
    let elapsed = started.elapsed();

    match outcome {
        Ok(verdict) => {
            let result = if verdict.is_malicious() {
                "malicious"
            } else {
                "safe"
            };
            record_url_check(result, elapsed.as_secs_f64());
            Ok(Json(CheckUrlResponse { status: verdict }))
        }
        Err(err) => {
            let result = match &err {
                ServerError::InvalidInput { .. } | ServerError::JsonError { .. } => {
                    debug!(error = %err, "URL check rejected");
                    "invalid_input"
                }
                ServerError::ModelUnavailable { .. } => {
                    warn!(error = %err, "URL check while degraded");
                    "unavailable"
                }
                _ => {
                    error!(error = %err, "URL classification failed");
                    "error"
                }
            };
            record_url_check(result, elapsed.as_secs_f64());
            Err(err)
        }
    }
}

/// Degraded state wins over any body rejection
fn classify(
    state: &ServerState,
    body: Result<JsonExtractor<CheckUrlRequest>, ServerError>,
) -> Result<Verdict, ServerError> {
    let pipeline = state.pipeline();
    let JsonExtractor(request) = match body {
        Ok(request) => request,
        Err(rejection) => {
            return Err(match pipeline.degraded_reason() {
                Some(reason) => ServerError::ModelUnavailable {
                    reason: reason.to_string(),
                },
                None => rejection,
            });
        }
    };

    let prediction = pipeline.check_url(request.url.as_deref())?;
    debug!(
        category = %prediction.category,
        verdict = %prediction.verdict,
        "URL classified"
    );
    Ok(prediction.verdict)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_accepts_missing_url() {
        let request: CheckUrlRequest = serde_json::from_str("{}").expect("request");
        assert!(request.url.is_none());
    }

    #[test]
    fn response_uses_uppercase_verdicts() {
        let body = serde_json::to_value(CheckUrlResponse {
            status: Verdict::Malicious,
        })
        .expect("json");
        assert_eq!(body, serde_json::json!({"status": "MALICIOUS"}));
    }

    fn state(pipeline: url_classifier::ServingPipeline) -> ServerState {
        ServerState::new(
            crate::ServerConfig::for_testing(),
            std::sync::Arc::new(pipeline),
            tokio_util::sync::CancellationToken::new(),
        )
    }

    #[test]
    fn degraded_state_masks_body_rejection() {
        let state = state(url_classifier::ServingPipeline::degraded("no artifact"));
        let rejection = ServerError::JsonError {
            message: "request body is empty".to_string(),
        };

        let err = classify(&state, Err(rejection)).expect_err("degraded");
        assert!(matches!(err, ServerError::ModelUnavailable { .. }));
    }

    #[tokio::test]
    async fn liveness_text() {
        assert_eq!(root_handler().await, LIVENESS_MESSAGE);
    }
}
