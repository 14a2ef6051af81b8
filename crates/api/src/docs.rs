// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! `OpenAPI` document for the URL scanner API

use shared_types::Verdict;
use utoipa::OpenApi;

use crate::{
    config::Environment,
    error::ErrorBody,
    routes::handlers::{self, CheckUrlRequest, CheckUrlResponse},
    state::{HealthCheck, HealthStatus},
};

/// Generated `OpenAPI` specification
#[derive(OpenApi)]
#[openapi(
    info(
        title = "QR Code Safety Scanner API",
        description = "Classifies URLs decoded from QR codes as SAFE or MALICIOUS using a random forest over lexical URL features."
    ),
    paths(
        handlers::root_handler,
        handlers::health_handler,
        handlers::check_url_handler,
    ),
    components(schemas(
        CheckUrlRequest,
        CheckUrlResponse,
        ErrorBody,
        Environment,
        HealthCheck,
        HealthStatus,
        Verdict,
    )),
    tags(
        (name = "health", description = "Liveness and health"),
        (name = "scanner", description = "URL classification")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_endpoint() {
        let doc = ApiDoc::openapi();
        for path in ["/", "/health", "/check-url"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn registers_error_schema() {
        let doc = ApiDoc::openapi();
        let schemas = doc.components.expect("components").schemas;
        assert!(schemas.contains_key("ErrorBody"));
        assert!(schemas.contains_key("CheckUrlResponse"));
    }
}
