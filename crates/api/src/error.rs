// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Error handling module
//!
//! This module provides the error types for server operations and their HTTP
//! response mapping. Every error response body has the shape
//! `{"error": "<message>"}`.

use std::net::SocketAddr;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url_classifier::ClassifierError;
use utoipa::ToSchema;

/// Message returned for any failure the caller cannot act on
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// Message returned while no classifier artifact is loaded
pub const MODEL_UNAVAILABLE_MESSAGE: &str = "model unavailable";

/// Comprehensive error types for server operations
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration validation errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Network binding errors
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        /// Socket address that failed to bind
        address: SocketAddr,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Server startup errors
    #[error("Server startup failed: {source}")]
    Startup {
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Server shutdown errors
    #[error("Server shutdown failed: {source}")]
    Shutdown {
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Task join errors for async operations
    #[error("Task join error: {source}")]
    TaskJoin {
        /// Underlying tokio join error
        #[source]
        source: tokio::task::JoinError,
    },

    /// Missing or malformed request input
    #[error("{message}")]
    InvalidInput {
        /// Message shown to the caller
        message: String,
    },

    /// JSON parsing errors with detailed context
    #[error("Invalid JSON request: {message}")]
    JsonError {
        /// Detailed error message
        message: String,
    },

    /// No classifier artifact is loaded
    #[error("Model unavailable: {reason}")]
    ModelUnavailable {
        /// Why loading failed, kept out of the response body
        reason: String,
    },

    /// Client exceeded its request budget
    #[error("rate limit exceeded")]
    RateLimited,

    /// Unexpected failure while serving a request
    #[error("Internal error: {message}")]
    Internal {
        /// Diagnostic, kept out of the response body
        message: String,
    },
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

/// JSON body of every error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable error message
    pub error: String,
}

impl ServerError {
    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::InvalidInput { .. } | ServerError::JsonError { .. } => {
                StatusCode::BAD_REQUEST
            }
            ServerError::ModelUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ServerError::Config { .. }
            | ServerError::Bind { .. }
            | ServerError::Startup { .. }
            | ServerError::Shutdown { .. }
            | ServerError::TaskJoin { .. }
            | ServerError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the caller
    pub fn public_message(&self) -> String {
        match self {
            ServerError::InvalidInput { .. }
            | ServerError::JsonError { .. }
            | ServerError::RateLimited => self.to_string(),
            ServerError::ModelUnavailable { .. } => MODEL_UNAVAILABLE_MESSAGE.to_string(),
            ServerError::Config { .. }
            | ServerError::Bind { .. }
            | ServerError::Startup { .. }
            | ServerError::Shutdown { .. }
            | ServerError::TaskJoin { .. }
            | ServerError::Internal { .. } => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorBody {
            error: self.public_message(),
        });
        (status, body).into_response()
    }
}

/// Map classifier failures onto the request-boundary taxonomy
impl From<ClassifierError> for ServerError {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::InvalidInput { message } => Self::InvalidInput { message },
            ClassifierError::ModelUnavailable { reason } => Self::ModelUnavailable { reason },
            other if other.is_config_error() => Self::ModelUnavailable {
                reason: other.to_string(),
            },
            other => Self::Internal {
                message: other.to_string(),
            },
        }
    }
}

/// Convenient From implementations for common async error types
impl From<tokio::task::JoinError> for ServerError {
    fn from(source: tokio::task::JoinError) -> Self {
        Self::TaskJoin { source }
    }
}
