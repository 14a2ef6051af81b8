// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server state management module
//!
//! This module provides shared application state for the URL scanner server:
//! configuration, the serving pipeline, and coordinated cancellation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url_classifier::ServingPipeline;
use utoipa::ToSchema;

use crate::config::{Environment, ServerConfig};

/// Shared application state with cancellation token support
#[derive(Debug, Clone)]
pub struct ServerState {
    /// Server configuration
    config: ServerConfig,
    /// Classifier plus label codec, or the reason it could not be loaded
    pipeline: Arc<ServingPipeline>,
    /// Cancellation token for coordinated shutdown
    pub cancellation_token: CancellationToken,
}

impl ServerState {
    /// Create new server state
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `pipeline` - Serving pipeline shared by all requests
    /// * `cancellation_token` - Token for coordinated cancellation
    pub fn new(
        config: ServerConfig,
        pipeline: Arc<ServingPipeline>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            config,
            pipeline,
            cancellation_token,
        }
    }

    /// Server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serving pipeline used by the URL check endpoint
    pub fn pipeline(&self) -> &Arc<ServingPipeline> {
        &self.pipeline
    }

    /// Report whether the classifier is loaded
    pub fn health_check(&self) -> HealthCheck {
        let status = match self.pipeline.degraded_reason() {
            None => HealthStatus::Up,
            Some(reason) => HealthStatus::Down {
                reason: Box::from(reason),
            },
        };

        HealthCheck {
            status,
            version: Box::from(env!("CARGO_PKG_VERSION")),
            environment: self.config.environment,
            timestamp: chrono::Utc::now().to_rfc3339(),
            model_id: self.pipeline.model_id().map(|id| id.to_string()),
            labels: self
                .pipeline
                .labels()
                .map(|codec| codec.labels().to_vec())
                .unwrap_or_default(),
        }
    }
}

/// Health status of the service
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum HealthStatus {
    /// A classifier is loaded and requests are served
    Up,

    /// No classifier is loaded; URL checks answer 503
    Down {
        /// Human-readable explanation of why the service is down
        reason: Box<str>,
    },
}

/// Health check status
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthCheck {
    /// Service status
    pub status: HealthStatus,
    /// Service version
    pub version: Box<str>,
    /// Environment
    pub environment: Environment,
    /// Timestamp
    pub timestamp: String,
    /// Identifier of the loaded model bundle
    pub model_id: Option<String>,
    /// Category names the loaded model predicts, in class-id order
    pub labels: Vec<String>,
}
