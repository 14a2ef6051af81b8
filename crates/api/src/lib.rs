// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! QR URL Scanner Server Implementation
//!
//! This crate provides the HTTP server that classifies URLs decoded from QR
//! codes, built with Axum and designed for production use with hierarchical
//! configuration, middleware, and graceful shutdown.
//!
//! # Module Structure
//!
//! - [`config`]: Server configuration and environment management with hierarchical loading
//! - [`error`]: Error types and HTTP response handling with proper status codes
//! - [`extractors`]: JSON body extraction with descriptive rejections
//! - [`state`]: Shared application state holding the serving pipeline
//! - [`server`]: Classifier loading, server lifecycle, and coordinated shutdown
//! - [`routes`]: Route configuration and HTTP request handlers
//! - [`middleware`]: Per-client rate limiting
//! - [`metrics`]: Prometheus counters and histograms for URL checks
//! - [`openapi`]: `OpenAPI` specification and Swagger UI endpoints for API documentation
//!
//! # Key Features
//!
//! - **Load Once**: The classifier artifact is read and validated at startup only
//! - **Degraded Mode**: A missing or invalid artifact keeps the process up, answering 503
//! - **Rate Limiting**: IP-based request limiting with configurable requests per minute
//! - **Graceful Shutdown**: Coordinated termination using `CancellationToken`

pub mod config;
pub mod docs;
pub mod error;
pub mod extractors;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{Environment, ServerConfig};
pub use error::{ErrorBody, ServerError, ServerResult};
pub use server::{Server, ShutdownConfig};
pub use shared_types::Verdict;
pub use state::{HealthCheck, ServerState};
