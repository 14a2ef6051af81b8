// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server implementation module
//!
//! This module provides the main server struct and implementation for the URL scanner
//! server, including classifier loading, router configuration, and coordinated graceful
//! shutdown using `CancellationToken`.

use std::{future::IntoFuture, net::SocketAddr, sync::Arc, time::Duration};

use axum::{Router, http::HeaderName};
use hyper::Request;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, warn};
use url_classifier::ServingPipeline;

use crate::{
    config::ServerConfig,
    error::{ServerError, ServerResult},
    metrics::set_model_ready,
    middleware::RateLimiter,
    routes::create_routes,
    state::ServerState,
};

// Server constants
const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS: u64 = 30;

/// Configuration for server shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time in-flight requests get to finish after cancellation before the
    /// server stops waiting for them
    pub graceful_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            graceful_timeout: Duration::from_secs(DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS),
        }
    }
}

/// Main server struct
#[derive(Debug)]
pub struct Server {
    /// Server configuration
    config: ServerConfig,
    /// Application router
    router: Router,
    /// Server state
    state: ServerState,
    /// Cancellation token for coordinated shutdown
    cancellation_token: CancellationToken,
    /// Configuration for coordinated shutdown
    graceful_shutdown_config: ShutdownConfig,
}

impl Server {
    /// Create new server instance, loading the classifier artifact once
    ///
    /// A missing or invalid artifact does not fail startup: the server comes up
    /// degraded and answers URL checks with 503 until restarted with a valid one.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if the configuration is invalid.
    pub async fn new(config: ServerConfig, shutdown_config: ShutdownConfig) -> ServerResult<Self> {
        let pipeline =
            ServingPipeline::load(&config.model.store(), &config.model.artifact_name).await;
        Self::with_pipeline(config, shutdown_config, Arc::new(pipeline))
    }

    /// Create server with an already loaded pipeline
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if the configuration is invalid.
    pub fn with_pipeline(
        config: ServerConfig,
        graceful_shutdown_config: ShutdownConfig,
        pipeline: Arc<ServingPipeline>,
    ) -> ServerResult<Self> {
        match pipeline.degraded_reason() {
            None => info!(
                model_id = ?pipeline.model_id(),
                artifact = %config.model.artifact_name,
                "classifier loaded"
            ),
            Some(reason) => warn!(
                artifact = %config.model.artifact_name,
                %reason,
                "serving degraded, URL checks will answer 503"
            ),
        }
        set_model_ready(pipeline.is_ready());

        let cancellation_token = CancellationToken::new();
        let state = ServerState::new(config.clone(), pipeline, cancellation_token.child_token());
        let router = Self::create_router(state.clone());

        Ok(Self {
            config,
            router,
            state,
            cancellation_token,
            graceful_shutdown_config,
        })
    }

    /// Create application router with middleware
    fn create_router(state: ServerState) -> Router {
        let timeout_duration = state.config().timeout_seconds.value();

        let rate_limiter = RateLimiter::new(state.config().rate_limiting);

        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http().make_span_with(|req: &Request<_>| {
                    if let Some(request_id) = req.headers().get(REQUEST_ID_HEADER) {
                        info_span!("http_request", ?request_id)
                    } else {
                        tracing::error!("failed to extract id from request");
                        info_span!("http_request", request_id = "unknown")
                    }
                }),
            )
            .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
            .layer(CorsLayer::permissive())
            .layer(TimeoutLayer::new(timeout_duration));

        create_routes(rate_limiter)
            .layer(middleware)
            .with_state(state)
    }

    /// Run the server with coordinated graceful shutdown
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if unable to bind to the configured address,
    /// or `ServerError::Startup` if the server fails to start.
    pub async fn run(self) -> ServerResult<()> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                address: addr,
                source,
            })?;

        let actual_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Startup { source })?;

        info!(
            address = %actual_addr,
            environment = %self.config.environment,
            model_ready = self.state.pipeline().is_ready(),
            "QR URL scanner server starting",
        );

        let cancellation_token = self.cancellation_token.clone();
        let shutdown_token = cancellation_token.clone();
        tokio::spawn(async move {
            info!("spawning the graceful shutdown task");
            Self::shutdown_signal_handler(shutdown_token).await;
        });

        let server_result = serve_until_cancelled(
            listener,
            self.router,
            cancellation_token,
            self.graceful_shutdown_config.graceful_timeout,
        )
        .await;

        if let Err(e) = server_result {
            error!(error = ?e, "Server error during shutdown");
            Err(ServerError::Shutdown { source: e })
        } else {
            info!("QR URL scanner server shut down gracefully");
            Ok(())
        }
    }

    /// Handle shutdown signals and trigger coordinated cancellation
    ///
    /// This function listens for SIGINT (Ctrl+C) and SIGTERM signals,
    /// and cancels the provided cancellation token when received.
    async fn shutdown_signal_handler(cancellation_token: CancellationToken) {
        let signal_received = async {
            #[cfg(unix)]
            #[allow(clippy::expect_used)]
            {
                use tokio::signal::unix::{SignalKind, signal};

                let mut sigterm =
                    signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
                let mut sigint =
                    signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");

                tokio::select! {
                    _ = sigterm.recv() => {
                        warn!("Received SIGTERM signal, initiating coordinated shutdown");
                        "SIGTERM"
                    },
                    _ = sigint.recv() => {
                        warn!("Received SIGINT signal, initiating coordinated shutdown");
                        "SIGINT"
                    },
                }
            }

            #[cfg(not(unix))]
            #[allow(clippy::expect_used)]
            {
                tokio::signal::ctrl_c()
                    .await
                    .expect("Failed to install CTRL+C signal handler");
                warn!("Received CTRL+C signal, initiating coordinated shutdown");
                "CTRL+C"
            }
        };

        tokio::select! {
            signal_name = signal_received => {
                warn!("Shutdown signal {} received, cancelling all operations...", signal_name);
                cancellation_token.cancel();
            },
            () = cancellation_token.cancelled() => {
                warn!("Cancellation token already cancelled, shutdown signal handler exiting");
            }
        }
    }

    /// Returns a clone of the cancellation token for coordinated shutdown
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Initiates graceful shutdown by cancelling the server's cancellation token
    pub fn shutdown(&self) {
        info!("programmatic shutdown requested");
        self.cancellation_token.cancel();
    }

    /// Run server for testing, returns the bound address
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if unable to bind to the configured address.
    pub async fn run_for_testing(self) -> ServerResult<(SocketAddr, CancellationToken)> {
        let addr = self.config.socket_addr();

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                address: addr,
                source,
            })?;

        let actual_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Startup { source })?;

        let token = self.cancellation_token.child_token();
        let task = token.child_token();
        let graceful_timeout = self.graceful_shutdown_config.graceful_timeout;
        tokio::spawn(async move {
            let _ = serve_until_cancelled(listener, self.router, task, graceful_timeout).await;
        });

        Ok((actual_addr, token))
    }

    /// Get server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get server state for testing
    pub fn state(&self) -> &ServerState {
        &self.state
    }
}

/// Serve until `token` is cancelled, then give in-flight requests
/// `graceful_timeout` to finish before returning without them
async fn serve_until_cancelled(
    listener: TcpListener,
    router: Router,
    token: CancellationToken,
    graceful_timeout: Duration,
) -> std::io::Result<()> {
    let drain = token.clone();
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        drain.cancelled().await;
        info!(timeout = ?graceful_timeout, "shutdown requested, draining in-flight requests");
    })
    .into_future();
    let mut server = std::pin::pin!(server);

    tokio::select! {
        result = &mut server => result,
        () = async {
            token.cancelled().await;
            tokio::time::sleep(graceful_timeout).await;
        } => {
            warn!(
                timeout = ?graceful_timeout,
                "graceful shutdown timed out, abandoning open connections"
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;
    use url_classifier::ArtifactName;

    use super::*;
    use crate::config::Environment;

    #[tokio::test]
    async fn missing_artifact_starts_degraded() -> ServerResult<()> {
        let dir = tempdir().expect("tempdir");
        let config = ServerConfig::for_testing().with_model(dir.path(), ArtifactName::default());
        let server = Server::new(config, ShutdownConfig::default()).await?;

        assert_eq!(server.config().environment, Environment::Testing);
        assert!(!server.state().pipeline().is_ready());
        assert!(!server.cancellation_token().is_cancelled());
        Ok(())
    }

    #[tokio::test]
    async fn programmatic_shutdown() -> ServerResult<()> {
        let server = Server::with_pipeline(
            ServerConfig::for_testing(),
            ShutdownConfig::default(),
            Arc::new(ServingPipeline::degraded("not loaded")),
        )?;

        assert!(!server.cancellation_token().is_cancelled());
        server.shutdown();
        assert!(server.cancellation_token().is_cancelled());
        assert!(server.state().cancellation_token.is_cancelled());
        Ok(())
    }

    #[test]
    fn shutdown_config_default() {
        let config = ShutdownConfig::default();
        assert_eq!(
            config.graceful_timeout,
            Duration::from_secs(DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS)
        );
    }

    #[tokio::test]
    async fn shutdown_stops_waiting_for_stuck_requests() {
        let router = Router::new().route(
            "/slow",
            axum::routing::get(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                "done"
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let token = CancellationToken::new();

        let server = tokio::spawn(serve_until_cancelled(
            listener,
            router,
            token.clone(),
            Duration::from_millis(100),
        ));
        let request = tokio::spawn(reqwest::get(format!("http://{addr}/slow")));
        tokio::time::sleep(Duration::from_millis(200)).await;

        token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("shutdown bounded by graceful timeout")
            .expect("serve task");
        assert!(result.is_ok());
        request.abort();
    }

    #[tokio::test]
    async fn idle_server_stops_promptly() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let token = CancellationToken::new();
        let server = tokio::spawn(serve_until_cancelled(
            listener,
            Router::new(),
            token.clone(),
            Duration::from_secs(30),
        ));

        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("no drain wait without requests")
            .expect("serve task")
            .expect("clean shutdown");
    }
}
