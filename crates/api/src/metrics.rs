// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics module
//!
//! Provides global metrics using the default Prometheus registry via macros and
//! an Axum-compatible metrics handler.

use std::sync::LazyLock;

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, TextEncoder, register_histogram_vec,
    register_int_counter_vec, register_int_gauge,
};
use tracing::error;

/// Total number of URL checks, labeled by outcome.
pub static URL_CHECKS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "qr_scanner_url_checks_total",
        "Total number of URL checks, labeled by result",
        &["result"]
    )
    .expect("Failed to create qr_scanner_url_checks_total counter vec")
});

/// Histogram of feature extraction plus prediction time in seconds.
pub static PREDICTION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "qr_scanner_prediction_duration_seconds",
        "URL classification durations in seconds",
        &["result"],
        vec![0.000_1, 0.000_25, 0.000_5, 0.001, 0.002_5, 0.005, 0.01, 0.025, 0.05, 0.1]
    )
    .expect("Failed to create prediction duration histogram")
});

/// 1 while a classifier artifact is loaded, 0 while serving degraded.
pub static MODEL_READY: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!(
        "qr_scanner_model_ready",
        "Whether a classifier artifact is loaded (1) or the service is degraded (0)"
    )
    .expect("Failed to create model ready gauge")
});

/// Record the outcome and duration of one URL check
///
/// # Arguments
/// * `result` - `safe`, `malicious`, or the error class of a failed check
/// * `duration_secs` - Time spent classifying, in seconds
pub fn record_url_check(result: &str, duration_secs: f64) {
    URL_CHECKS.with_label_values(&[result]).inc();
    PREDICTION_DURATION
        .with_label_values(&[result])
        .observe(duration_secs);
}

/// Publish whether the classifier is loaded
pub fn set_model_ready(ready: bool) {
    MODEL_READY.set(i64::from(ready));
}

/// Axum handler that exports metrics in Prometheus text format
pub async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    match String::from_utf8(buffer) {
        Ok(body) => ([(header::CONTENT_TYPE, encoder.format_type().to_string())], body).into_response(),
        Err(e) => {
            error!(error = %e, "Metrics buffer is not valid UTF-8");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
