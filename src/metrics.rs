// src/metrics.rs
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::detect::{DetectionMethod, DetectionMode};

pub const DETECT_REQUESTS: &str = "detect_requests_total";
pub const DETECTIONS: &str = "detections_total";
pub const DETECT_MISSES: &str = "detect_misses_total";
pub const DETECT_CONFIDENCE: &str = "detect_confidence";
pub const SOURCES_TOTAL: &str = "sources_total";
pub const WEBHOOKS_RECEIVED: &str = "webhooks_received_total";

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and describe our series.
    /// Later calls reuse the installed handle, so routers built in tests can share it.
    pub fn init() -> Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                PrometheusBuilder::new()
                    .install_recorder()
                    .context("prometheus: install recorder")
            })?
            .clone();
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// `/metrics` in the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(DETECT_REQUESTS, "Detection requests, by mode.");
        describe_counter!(DETECTIONS, "Successful detections, by method.");
        describe_counter!(DETECT_MISSES, "Detection requests with no source found.");
        describe_histogram!(DETECT_CONFIDENCE, "Confidence of successful detections.");
        describe_gauge!(SOURCES_TOTAL, "Registered sources.");
        describe_counter!(WEBHOOKS_RECEIVED, "Accepted inbound webhook calls.");
    });
}

pub fn record_request(mode: DetectionMode) {
    counter!(DETECT_REQUESTS, "mode" => mode.as_str()).increment(1);
}

pub fn record_hit(method: DetectionMethod, confidence: f64) {
    counter!(DETECTIONS, "method" => method.as_str()).increment(1);
    histogram!(DETECT_CONFIDENCE).record(confidence);
}

pub fn record_miss() {
    counter!(DETECT_MISSES).increment(1);
}

pub fn record_webhook_received() {
    counter!(WEBHOOKS_RECEIVED).increment(1);
}

pub fn set_source_count(n: usize) {
    gauge!(SOURCES_TOTAL).set(n as f64);
}
