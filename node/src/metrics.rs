//! # Prometheus Metrics
//!
//! Operational metrics for the gateway, scraped at `/metrics` on the
//! metrics port. Everything is registered in a dedicated
//! [`prometheus::Registry`] prefixed `accord_`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use accord_protocol::dispatch::{DispatchReport, DispatcherStatus};

/// Holds all Prometheus metric handles for the gateway.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Agreement requests received, valid or not.
    pub agreements_received_total: IntCounter,
    /// Requests whose call and transfer were both accepted.
    pub agreements_completed_total: IntCounter,
    /// Transactions handed to the node, by intent kind.
    pub transactions_submitted_total: IntCounterVec,
    /// Failed intents, by reason label.
    pub transactions_rejected_total: IntCounterVec,
    /// The nonce the sequencer will hand out next.
    pub next_nonce: IntGauge,
    /// Burned nonces awaiting resync.
    pub burned_nonces: IntGauge,
    /// Round trip of `eth_sendRawTransaction`.
    pub submission_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("accord".into()), None)
            .expect("failed to create prometheus registry");

        let agreements_received_total = IntCounter::new(
            "agreements_received_total",
            "Total agreement registration requests received",
        )
        .expect("metric creation");
        registry
            .register(Box::new(agreements_received_total.clone()))
            .expect("metric registration");

        let agreements_completed_total = IntCounter::new(
            "agreements_completed_total",
            "Agreements registered on-chain with the counterparty funded",
        )
        .expect("metric creation");
        registry
            .register(Box::new(agreements_completed_total.clone()))
            .expect("metric registration");

        let transactions_submitted_total = IntCounterVec::new(
            Opts::new(
                "transactions_submitted_total",
                "Signed transactions submitted to the ledger node",
            ),
            &["kind"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(transactions_submitted_total.clone()))
            .expect("metric registration");

        let transactions_rejected_total = IntCounterVec::new(
            Opts::new(
                "transactions_rejected_total",
                "Transactions that failed, by rejection reason",
            ),
            &["reason"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(transactions_rejected_total.clone()))
            .expect("metric registration");

        let next_nonce = IntGauge::new("next_nonce", "Next nonce the sequencer will allocate")
            .expect("metric creation");
        registry
            .register(Box::new(next_nonce.clone()))
            .expect("metric registration");

        let burned_nonces = IntGauge::new(
            "burned_nonces",
            "Allocated nonces whose submission failed, pending resync",
        )
        .expect("metric creation");
        registry
            .register(Box::new(burned_nonces.clone()))
            .expect("metric registration");

        let submission_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "submission_latency_seconds",
                "Ledger node acknowledgement latency per submitted transaction",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(submission_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            agreements_received_total,
            agreements_completed_total,
            transactions_submitted_total,
            transactions_rejected_total,
            next_nonce,
            burned_nonces,
            submission_latency_seconds,
        }
    }

    /// Records every intent in a finished dispatch.
    pub fn observe_report(&self, report: &DispatchReport) {
        for result in &report.results {
            if result.was_submitted() {
                self.transactions_submitted_total
                    .with_label_values(&[&result.kind.to_string()])
                    .inc();
                self.submission_latency_seconds
                    .observe(result.elapsed_ms as f64 / 1000.0);
            }
            if let Some(reason) = result.reason() {
                self.transactions_rejected_total
                    .with_label_values(&[reason.as_str()])
                    .inc();
            }
        }
        if report.is_complete() {
            self.agreements_completed_total.inc();
        }
    }

    /// Refreshes the sequencer gauges.
    pub fn observe_sequencer(&self, status: &DispatcherStatus) {
        self.next_nonce.set(status.next_nonce as i64);
        self.burned_nonces.set(status.burned.len() as i64);
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
