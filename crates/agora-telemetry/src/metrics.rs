//! Prometheus metrics for Agora.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `agora_exchanges_total` | Counter | `method`, `status` | Completed exchanges |
//! | `agora_exchange_duration_seconds` | Histogram | `method` | Dispatch to response latency |
//! | `agora_schema_rejections_total` | Counter | `service` | Inputs rejected before invocation |
//! | `agora_auth_decisions_total` | Counter | `outcome` | Authority gate outcomes |
//! | `agora_metabase_writes_total` | Counter | `outcome` | Fact writes by outcome |
//! | `agora_sessions_expired_total` | Counter | - | Sessions removed by expiry collection |
//!
//! Recording functions are safe to call before [`init_metrics`]; without an
//! installed recorder they are no-ops.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::error::TelemetryError;
use crate::TelemetryResult;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Histogram buckets for exchange duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_buckets: vec![
                0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
            ],
        }
    }
}

/// Handle onto the installed Prometheus recorder.
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    /// Renders all metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Installs the Prometheus recorder as the global recorder.
///
/// Returns `None` when metrics are disabled. Installing twice returns the
/// registry of the first installation.
///
/// # Errors
///
/// Returns [`TelemetryError`] if the buckets are invalid or another
/// recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<Option<MetricsRegistry>> {
    if !config.enabled {
        return Ok(None);
    }
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(Some(MetricsRegistry {
            handle: handle.clone(),
        }));
    }
    if config.duration_buckets.is_empty() {
        return Err(TelemetryError::InvalidConfig(
            "duration buckets must not be empty".to_string(),
        ));
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("agora_exchange_duration_seconds".to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::InvalidConfig(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let handle = METRICS_HANDLE.get_or_init(|| handle).clone();
    register_metric_descriptions();
    Ok(Some(MetricsRegistry { handle }))
}

/// Renders metrics in Prometheus format, if a recorder was installed.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!("agora_exchanges_total", "Completed exchanges by method and status");
    describe_histogram!(
        "agora_exchange_duration_seconds",
        "Time from dispatch to written response"
    );
    describe_counter!(
        "agora_schema_rejections_total",
        "Inputs rejected by a service schema before invocation"
    );
    describe_counter!("agora_auth_decisions_total", "Authority gate outcomes");
    describe_counter!("agora_metabase_writes_total", "Metabase writes by outcome");
    describe_counter!(
        "agora_sessions_expired_total",
        "Sessions removed by expiry collection"
    );
}

/// Records a completed exchange.
pub fn record_exchange(method: &str, status: u16, duration: Duration) {
    counter!(
        "agora_exchanges_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!("agora_exchange_duration_seconds", "method" => method.to_string())
        .record(duration.as_secs_f64());
}

/// Records an input rejected by a service schema.
pub fn record_schema_rejection(service: &str) {
    counter!("agora_schema_rejections_total", "service" => service.to_string()).increment(1);
}

/// Records an Authority decision (`identified`, `unauthenticated`,
/// `expired`, `forbidden`, `granted`).
pub fn record_auth_decision(outcome: &'static str) {
    counter!("agora_auth_decisions_total", "outcome" => outcome).increment(1);
}

/// Records a Metabase write outcome (`inserted`, `updated`, `rolled_back`).
pub fn record_metabase_write(outcome: &'static str) {
    counter!("agora_metabase_writes_total", "outcome" => outcome).increment(1);
}

/// Records sessions removed by expiry collection.
pub fn record_sessions_expired(count: usize) {
    counter!("agora_sessions_expired_total").increment(count as u64);
}
