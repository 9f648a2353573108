//! Observability for Agora.
//!
//! - **Logging**: `tracing-subscriber` with an `EnvFilter` and JSON, pretty
//!   or compact output
//! - **Metrics**: counters and histograms through the `metrics` facade,
//!   rendered by a Prometheus recorder
//!
//! The runtime never owns a metrics listener; the embedding application
//! serves [`MetricsRegistry::render`] wherever it likes.
//!
//! # Example
//!
//! ```rust,ignore
//! use agora_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let metrics = init_telemetry(&TelemetryConfig::default())?;
//! if let Some(metrics) = metrics {
//!     println!("{}", metrics.render());
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::{TelemetryConfig, TelemetryConfigBuilder};
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{
    init_metrics, record_auth_decision, record_exchange, record_metabase_write,
    record_schema_rejection, record_sessions_expired, render_metrics, MetricsConfig,
    MetricsRegistry,
};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging and metrics.
///
/// Returns the metrics registry when metrics are enabled.
///
/// # Errors
///
/// Returns [`TelemetryError`] if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<Option<MetricsRegistry>> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)
}
