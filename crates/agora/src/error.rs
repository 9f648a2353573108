//! Runtime assembly errors.

use agora_config::ConfigError;
use agora_core::AgoraError;
use agora_metabase::MetabaseError;
use agora_router::RouteError;
use agora_telemetry::TelemetryError;
use thiserror::Error;

/// Errors raised while assembling a [`Runtime`](crate::Runtime).
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The configuration is invalid.
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// Logging or metrics could not be installed.
    #[error("telemetry: {0}")]
    Telemetry(#[from] TelemetryError),

    /// The fact store could not be opened.
    #[error("metabase: {0}")]
    Metabase(#[from] MetabaseError),

    /// A route pattern was rejected.
    #[error("route: {0}")]
    Route(#[from] RouteError),

    /// A built-in service could not be bound.
    #[error("service: {0}")]
    Service(#[from] AgoraError),
}
