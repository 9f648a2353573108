//! Typed configuration for the Agora runtime.
//!
//! [`AgoraConfig`] groups four sections:
//!
//! - [`ServerSection`] - dispatcher host and body limits
//! - [`AuthoritySection`] - session cookie realm and expiry
//! - [`MetabaseSection`] - fact store location and write limits
//! - [`TelemetrySection`] - logging and metrics
//!
//! Unknown fields are rejected. [`ConfigLoader`] layers defaults, a file and
//! environment variables.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "*"
//! max_body_bytes = 1048576
//!
//! [authority]
//! domain = "example.org"
//! path = "/"
//! cookie_name = "IRTD2"
//! timeout_secs = 600
//! sliding_expiry = false
//! bind_address = true
//!
//! [metabase]
//! path = "agora.db"
//! mount = "/met"
//! owner_writes = false
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [telemetry.metrics]
//! enabled = true
//! ```
//!
//! # Environment Variable Overrides
//!
//! - `AGORA__AUTHORITY__TIMEOUT_SECS=3600`
//! - `AGORA__METABASE__PATH=/var/lib/agora/met.db`
//! - `AGORA__TELEMETRY__LOGGING__FORMAT=pretty`

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use agora_telemetry::LogFormat;
pub use config::{AgoraConfig, AgoraConfigBuilder};
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{
    AuthoritySection, LoggingSection, MetabaseSection, MetricsSection, ServerSection,
    TelemetrySection, MAX_SESSION_TIMEOUT_SECS,
};
