//! Configuration section types.

use std::path::PathBuf;

use agora_telemetry::LogFormat;
use serde::{Deserialize, Serialize};

/// Dispatcher settings.
///
/// ```
/// use agora_config::ServerSection;
///
/// let server = ServerSection::default();
/// assert_eq!(server.host, "*");
/// assert!(server.answer_unrouted);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Host routes are registered under; `*` matches any host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Upper bound for any collected request body, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Whether the dispatcher answers unrouted exchanges with 404 itself.
    #[serde(default = "default_true")]
    pub answer_unrouted: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            max_body_bytes: default_max_body_bytes(),
            answer_unrouted: true,
        }
    }
}

fn default_host() -> String {
    "*".to_string()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_true() -> bool {
    true
}

/// Session settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuthoritySection {
    /// Cookie domain. Omitted from the cookie when unset.
    #[serde(default)]
    pub domain: Option<String>,

    /// Cookie path.
    #[serde(default = "default_cookie_path")]
    pub path: String,

    /// Cookie name carrying the session token.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Session lifetime in seconds, at most [`MAX_SESSION_TIMEOUT_SECS`].
    #[serde(default = "default_session_timeout")]
    pub timeout_secs: u64,

    /// Whether each identified exchange pushes the expiry forward.
    #[serde(default)]
    pub sliding_expiry: bool,

    /// Whether a session is only honored from the address it was issued to.
    #[serde(default = "default_true")]
    pub bind_address: bool,

    /// Interval between expired-session sweeps, in seconds.
    #[serde(default = "default_reap_interval")]
    pub reap_interval_secs: u64,
}

impl Default for AuthoritySection {
    fn default() -> Self {
        Self {
            domain: None,
            path: default_cookie_path(),
            cookie_name: default_cookie_name(),
            timeout_secs: default_session_timeout(),
            sliding_expiry: false,
            bind_address: true,
            reap_interval_secs: default_reap_interval(),
        }
    }
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_cookie_name() -> String {
    "IRTD2".to_string()
}

/// Longest accepted session lifetime: ten years.
pub const MAX_SESSION_TIMEOUT_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn default_session_timeout() -> u64 {
    600
}

fn default_reap_interval() -> u64 {
    60
}

/// Fact store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetabaseSection {
    /// SQLite database file. In-memory when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,

    /// Largest accepted write body, in bytes.
    #[serde(default = "default_metabase_body_limit")]
    pub body_limit_bytes: usize,

    /// Route prefix the store is mounted under.
    #[serde(default = "default_mount")]
    pub mount: String,

    /// Whether writes require the domain's own identity or a right named
    /// like the predicate. Every store request then needs a session.
    #[serde(default)]
    pub owner_writes: bool,
}

impl Default for MetabaseSection {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout(),
            body_limit_bytes: default_metabase_body_limit(),
            mount: default_mount(),
            owner_writes: false,
        }
    }
}

fn default_busy_timeout() -> u64 {
    5000
}

fn default_metabase_body_limit() -> usize {
    16 * 1024
}

fn default_mount() -> String {
    "/met".to_string()
}

/// Observability settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsSection,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Whether logging is installed.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive, e.g. `info` or `agora_metabase=debug,info`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// ANSI colors for human-readable formats.
    #[serde(default)]
    pub ansi: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            ansi: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Whether the Prometheus recorder is installed.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}
