//! Root configuration type.

use serde::{Deserialize, Serialize};

use crate::schema::MAX_SESSION_TIMEOUT_SECS;
use crate::{AuthoritySection, ConfigError, MetabaseSection, ServerSection, TelemetrySection};

/// Complete Agora runtime configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to layer files and
/// environment variables over these defaults.
///
/// ```
/// use agora_config::AgoraConfig;
///
/// let config = AgoraConfig::default();
/// assert_eq!(config.authority.cookie_name, "IRTD2");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct AgoraConfig {
    /// Dispatcher settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Session settings.
    #[serde(default)]
    pub authority: AuthoritySection,

    /// Fact store settings.
    #[serde(default)]
    pub metabase: MetabaseSection,

    /// Logging and metrics settings.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl AgoraConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> AgoraConfigBuilder {
        AgoraConfigBuilder::new()
    }

    /// Checks limits, timeouts, names and the log filter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.is_empty() {
            return Err(ConfigError::invalid_value("server.host", "must not be empty"));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_body_bytes",
                "must be greater than zero",
            ));
        }

        let authority = &self.authority;
        if authority.timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "authority.timeout_secs",
                "must be greater than zero",
            ));
        }
        if authority.timeout_secs > MAX_SESSION_TIMEOUT_SECS {
            return Err(ConfigError::invalid_value(
                "authority.timeout_secs",
                format!("must not exceed {MAX_SESSION_TIMEOUT_SECS}"),
            ));
        }
        if authority.reap_interval_secs == 0 {
            return Err(ConfigError::invalid_value(
                "authority.reap_interval_secs",
                "must be greater than zero",
            ));
        }
        if authority.cookie_name.is_empty()
            || authority
                .cookie_name
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, ';' | '=' | ','))
        {
            return Err(ConfigError::invalid_value(
                "authority.cookie_name",
                format!("not a valid cookie name: {:?}", authority.cookie_name),
            ));
        }
        if !authority.path.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "authority.path",
                "must start with '/'",
            ));
        }

        if self.metabase.body_limit_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "metabase.body_limit_bytes",
                "must be greater than zero",
            ));
        }
        if self.metabase.body_limit_bytes > self.server.max_body_bytes {
            return Err(ConfigError::invalid_value(
                "metabase.body_limit_bytes",
                format!(
                    "exceeds server.max_body_bytes ({})",
                    self.server.max_body_bytes
                ),
            ));
        }
        if !self.metabase.mount.starts_with('/') || self.metabase.mount.len() < 2 {
            return Err(ConfigError::invalid_value(
                "metabase.mount",
                "must be a non-root path starting with '/'",
            ));
        }

        agora_telemetry::logging::create_env_filter(&self.telemetry.logging.level)
            .map_err(|e| ConfigError::invalid_value("telemetry.logging.level", e.to_string()))?;

        Ok(())
    }

    /// Preset for local work: pretty debug logs, short sessions.
    ///
    /// ```
    /// use agora_config::{AgoraConfig, LogFormat};
    ///
    /// let config = AgoraConfig::development();
    /// assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = agora_telemetry::LogFormat::Pretty;
        config.telemetry.logging.ansi = true;
        config.authority.timeout_secs = 3600;
        config.authority.sliding_expiry = true;
        config
    }

    /// Preset for deployment: JSON logs at info, on-disk store.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = agora_telemetry::LogFormat::Json;
        config.telemetry.logging.ansi = false;
        config.metabase.path = Some("agora.db".into());
        config
    }

    /// Converts the telemetry section into a [`agora_telemetry::TelemetryConfig`].
    #[must_use]
    pub fn telemetry_config(&self) -> agora_telemetry::TelemetryConfig {
        let section = &self.telemetry;
        let mut logging = if section.logging.format == agora_telemetry::LogFormat::Json {
            agora_telemetry::LogConfig::production()
        } else {
            agora_telemetry::LogConfig::development()
        };
        logging.enabled = section.logging.enabled;
        logging.level.clone_from(&section.logging.level);
        logging.format = section.logging.format;
        logging.ansi = section.logging.ansi;

        let metrics = agora_telemetry::MetricsConfig {
            enabled: section.metrics.enabled,
            ..agora_telemetry::MetricsConfig::default()
        };

        agora_telemetry::TelemetryConfig::builder()
            .logging(logging)
            .metrics(metrics)
            .build()
    }
}

/// Builder for [`AgoraConfig`].
#[derive(Debug, Default)]
pub struct AgoraConfigBuilder {
    server: Option<ServerSection>,
    authority: Option<AuthoritySection>,
    metabase: Option<MetabaseSection>,
    telemetry: Option<TelemetrySection>,
}

impl AgoraConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server section.
    #[must_use]
    pub fn server(mut self, server: ServerSection) -> Self {
        self.server = Some(server);
        self
    }

    /// Sets the authority section.
    #[must_use]
    pub fn authority(mut self, authority: AuthoritySection) -> Self {
        self.authority = Some(authority);
        self
    }

    /// Sets the metabase section.
    #[must_use]
    pub fn metabase(mut self, metabase: MetabaseSection) -> Self {
        self.metabase = Some(metabase);
        self
    }

    /// Sets the telemetry section.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetrySection) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Builds the configuration; unset sections use their defaults.
    #[must_use]
    pub fn build(self) -> AgoraConfig {
        AgoraConfig {
            server: self.server.unwrap_or_default(),
            authority: self.authority.unwrap_or_default(),
            metabase: self.metabase.unwrap_or_default(),
            telemetry: self.telemetry.unwrap_or_default(),
        }
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation fails.
    pub fn build_validated(self) -> Result<AgoraConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
