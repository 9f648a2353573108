//! Layered configuration loading.

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use agora_telemetry::LogFormat;

use crate::{AgoraConfig, ConfigError};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "AGORA";

/// Configuration loader.
///
/// Layers are applied in order, later layers overriding earlier ones:
/// 1. Defaults or a preset
/// 2. A TOML or JSON file (replaces the configuration; sections the file
///    omits take their defaults)
/// 3. `PREFIX__SECTION__KEY` environment variables
///
/// ```no_run
/// use agora_config::ConfigLoader;
///
/// # fn main() -> Result<(), agora_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("agora.toml")?
///     .with_dotenv()
///     .with_env_prefix("AGORA")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: AgoraConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: AgoraConfig::default(),
            env_prefix: None,
        }
    }

    /// Starts from [`AgoraConfig::development`].
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = AgoraConfig::development();
        self
    }

    /// Starts from [`AgoraConfig::production`].
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = AgoraConfig::production();
        self
    }

    /// Loads a `.toml` or `.json` file, chosen by extension.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, unreadable, has an
    /// unknown extension, or does not parse (unknown fields included).
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        self.config = parse(&content, &format)
            .map_err(|e| match e {
                ConfigError::UnsupportedFormat(_) => {
                    ConfigError::UnsupportedFormat(path.display().to_string())
                }
                other => other,
            })?;
        Ok(self)
    }

    /// Loads a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration text in the given format (`toml` or `json`).
    ///
    /// ```
    /// use agora_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[authority]\ntimeout_secs = 30\n", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    /// assert_eq!(config.authority.timeout_secs, 30);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if parsing fails.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = parse(content, &format.to_lowercase())?;
        Ok(self)
    }

    /// Reads a `.env` file into the process environment, if one exists.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        // A missing .env file is not an error.
        let _ = dotenvy::dotenv();
        self
    }

    /// Enables `PREFIX__SECTION__KEY` environment overrides.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an override does not parse, names an
    /// unknown key, or the result fails validation.
    pub fn load(mut self) -> Result<AgoraConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }
        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> AgoraConfig {
        self.config
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let lead = format!("{prefix}__");
        let mut vars: Vec<(String, String)> =
            env::vars().filter(|(k, _)| k.starts_with(&lead)).collect();
        vars.sort();

        for (key, value) in vars {
            let path = &key[lead.len()..];
            self.apply_env_var(&key, path, &value)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, path: &str, value: &str) -> Result<(), ConfigError> {
        let parts: Vec<&str> = path.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["SERVER", "HOST"] => config.server.host = value.to_string(),
            ["SERVER", "MAX_BODY_BYTES"] => {
                config.server.max_body_bytes = parse_value(key, value, "expected integer")?;
            }
            ["SERVER", "ANSWER_UNROUTED"] => {
                config.server.answer_unrouted = parse_bool(key, value)?;
            }

            ["AUTHORITY", "DOMAIN"] => config.authority.domain = optional(value),
            ["AUTHORITY", "PATH"] => config.authority.path = value.to_string(),
            ["AUTHORITY", "COOKIE_NAME"] => config.authority.cookie_name = value.to_string(),
            ["AUTHORITY", "TIMEOUT_SECS"] => {
                config.authority.timeout_secs = parse_value(key, value, "expected integer")?;
            }
            ["AUTHORITY", "SLIDING_EXPIRY"] => {
                config.authority.sliding_expiry = parse_bool(key, value)?;
            }
            ["AUTHORITY", "BIND_ADDRESS"] => {
                config.authority.bind_address = parse_bool(key, value)?;
            }
            ["AUTHORITY", "REAP_INTERVAL_SECS"] => {
                config.authority.reap_interval_secs =
                    parse_value(key, value, "expected integer")?;
            }

            ["METABASE", "PATH"] => config.metabase.path = optional(value).map(Into::into),
            ["METABASE", "BUSY_TIMEOUT_MS"] => {
                config.metabase.busy_timeout_ms = parse_value(key, value, "expected integer")?;
            }
            ["METABASE", "BODY_LIMIT_BYTES"] => {
                config.metabase.body_limit_bytes = parse_value(key, value, "expected integer")?;
            }
            ["METABASE", "MOUNT"] => config.metabase.mount = value.to_string(),
            ["METABASE", "OWNER_WRITES"] => {
                config.metabase.owner_writes = parse_bool(key, value)?;
            }

            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                config.telemetry.logging.enabled = parse_bool(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => {
                config.telemetry.logging.level = value.to_string();
            }
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                config.telemetry.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    "compact" => LogFormat::Compact,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json', 'pretty' or 'compact'",
                        ))
                    }
                };
            }
            ["TELEMETRY", "LOGGING", "ANSI"] => {
                config.telemetry.logging.ansi = parse_bool(key, value)?;
            }
            ["TELEMETRY", "METRICS", "ENABLED"] => {
                config.telemetry.metrics.enabled = parse_bool(key, value)?;
            }

            _ => return Err(ConfigError::env_parse_error(key, "unknown configuration key")),
        }
        Ok(())
    }
}

fn parse(content: &str, format: &str) -> Result<AgoraConfig, ConfigError> {
    match format {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str, expected: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, expected))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env_parse_error(key, "expected boolean")),
    }
}

fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
