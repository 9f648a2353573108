//! Dispatcher configuration.
//!
//! # Example
//!
//! ```rust
//! use agora_server::DispatcherConfig;
//!
//! let config = DispatcherConfig::builder()
//!     .max_body_bytes(64 * 1024)
//!     .build();
//!
//! assert_eq!(config.max_body_bytes(), 64 * 1024);
//! ```

/// Default cap on collected request bodies (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Dispatcher configuration.
///
/// Use [`DispatcherConfig::builder()`] to construct instances.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Cap applied when a handler asks for an unbounded body.
    max_body_bytes: usize,

    /// Report unrouted requests with an error envelope instead of leaving
    /// them to the transport.
    answer_unrouted: bool,
}

impl DispatcherConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> DispatcherConfigBuilder {
        DispatcherConfigBuilder::default()
    }

    /// Returns the body cap applied to unbounded collections.
    #[must_use]
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Returns whether unrouted requests get a 404 envelope.
    #[must_use]
    pub fn answer_unrouted(&self) -> bool {
        self.answer_unrouted
    }

    /// Clamps a handler's requested limit to the configured cap.
    #[must_use]
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested.map_or(self.max_body_bytes, |limit| limit.min(self.max_body_bytes))
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`DispatcherConfig`].
#[derive(Debug, Clone)]
pub struct DispatcherConfigBuilder {
    max_body_bytes: usize,
    answer_unrouted: bool,
}

impl DispatcherConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            answer_unrouted: true,
        }
    }

    /// Sets the body cap.
    #[must_use]
    pub fn max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    /// Sets whether unrouted requests get a 404 envelope.
    #[must_use]
    pub fn answer_unrouted(mut self, answer: bool) -> Self {
        self.answer_unrouted = answer;
        self
    }

    /// Builds the [`DispatcherConfig`].
    #[must_use]
    pub fn build(self) -> DispatcherConfig {
        DispatcherConfig {
            max_body_bytes: self.max_body_bytes,
            answer_unrouted: self.answer_unrouted,
        }
    }
}

impl Default for DispatcherConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
