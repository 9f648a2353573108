//! Authority configuration.

use std::time::Duration;

use crate::session::Realm;

/// Default session cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "IRTD2";

/// Default session lifetime in seconds.
pub const DEFAULT_TIMEOUT_SECS: i64 = 600;

/// Configuration for an [`Authority`](crate::Authority).
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    /// Cookie domain and path.
    pub realm: Realm,
    /// Cookie name carrying the token.
    pub cookie_name: String,
    /// Session lifetime in seconds.
    pub timeout_secs: i64,
    /// Whether each identified exchange pushes the expiry forward.
    pub sliding_expiry: bool,
    /// Whether sessions are bound to the client address they were issued to.
    pub bind_address: bool,
    /// Interval between expiry sweeps of the reaper task.
    pub reap_interval: Duration,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            realm: Realm::default(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            sliding_expiry: false,
            bind_address: true,
            reap_interval: Duration::from_secs(60),
        }
    }
}

impl AuthorityConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cookie realm.
    #[must_use]
    pub fn with_realm(mut self, realm: Realm) -> Self {
        self.realm = realm;
        self
    }

    /// Sets the cookie name.
    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Sets the session lifetime.
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: i64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Enables or disables sliding expiry.
    #[must_use]
    pub const fn with_sliding_expiry(mut self, sliding: bool) -> Self {
        self.sliding_expiry = sliding;
        self
    }

    /// Enables or disables client address binding.
    #[must_use]
    pub const fn with_bind_address(mut self, bind: bool) -> Self {
        self.bind_address = bind;
        self
    }

    /// Sets the reaper interval.
    #[must_use]
    pub const fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }
}
