//! Assembles the services named by an [`AgoraConfig`] into a dispatcher.

use std::sync::Arc;
use std::time::Duration;

use agora_authority::{Authority, AuthorityConfig, Clock, CredentialVerifier, Realm};
use agora_config::{AgoraConfig, AuthoritySection};
use agora_core::{BoxedHandler, Handler};
use agora_metabase::{Access, Metabase, MetabaseService, ROUTED_METHODS};
use agora_server::{Dispatcher, DispatcherConfig, Routes};
use agora_telemetry::MetricsRegistry;
use http::Method;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::RuntimeError;

/// Default route of the login service.
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Default route of the logout service.
pub const DEFAULT_LOGOUT_PATH: &str = "/logout";

/// The assembled services and the dispatcher routing to them.
#[derive(Debug)]
pub struct Runtime {
    config: AgoraConfig,
    authority: Arc<Authority>,
    metabase: Arc<Metabase>,
    dispatcher: Dispatcher,
    metrics: Option<MetricsRegistry>,
}

impl Runtime {
    /// Starts a builder for `config`.
    #[must_use]
    pub fn builder(config: AgoraConfig) -> RuntimeBuilder {
        RuntimeBuilder::new(config)
    }

    /// Returns the configuration the runtime was built from.
    #[must_use]
    pub const fn config(&self) -> &AgoraConfig {
        &self.config
    }

    /// Returns the session authority.
    #[must_use]
    pub const fn authority(&self) -> &Arc<Authority> {
        &self.authority
    }

    /// Returns the fact store.
    #[must_use]
    pub const fn metabase(&self) -> &Arc<Metabase> {
        &self.metabase
    }

    /// Returns the dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Returns the metrics registry, when metrics are enabled.
    #[must_use]
    pub const fn metrics(&self) -> Option<&MetricsRegistry> {
        self.metrics.as_ref()
    }

    /// Starts the expired-session sweep. Must be called inside a Tokio
    /// runtime.
    pub fn spawn_reaper(&self) -> JoinHandle<()> {
        self.authority.spawn_reaper()
    }
}

enum Guard {
    Open,
    Identified,
}

/// Builder for [`Runtime`].
#[must_use]
pub struct RuntimeBuilder {
    config: AgoraConfig,
    verifier: Option<Box<dyn FnOnce(Authority) -> Authority>>,
    clock: Option<Arc<dyn Clock>>,
    install_telemetry: bool,
    login_path: String,
    logout_path: String,
    routes: Vec<(Method, String, BoxedHandler, Guard)>,
}

impl RuntimeBuilder {
    fn new(config: AgoraConfig) -> Self {
        Self {
            config,
            verifier: None,
            clock: None,
            install_telemetry: true,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            logout_path: DEFAULT_LOGOUT_PATH.to_string(),
            routes: Vec::new(),
        }
    }

    /// Sets the verifier consulted at login.
    pub fn with_verifier(mut self, verifier: impl CredentialVerifier) -> Self {
        self.verifier = Some(Box::new(move |authority: Authority| {
            authority.with_verifier(verifier)
        }));
        self
    }

    /// Sets the clock sessions are timed against.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Skips installing the global logging subscriber and metrics recorder.
    pub const fn without_telemetry(mut self) -> Self {
        self.install_telemetry = false;
        self
    }

    /// Sets the login and logout routes.
    pub fn with_session_paths(mut self, login: impl Into<String>, logout: impl Into<String>) -> Self {
        self.login_path = login.into();
        self.logout_path = logout.into();
        self
    }

    /// Adds a route open to anonymous exchanges.
    pub fn route(mut self, method: Method, pattern: impl Into<String>, handler: impl Handler) -> Self {
        self.routes
            .push((method, pattern.into(), Arc::new(handler), Guard::Open));
        self
    }

    /// Adds a route that requires a live session.
    pub fn identified_route(
        mut self,
        method: Method,
        pattern: impl Into<String>,
        handler: impl Handler,
    ) -> Self {
        self.routes
            .push((method, pattern.into(), Arc::new(handler), Guard::Identified));
        self
    }

    /// Validates the configuration, installs telemetry, opens the store
    /// and registers every route.
    ///
    /// Routes are tried in order: added routes, then login and logout, then
    /// the fact store mount.
    ///
    /// # Errors
    ///
    /// Returns the first configuration, telemetry, storage or route error.
    pub fn build(self) -> Result<Runtime, RuntimeError> {
        let config = self.config;
        config.validate()?;

        let metrics = if self.install_telemetry {
            agora_telemetry::init_telemetry(&config.telemetry_config())?
        } else {
            None
        };

        let mut authority = Authority::new(authority_config(&config.authority));
        if let Some(apply) = self.verifier {
            authority = apply(authority);
        }
        if let Some(clock) = self.clock {
            authority = authority.with_clock(clock);
        }
        let authority = Arc::new(authority);

        let metabase = Arc::new(match &config.metabase.path {
            Some(path) => {
                Metabase::open(path, Duration::from_millis(config.metabase.busy_timeout_ms))?
            }
            None => Metabase::open_in_memory()?,
        });

        let host = config.server.host.as_str();
        let mut routes = Routes::new();
        for (method, pattern, handler, guard) in self.routes {
            let handler: BoxedHandler = match guard {
                Guard::Open => handler,
                Guard::Identified => Arc::new(authority.identified(handler)),
            };
            routes.register(method, host, &pattern, handler)?;
        }

        routes
            .register_methods(
                &[Method::GET, Method::POST],
                host,
                &self.login_path,
                Arc::new(authority.login_service()?),
            )?
            .register_methods(
                &[Method::GET, Method::POST],
                host,
                &self.logout_path,
                Arc::new(authority.logout_service()),
            )?;

        let service = MetabaseService::new(Arc::clone(&metabase))
            .with_mount(config.metabase.mount.clone())
            .with_body_limit(config.metabase.body_limit_bytes);
        if config.metabase.owner_writes {
            let pattern = service.pattern();
            let guarded = authority.identified(service.with_access(Access::Owner));
            routes.register_methods(&ROUTED_METHODS, host, &pattern, Arc::new(guarded))?;
        } else {
            service.register(&mut routes, host)?;
        }

        let dispatcher = Dispatcher::with_config(
            routes,
            DispatcherConfig::builder()
                .max_body_bytes(config.server.max_body_bytes)
                .answer_unrouted(config.server.answer_unrouted)
                .build(),
        );
        info!(
            host,
            routes = dispatcher.routes().len(),
            metabase = %config.metabase.mount,
            persistent = config.metabase.path.is_some(),
            "runtime assembled"
        );

        Ok(Runtime {
            config,
            authority,
            metabase,
            dispatcher,
            metrics,
        })
    }
}

impl std::fmt::Debug for RuntimeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeBuilder")
            .field("config", &self.config)
            .field("verifier", &self.verifier.is_some())
            .field("install_telemetry", &self.install_telemetry)
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}

/// Maps the authority section onto an [`AuthorityConfig`].
#[must_use]
pub fn authority_config(section: &AuthoritySection) -> AuthorityConfig {
    let realm = match &section.domain {
        Some(domain) => Realm::new(domain.clone(), section.path.clone()),
        None => Realm::for_path(section.path.clone()),
    };
    AuthorityConfig::new()
        .with_realm(realm)
        .with_cookie_name(section.cookie_name.clone())
        .with_timeout_secs(i64::try_from(section.timeout_secs).unwrap_or(i64::MAX))
        .with_sliding_expiry(section.sliding_expiry)
        .with_bind_address(section.bind_address)
        .with_reap_interval(Duration::from_secs(section.reap_interval_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authority_config_mapping() {
        let section = AuthoritySection {
            domain: Some("example.org".into()),
            path: "/app".into(),
            cookie_name: "SID".into(),
            timeout_secs: 30,
            sliding_expiry: true,
            bind_address: false,
            reap_interval_secs: 5,
        };
        let config = authority_config(&section);
        assert_eq!(config.realm.domain(), Some("example.org"));
        assert_eq!(config.realm.path(), "/app");
        assert_eq!(config.cookie_name, "SID");
        assert_eq!(config.timeout_secs, 30);
        assert!(config.sliding_expiry);
        assert!(!config.bind_address);
        assert_eq!(config.reap_interval, Duration::from_secs(5));

        let config = authority_config(&AuthoritySection::default());
        assert_eq!(config.realm.domain(), None);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = AgoraConfig::default();
        config.authority.timeout_secs = 0;
        let err = Runtime::builder(config).without_telemetry().build().unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }
}
