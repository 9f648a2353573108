//! The session authority.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use agora_core::{AgoraError, AgoraResult, Exchange};
use agora_server::Service;
use http::header::{HeaderValue, SET_COOKIE};
use http::StatusCode;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::AuthorityConfig;
use crate::guard::{Authorized, Identified};
use crate::session::{new_token, Session, LATEST_EXPIRY};
use crate::verifier::CredentialVerifier;

/// Parameter naming the claimed identity.
pub const IDENTITY_PARAM: &str = "identity";

/// Parameter carrying the credential.
pub const CREDENTIAL_PARAM: &str = "credential";

/// Why a token was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No token on the exchange.
    Missing,
    /// The token names no session.
    Unknown,
    /// The session has expired.
    Expired,
    /// The session is bound to another client address.
    AddressMismatch,
}

impl Rejection {
    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "unauthenticated",
            Self::Unknown => "unknown_token",
            Self::Expired => "expired",
            Self::AddressMismatch => "address_mismatch",
        }
    }
}

impl From<Rejection> for AgoraError {
    fn from(rejection: Rejection) -> Self {
        Self::authentication(match rejection {
            Rejection::Missing => "identification required",
            Rejection::Unknown => "unknown session",
            Rejection::Expired => "session expired",
            Rejection::AddressMismatch => "session bound to another address",
        })
    }
}

/// Owns the sessions of one realm.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use agora_authority::{Authority, AuthorityConfig, Clock, ManualClock};
/// use agora_core::{Exchange, FnHandler, Handler};
/// use http::{header, HeaderValue, Method, StatusCode};
/// use serde_json::json;
///
/// let clock = Arc::new(ManualClock::new(1_000));
/// let authority = Arc::new(Authority::new(AuthorityConfig::default()).with_clock(clock.clone()));
///
/// let mut login = Exchange::new(Method::POST, "/login");
/// login.params_mut().insert("identity".into(), json!("alice"));
/// let token = authority.identify(&mut login, clock.now()).unwrap();
///
/// let guarded = authority.identified(FnHandler::new(|exchange: &mut Exchange| {
///     let who = exchange.identity().unwrap_or_default().to_string();
///     exchange.reply_json(StatusCode::OK, &json!(who))
/// }));
///
/// let cookie = HeaderValue::from_str(&format!("IRTD2={token}")).unwrap();
/// let mut exchange = Exchange::new(Method::GET, "/me").with_header(header::COOKIE, cookie);
/// guarded.request(&mut exchange).unwrap();
/// assert_eq!(exchange.response().unwrap().json().unwrap(), json!("alice"));
/// ```
pub struct Authority {
    config: AuthorityConfig,
    verifier: Option<Arc<dyn CredentialVerifier>>,
    clock: Arc<dyn Clock>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl fmt::Debug for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authority")
            .field("config", &self.config)
            .field("verifier", &self.verifier.is_some())
            .field("clock", &self.clock)
            .field("sessions", &self.sessions.lock().len())
            .finish()
    }
}

impl Authority {
    /// Creates an authority using the system clock and no verifier.
    #[must_use]
    pub fn new(config: AuthorityConfig) -> Self {
        Self {
            config,
            verifier: None,
            clock: Arc::new(SystemClock),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the credential verifier.
    #[must_use]
    pub fn with_verifier(mut self, verifier: impl CredentialVerifier) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }

    /// Sets the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    /// Returns the current time according to the authority's clock.
    #[must_use]
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Returns the number of live (not yet collected) sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Returns true if there are no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Returns a copy of the session for `token`.
    #[must_use]
    pub fn session(&self, token: &str) -> Option<Session> {
        self.sessions.lock().get(token).cloned()
    }

    /// Returns the session token carried by the exchange, cookie first.
    #[must_use]
    pub fn token<'a>(&self, exchange: &'a Exchange) -> Option<&'a str> {
        exchange
            .cookie(&self.config.cookie_name)
            .filter(|t| !t.is_empty())
            .or_else(|| exchange.bearer_token())
    }

    /// Establishes a session for the identity claimed in the parameter bag.
    ///
    /// The credential goes to the verifier, whose result becomes the
    /// session's rights. Without a verifier any claim is accepted with
    /// `null` rights. A session named by the exchange's current token is
    /// superseded. Identity and rights are set on the exchange and a
    /// `Set-Cookie` header is queued.
    ///
    /// # Errors
    ///
    /// Returns a validation error if no identity is claimed, and whatever
    /// the verifier returns on refusal.
    pub fn identify(&self, exchange: &mut Exchange, now: i64) -> AgoraResult<String> {
        let identity = exchange
            .param_str(IDENTITY_PARAM)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AgoraError::Validation {
                message: "an identity is required".to_string(),
                field: Some("$.identity".to_string()),
            })?;

        let rights = match &self.verifier {
            Some(verifier) => {
                match verifier.verify(&identity, exchange.param(CREDENTIAL_PARAM)) {
                    Ok(rights) => rights,
                    Err(err) => {
                        warn!(exchange_id = %exchange.id(), identity = %identity, "credential refused");
                        agora_telemetry::record_auth_decision("refused");
                        return Err(err);
                    }
                }
            }
            None => Value::Null,
        };

        let previous = self.token(exchange).map(str::to_string);
        let token = new_token();
        let session = Session {
            token: token.clone(),
            identity: identity.clone(),
            rights: rights.clone(),
            client_addr: exchange.client_addr().filter(|_| self.config.bind_address),
            issued_at: now,
            expires_at: self.expiry_from(now),
        };
        let cookie = self.cookie_header(&token, session.expires_at)?;

        {
            let mut sessions = self.sessions.lock();
            if let Some(previous) = previous {
                if sessions.remove(&previous).is_some() {
                    debug!(exchange_id = %exchange.id(), "superseded previous session");
                }
            }
            sessions.insert(token.clone(), session);
        }

        exchange.set_identity(identity.clone(), rights);
        exchange.set_header(SET_COOKIE, cookie);
        agora_telemetry::record_auth_decision("identified");
        info!(exchange_id = %exchange.id(), identity = %identity, "session established");
        Ok(token)
    }

    /// Ends the exchange's session.
    ///
    /// Clears identity and rights, queues an expiring cookie and returns
    /// the identity that was logged off, if there was a session.
    pub fn unidentify(&self, exchange: &mut Exchange) -> Option<String> {
        let removed = self
            .token(exchange)
            .map(str::to_string)
            .and_then(|token| self.sessions.lock().remove(&token));

        exchange.clear_identity();
        if let Ok(cookie) =
            HeaderValue::from_str(&self.config.realm.expired_cookie(&self.config.cookie_name))
        {
            exchange.set_header(SET_COOKIE, cookie);
        }

        let identity = removed.map(|session| session.identity);
        if let Some(identity) = &identity {
            info!(exchange_id = %exchange.id(), identity = %identity, "session ended");
        }
        identity
    }

    /// Resolves the exchange's token to a live session at `now`.
    ///
    /// On success identity and rights are set on the exchange; with sliding
    /// expiry the session is extended and a refreshed cookie is queued.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] explaining why the token was not accepted.
    pub fn authenticate(&self, exchange: &mut Exchange, now: i64) -> Result<Session, Rejection> {
        let token = self.token(exchange).ok_or(Rejection::Missing)?.to_string();

        let session = {
            let mut sessions = self.sessions.lock();
            let session = sessions.get_mut(&token).ok_or(Rejection::Unknown)?;
            if !session.is_valid_at(now) {
                return Err(Rejection::Expired);
            }
            if !session.admits(exchange.client_addr()) {
                return Err(Rejection::AddressMismatch);
            }
            if self.config.sliding_expiry {
                session.expires_at = session.expires_at.max(self.expiry_from(now));
            }
            session.clone()
        };

        if self.config.sliding_expiry {
            if let Ok(cookie) = self.cookie_header(&session.token, session.expires_at) {
                exchange.set_header(SET_COOKIE, cookie);
            }
        }
        exchange.set_identity(session.identity.clone(), session.rights.clone());
        Ok(session)
    }

    /// Removes every session expired at `now` and returns how many.
    pub fn collect_expired(&self, now: i64) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, session| session.is_valid_at(now));
        let removed = before - sessions.len();
        drop(sessions);

        if removed > 0 {
            debug!(removed, "collected expired sessions");
            agora_telemetry::record_sessions_expired(removed);
        }
        removed
    }

    /// Spawns a task collecting expired sessions every `reap_interval`.
    ///
    /// The task ends once the authority is dropped. Must be called inside
    /// a tokio runtime.
    #[must_use = "dropping the handle detaches the reaper; abort it to stop early"]
    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.config.reap_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(authority) = weak.upgrade() else {
                    break;
                };
                authority.collect_expired(authority.now());
            }
        })
    }

    /// Wraps `handler` so it only runs for exchanges with a live session.
    pub fn identified<H>(self: &Arc<Self>, handler: H) -> Identified<H> {
        Identified::new(Arc::clone(self), handler)
    }

    /// Wraps `handler` so it only runs when the exchange's rights grant
    /// `right`. Combine with [`Authority::identified`].
    pub fn authorized<H>(handler: H, right: impl Into<String>) -> Authorized<H> {
        Authorized::new(handler, right)
    }

    /// A service establishing a session from `identity` and `credential`.
    ///
    /// Answers `{"identity", "token", "expires"}`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the built-in schema fails to compile.
    pub fn login_service(self: &Arc<Self>) -> AgoraResult<Service> {
        let authority = Arc::clone(self);
        let service = Service::new(move |exchange: &mut Exchange| {
            let token = authority.identify(exchange, authority.now())?;
            let expires = authority.session(&token).map(|s| s.expires_at);
            let identity = exchange.identity().map(str::to_string);
            exchange.reply_json(
                StatusCode::OK,
                &json!({"identity": identity, "token": token, "expires": expires}),
            )
        })
        .named("login")
        .with_example(json!({"identity": "", "credential": ""}))
        .with_schema(json!({"identity": ".+", "credential?": null}))?;
        Ok(service)
    }

    /// A service ending the exchange's session.
    ///
    /// Answers `{"identity": <logged off identity or null>}`.
    pub fn logout_service(self: &Arc<Self>) -> Service {
        let authority = Arc::clone(self);
        Service::new(move |exchange: &mut Exchange| {
            let identity = authority.unidentify(exchange);
            exchange.reply_json(StatusCode::OK, &json!({ "identity": identity }))
        })
        .named("logout")
    }

    fn expiry_from(&self, now: i64) -> i64 {
        now.saturating_add(self.config.timeout_secs.max(1)).min(LATEST_EXPIRY)
    }

    fn cookie_header(&self, token: &str, expires_at: i64) -> AgoraResult<HeaderValue> {
        let cookie = self
            .config
            .realm
            .cookie(&self.config.cookie_name, token, expires_at);
        HeaderValue::from_str(&cookie)
            .map_err(|e| AgoraError::internal_with_source("invalid session cookie", e))
    }
}
