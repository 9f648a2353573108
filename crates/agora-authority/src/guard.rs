//! Handler wrappers gating on sessions and rights.

use std::fmt;
use std::sync::Arc;

use agora_core::{AgoraError, AgoraResult, Exchange, Handler, Step};
use tracing::warn;

use crate::authority::Authority;

/// Runs the wrapped handler only for exchanges carrying a live session.
///
/// Anything else is answered 401 and the wrapped handler never runs.
pub struct Identified<H> {
    authority: Arc<Authority>,
    inner: H,
}

impl<H> Identified<H> {
    pub(crate) const fn new(authority: Arc<Authority>, inner: H) -> Self {
        Self { authority, inner }
    }

    /// Returns the wrapped handler.
    pub const fn inner(&self) -> &H {
        &self.inner
    }
}

impl<H> fmt::Debug for Identified<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identified").finish_non_exhaustive()
    }
}

impl<H: Handler> Handler for Identified<H> {
    fn request(&self, exchange: &mut Exchange) -> AgoraResult<Step> {
        let now = self.authority.now();
        match self.authority.authenticate(exchange, now) {
            Ok(_) => {
                agora_telemetry::record_auth_decision("granted");
                self.inner.request(exchange)
            }
            Err(rejection) => {
                warn!(
                    exchange_id = %exchange.id(),
                    path = %exchange.path(),
                    reason = rejection.as_str(),
                    "identification rejected"
                );
                agora_telemetry::record_auth_decision(rejection.as_str());
                Err(rejection.into())
            }
        }
    }

    fn body(&self, exchange: &mut Exchange) -> AgoraResult<()> {
        self.inner.body(exchange)
    }
}

/// Runs the wrapped handler only when the exchange's rights grant a right.
///
/// Anything else is answered 403.
pub struct Authorized<H> {
    right: String,
    inner: H,
}

impl<H> Authorized<H> {
    pub(crate) fn new(inner: H, right: impl Into<String>) -> Self {
        Self {
            right: right.into(),
            inner,
        }
    }

    /// Returns the required right.
    pub fn right(&self) -> &str {
        &self.right
    }
}

impl<H> fmt::Debug for Authorized<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorized")
            .field("right", &self.right)
            .finish_non_exhaustive()
    }
}

impl<H: Handler> Handler for Authorized<H> {
    fn request(&self, exchange: &mut Exchange) -> AgoraResult<Step> {
        if !exchange.has_right(&self.right) {
            warn!(
                exchange_id = %exchange.id(),
                identity = exchange.identity().unwrap_or("-"),
                right = %self.right,
                "right not granted"
            );
            agora_telemetry::record_auth_decision("forbidden");
            return Err(AgoraError::authorization(
                format!("the '{}' right is required", self.right),
                Some(&self.right),
            ));
        }
        self.inner.request(exchange)
    }

    fn body(&self, exchange: &mut Exchange) -> AgoraResult<()> {
        self.inner.body(exchange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuthorityConfig, ManualClock};
    use agora_core::FnHandler;
    use http::{header, HeaderValue, Method, StatusCode};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(calls: &Arc<AtomicUsize>) -> impl Handler {
        let calls = Arc::clone(calls);
        FnHandler::new(move |exchange: &mut Exchange| {
            calls.fetch_add(1, Ordering::SeqCst);
            exchange.reply_json(StatusCode::OK, &json!("ok"))
        })
    }

    fn login(authority: &Authority, rights: serde_json::Value) -> String {
        let mut exchange = Exchange::new(Method::POST, "/login");
        exchange.params_mut().insert("identity".into(), json!("alice"));
        exchange.params_mut().insert("credential".into(), rights);
        authority.identify(&mut exchange, authority.now()).unwrap()
    }

    // Grants whatever the credential names.
    fn granting() -> Authority {
        Authority::new(AuthorityConfig::default()).with_verifier(
            |_: &str, credential: Option<&serde_json::Value>| {
                Ok(credential.cloned().unwrap_or_default())
            },
        )
    }

    fn with_token(token: &str) -> Exchange {
        let cookie = HeaderValue::from_str(&format!("IRTD2={token}")).unwrap();
        Exchange::new(Method::GET, "/private").with_header(header::COOKIE, cookie)
    }

    #[test]
    fn test_identified_rejects_without_session() {
        let authority = Arc::new(Authority::new(AuthorityConfig::default()));
        let calls = Arc::new(AtomicUsize::new(0));
        let guarded = authority.identified(counting(&calls));

        let mut exchange = Exchange::new(Method::GET, "/private");
        let err = guarded.request(&mut exchange).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_identified_rejects_after_expiry() {
        let clock = Arc::new(ManualClock::new(1_000));
        let authority =
            Arc::new(Authority::new(AuthorityConfig::default()).with_clock(clock.clone()));
        let calls = Arc::new(AtomicUsize::new(0));
        let guarded = authority.identified(counting(&calls));
        let token = login(&authority, serde_json::Value::Null);

        let mut exchange = with_token(&token);
        assert_eq!(guarded.request(&mut exchange).unwrap(), Step::Done);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(600);
        let mut exchange = with_token(&token);
        let err = guarded.request(&mut exchange).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_authorized_checks_rights() {
        let authority = Arc::new(granting());
        let calls = Arc::new(AtomicUsize::new(0));
        let guarded = authority.identified(Authority::authorized(counting(&calls), "edit"));

        let reader = login(&authority, json!("read"));
        let mut exchange = with_token(&reader);
        let err = guarded.request(&mut exchange).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let editor = login(&authority, json!(["read", "edit"]));
        let mut exchange = with_token(&editor);
        guarded.request(&mut exchange).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
