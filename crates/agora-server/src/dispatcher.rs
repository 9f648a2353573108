//! The lifecycle driver.
//!
//! The transport hands each exchange to [`Dispatcher::dispatch`]. When the
//! resolved handler wants the request body, dispatch returns a [`Pending`]
//! that the transport completes with [`Pending::collected`],
//! [`Pending::failed`] or [`Pending::abandon`]. `Pending` is consumed by
//! each of these, so phase 2 can run at most once.
//!
//! Every path that reaches a terminal step leaves exactly one response on
//! the exchange, except abandonment, which leaves none.

use std::sync::Arc;
use std::time::Instant;

use agora_core::{AgoraError, AgoraResult, BoxedHandler, Exchange, Phase, Step};
use agora_router::{RouteError, RouteTable};
use bytes::Bytes;
use http::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::DispatcherConfig;

/// Routes served by a dispatcher.
pub type Routes = RouteTable<BoxedHandler>;

/// Outcome of phase 1.
#[derive(Debug)]
#[must_use = "a pending exchange must be completed, failed or abandoned"]
pub enum Dispatch {
    /// The exchange carries its response.
    Complete,
    /// The transport must collect the body and resume the exchange.
    Collect(Pending),
    /// No route matched and the dispatcher is configured to leave the
    /// exchange to the transport.
    Unrouted,
}

/// Why the transport could not deliver a body.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollectError {
    /// The body exceeded the collection limit.
    #[error("request body exceeds {limit} bytes")]
    TooLarge {
        /// The limit in force.
        limit: usize,
    },
    /// The client stopped sending.
    #[error("request body timed out")]
    Timeout,
    /// The body could not be read.
    #[error("request body unreadable: {0}")]
    Io(String),
}

impl From<CollectError> for AgoraError {
    fn from(err: CollectError) -> Self {
        match err {
            CollectError::TooLarge { limit } => Self::payload_too_large(Some(limit)),
            other => Self::validation(other.to_string()),
        }
    }
}

/// Drives exchanges through the route table and the handler phases.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use agora_core::{Exchange, FnHandler};
/// use agora_server::{Dispatch, Dispatcher, Routes};
/// use http::{Method, StatusCode};
///
/// let mut routes = Routes::new();
/// routes
///     .route(
///         Method::GET,
///         "/ping",
///         Arc::new(FnHandler::new(|exchange: &mut Exchange| {
///             exchange.reply(StatusCode::OK, "text/plain", "pong")
///         })),
///     )
///     .unwrap();
/// let dispatcher = Dispatcher::new(routes);
///
/// let mut exchange = Exchange::new(Method::GET, "/ping");
/// assert!(matches!(dispatcher.dispatch(&mut exchange), Dispatch::Complete));
/// assert_eq!(exchange.response().unwrap().body, "pong");
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    routes: Arc<Routes>,
    config: Arc<DispatcherConfig>,
}

impl Dispatcher {
    /// Creates a dispatcher with the default configuration.
    #[must_use]
    pub fn new(routes: Routes) -> Self {
        Self::with_config(routes, DispatcherConfig::default())
    }

    /// Creates a dispatcher with an explicit configuration.
    #[must_use]
    pub fn with_config(routes: Routes, config: DispatcherConfig) -> Self {
        Self {
            routes: Arc::new(routes),
            config: Arc::new(config),
        }
    }

    /// Returns the route table.
    #[must_use]
    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Runs phase 1 for `exchange`.
    ///
    /// An exchange that already left `AwaitingRequest` is not routed again.
    /// It is answered with an internal error unless it already carries a
    /// response.
    pub fn dispatch(&self, exchange: &mut Exchange) -> Dispatch {
        let started = Instant::now();
        debug!(
            exchange_id = %exchange.id(),
            method = %exchange.method(),
            host = exchange.host(),
            path = exchange.path(),
            "dispatching exchange"
        );

        if exchange.phase() != Phase::AwaitingRequest {
            error!(
                exchange_id = %exchange.id(),
                phase = %exchange.phase(),
                "exchange dispatched twice"
            );
            if !exchange.is_responded() {
                respond_error(exchange, &AgoraError::internal("exchange dispatched twice"));
            }
            return Dispatch::Complete;
        }

        let Some(resolved) = self
            .routes
            .resolve(exchange.method(), exchange.host(), exchange.path())
        else {
            if !self.config.answer_unrouted() {
                return Dispatch::Unrouted;
            }
            let err = AgoraError::not_found_resource(exchange.path());
            finish(exchange, Err(err), started);
            return Dispatch::Complete;
        };

        for (name, value) in resolved.params.iter() {
            let value = urlencoding::decode(value)
                .map_or_else(|_| value.to_string(), std::borrow::Cow::into_owned);
            exchange.params_mut().insert(name.to_string(), Value::String(value));
        }
        let handler = Arc::clone(resolved.handler);

        match handler.request(exchange) {
            Ok(Step::Collect { limit }) => {
                if let Err(err) = exchange.enter(Phase::AwaitingBody) {
                    finish(exchange, Err(err), started);
                    return Dispatch::Complete;
                }
                Dispatch::Collect(Pending {
                    handler,
                    limit: self.config.effective_limit(limit),
                    started,
                })
            }
            Ok(Step::Done) => {
                finish(exchange, Ok(()), started);
                Dispatch::Complete
            }
            Err(err) => {
                finish(exchange, Err(err), started);
                Dispatch::Complete
            }
        }
    }

    /// Runs both phases with a body that is already in hand.
    ///
    /// Convenience for transports and tests that read the whole request
    /// before dispatching.
    pub fn dispatch_with_body(&self, exchange: &mut Exchange, body: Bytes) {
        if let Dispatch::Collect(pending) = self.dispatch(exchange) {
            pending.collected(exchange, body);
        }
    }

    /// Returns the methods registered for `exchange`'s host and path.
    #[must_use]
    pub fn allowed_methods(&self, exchange: &Exchange) -> Vec<Method> {
        self.routes.allowed_methods(exchange.host(), exchange.path())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes.len())
            .field("config", &self.config)
            .finish()
    }
}

/// An exchange waiting for its request body.
pub struct Pending {
    handler: BoxedHandler,
    limit: usize,
    started: Instant,
}

impl Pending {
    /// Returns the maximum number of body bytes to collect.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Runs phase 2 with the collected body.
    pub fn collected(self, exchange: &mut Exchange, body: Bytes) {
        if body.len() > self.limit {
            let limit = self.limit;
            self.failed(exchange, CollectError::TooLarge { limit });
            return;
        }
        exchange.set_body(body);
        let result = self.handler.body(exchange);
        finish(exchange, result, self.started);
    }

    /// Reports a collection failure.
    pub fn failed(self, exchange: &mut Exchange, err: CollectError) {
        warn!(exchange_id = %exchange.id(), error = %err, "body collection failed");
        exchange.discard_body();
        finish(exchange, Err(err.into()), self.started);
    }

    /// Cancels the exchange. The handler never runs and no response is
    /// written.
    pub fn abandon(self, exchange: &mut Exchange) {
        exchange.discard_body();
        if let Err(err) = exchange.enter(Phase::Abandoned) {
            error!(exchange_id = %exchange.id(), error = %err, "abandon failed");
            return;
        }
        debug!(exchange_id = %exchange.id(), "exchange abandoned");
    }
}

impl std::fmt::Debug for Pending {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending")
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

/// Leaves exactly one response on the exchange and records the outcome.
fn finish(exchange: &mut Exchange, result: AgoraResult<()>, started: Instant) {
    match result {
        Ok(()) if exchange.is_responded() => {}
        Ok(()) => {
            error!(
                exchange_id = %exchange.id(),
                path = exchange.path(),
                "handler wrote no response"
            );
            respond_error(exchange, &AgoraError::internal("handler wrote no response"));
        }
        Err(err) if exchange.is_responded() => {
            error!(
                exchange_id = %exchange.id(),
                error = %err,
                "handler failed after responding"
            );
        }
        Err(err) => {
            if err.status_code().is_server_error() {
                error!(exchange_id = %exchange.id(), error = %err, "exchange failed");
            } else {
                debug!(exchange_id = %exchange.id(), error = %err, "exchange rejected");
            }
            respond_error(exchange, &err);
        }
    }

    let status = exchange
        .response()
        .map_or(StatusCode::INTERNAL_SERVER_ERROR, |r| r.status);
    debug!(
        exchange_id = %exchange.id(),
        method = %exchange.method(),
        path = exchange.path(),
        status = status.as_u16(),
        "exchange complete"
    );
    agora_telemetry::record_exchange(
        exchange.method().as_str(),
        status.as_u16(),
        started.elapsed(),
    );
}

fn respond_error(exchange: &mut Exchange, err: &AgoraError) {
    if let Err(write_err) = exchange.reply_error(err) {
        error!(exchange_id = %exchange.id(), error = %write_err, "could not write error response");
    }
}

/// Builds a route table, failing on the first invalid pattern.
pub fn routes<I>(entries: I) -> Result<Routes, RouteError>
where
    I: IntoIterator<Item = (Method, &'static str, BoxedHandler)>,
{
    let mut table = Routes::new();
    for (method, pattern, handler) in entries {
        table.route(method, pattern, handler)?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::{FnHandler, Handler};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        bodies: Arc<AtomicUsize>,
    }

    impl Handler for Echo {
        fn request(&self, _exchange: &mut Exchange) -> AgoraResult<Step> {
            Ok(Step::Collect { limit: Some(8) })
        }

        fn body(&self, exchange: &mut Exchange) -> AgoraResult<()> {
            self.bodies.fetch_add(1, Ordering::SeqCst);
            let body = exchange.body().cloned().unwrap_or_default();
            exchange.reply(StatusCode::OK, "text/plain", body)
        }
    }

    fn dispatcher(bodies: &Arc<AtomicUsize>) -> Dispatcher {
        let mut table = Routes::new();
        table
            .route(
                Method::POST,
                "/echo",
                Arc::new(Echo {
                    bodies: Arc::clone(bodies),
                }),
            )
            .unwrap();
        table
            .route(Method::GET, "/silent", Arc::new(FnHandler::new(|_: &mut Exchange| Ok(()))))
            .unwrap();
        table
            .route(
                Method::GET,
                "/fails",
                Arc::new(FnHandler::new(|_: &mut Exchange| {
                    Err(AgoraError::conflict("already exists"))
                })),
            )
            .unwrap();
        table
            .route(
                Method::GET,
                "/items/{id}",
                Arc::new(FnHandler::new(|exchange: &mut Exchange| {
                    let id = exchange.param("id").cloned().unwrap_or(Value::Null);
                    exchange.reply_json(StatusCode::OK, &id)
                })),
            )
            .unwrap();
        Dispatcher::new(table)
    }

    #[test]
    fn test_collect_then_body() {
        let bodies = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(&bodies);
        let mut exchange = Exchange::new(Method::POST, "/echo");

        let Dispatch::Collect(pending) = dispatcher.dispatch(&mut exchange) else {
            panic!("expected body collection");
        };
        assert_eq!(pending.limit(), 8);
        assert_eq!(exchange.phase(), Phase::AwaitingBody);

        pending.collected(&mut exchange, Bytes::from_static(b"hi"));
        assert_eq!(exchange.response().unwrap().body, "hi");
        assert_eq!(bodies.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_oversized_body_is_413() {
        let bodies = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(&bodies);
        let mut exchange = Exchange::new(Method::POST, "/echo");
        dispatcher.dispatch_with_body(&mut exchange, Bytes::from_static(b"too many bytes"));
        assert_eq!(exchange.response().unwrap().status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(bodies.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_collection_failures() {
        let dispatcher = dispatcher(&Arc::new(AtomicUsize::new(0)));

        let mut exchange = Exchange::new(Method::POST, "/echo");
        if let Dispatch::Collect(pending) = dispatcher.dispatch(&mut exchange) {
            pending.failed(&mut exchange, CollectError::Timeout);
        }
        assert_eq!(exchange.response().unwrap().status, StatusCode::BAD_REQUEST);

        let mut exchange = Exchange::new(Method::POST, "/echo");
        if let Dispatch::Collect(pending) = dispatcher.dispatch(&mut exchange) {
            pending.failed(&mut exchange, CollectError::TooLarge { limit: 8 });
        }
        assert_eq!(exchange.response().unwrap().status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_oversized_body_reports_limit() {
        let dispatcher = dispatcher(&Arc::new(AtomicUsize::new(0)));
        let mut exchange = Exchange::new(Method::POST, "/echo");
        let Dispatch::Collect(pending) = dispatcher.dispatch(&mut exchange) else {
            panic!("expected body collection");
        };
        pending.collected(&mut exchange, Bytes::from_static(b"123456789"));

        let body = exchange.response().unwrap().json().unwrap();
        assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
        assert!(exchange.body().is_none());
    }

    #[test]
    fn test_second_dispatch_answers_once() {
        let bodies = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(&bodies);

        let mut exchange = Exchange::new(Method::POST, "/echo");
        let Dispatch::Collect(_pending) = dispatcher.dispatch(&mut exchange) else {
            panic!("expected body collection");
        };
        assert!(matches!(dispatcher.dispatch(&mut exchange), Dispatch::Complete));
        assert_eq!(
            exchange.response().unwrap().status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(bodies.load(Ordering::SeqCst), 0);

        let mut exchange = Exchange::new(Method::GET, "/items/7");
        let _ = dispatcher.dispatch(&mut exchange);
        let _ = dispatcher.dispatch(&mut exchange);
        let response = exchange.response().unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json().unwrap(), "7");
    }

    #[test]
    fn test_abandon_never_runs_body() {
        let bodies = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(&bodies);
        let mut exchange = Exchange::new(Method::POST, "/echo");
        if let Dispatch::Collect(pending) = dispatcher.dispatch(&mut exchange) {
            pending.abandon(&mut exchange);
        }
        assert_eq!(exchange.phase(), Phase::Abandoned);
        assert!(!exchange.is_responded());
        assert_eq!(bodies.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_silent_handler_gets_500() {
        let dispatcher = dispatcher(&Arc::new(AtomicUsize::new(0)));
        let mut exchange = Exchange::new(Method::GET, "/silent");
        assert!(matches!(dispatcher.dispatch(&mut exchange), Dispatch::Complete));
        assert_eq!(
            exchange.response().unwrap().status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_handler_error_becomes_envelope() {
        let dispatcher = dispatcher(&Arc::new(AtomicUsize::new(0)));
        let mut exchange = Exchange::new(Method::GET, "/fails");
        let _ = dispatcher.dispatch(&mut exchange);
        let response = exchange.response().unwrap();
        assert_eq!(response.status, StatusCode::CONFLICT);
        assert_eq!(response.json().unwrap()["error"]["code"], "ALREADY_EXISTS");
    }

    #[test]
    fn test_path_captures_are_decoded_into_params() {
        let dispatcher = dispatcher(&Arc::new(AtomicUsize::new(0)));
        let mut exchange = Exchange::new(Method::GET, "/items/new%20york");
        let _ = dispatcher.dispatch(&mut exchange);
        assert_eq!(exchange.response().unwrap().json().unwrap(), "new york");
    }

    #[test]
    fn test_unrouted() {
        let dispatcher = dispatcher(&Arc::new(AtomicUsize::new(0)));
        let mut exchange = Exchange::new(Method::GET, "/nowhere");
        let _ = dispatcher.dispatch(&mut exchange);
        assert_eq!(exchange.response().unwrap().status, StatusCode::NOT_FOUND);

        let quiet = Dispatcher::with_config(
            Routes::new(),
            DispatcherConfig::builder().answer_unrouted(false).build(),
        );
        let mut exchange = Exchange::new(Method::GET, "/nowhere");
        assert!(matches!(quiet.dispatch(&mut exchange), Dispatch::Unrouted));
        assert!(!exchange.is_responded());
    }

    #[test]
    fn test_routes_helper() {
        let handler: BoxedHandler = Arc::new(FnHandler::new(|_: &mut Exchange| Ok(())));
        let table = routes([
            (Method::GET, "/a", Arc::clone(&handler)),
            (Method::GET, "/b/{id}", handler),
        ])
        .unwrap();
        assert_eq!(table.len(), 2);
        assert!(routes([(
            Method::GET,
            "/a/*x/y",
            Arc::new(FnHandler::new(|_: &mut Exchange| Ok(()))) as BoxedHandler
        )])
        .is_err());
    }
}
