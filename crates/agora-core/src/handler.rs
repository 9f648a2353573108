//! The two-phase handler contract.
//!
//! Every service implements [`Handler`]. Phase 1 ([`Handler::request`]) runs
//! once the request head is known and either finishes the exchange or asks
//! the transport to collect the body. Phase 2 ([`Handler::body`]) runs once
//! the collected bytes are stored on the exchange.

use std::sync::Arc;

use crate::error::{AgoraError, AgoraResult};
use crate::exchange::Exchange;

/// Outcome of phase 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The handler is finished with the exchange.
    Done,
    /// Collect the request body, up to `limit` bytes, then call
    /// [`Handler::body`].
    Collect {
        /// Maximum body size in bytes, if bounded.
        limit: Option<usize>,
    },
}

/// A service bound to a route.
///
/// Handlers run synchronously and write their response through the
/// exchange. Returning `Err` without having written a response lets the
/// dispatcher answer with the error's envelope.
///
/// # Example
///
/// ```
/// use agora_core::{AgoraResult, Exchange, Handler, Step};
/// use http::{Method, StatusCode};
/// use serde_json::json;
///
/// struct Ping;
///
/// impl Handler for Ping {
///     fn request(&self, exchange: &mut Exchange) -> AgoraResult<Step> {
///         exchange.reply_json(StatusCode::OK, &json!("pong"))?;
///         Ok(Step::Done)
///     }
/// }
///
/// let mut exchange = Exchange::new(Method::GET, "/ping");
/// assert_eq!(Ping.request(&mut exchange).unwrap(), Step::Done);
/// assert!(exchange.is_responded());
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Phase 1: the request head has arrived.
    fn request(&self, exchange: &mut Exchange) -> AgoraResult<Step>;

    /// Phase 2: the body requested by [`Step::Collect`] is on the exchange.
    fn body(&self, exchange: &mut Exchange) -> AgoraResult<()> {
        let _ = exchange;
        Err(AgoraError::internal("handler does not accept a request body"))
    }
}

/// A shared, type-erased handler.
pub type BoxedHandler = Arc<dyn Handler>;

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn request(&self, exchange: &mut Exchange) -> AgoraResult<Step> {
        (**self).request(exchange)
    }

    fn body(&self, exchange: &mut Exchange) -> AgoraResult<()> {
        (**self).body(exchange)
    }
}

/// A single-phase handler built from a closure.
///
/// # Example
///
/// ```
/// use agora_core::{Exchange, FnHandler, Handler};
/// use http::{Method, StatusCode};
///
/// let handler = FnHandler::new(|exchange: &mut Exchange| {
///     exchange.reply(StatusCode::OK, "text/plain", "hello")
/// });
/// let mut exchange = Exchange::new(Method::GET, "/");
/// handler.request(&mut exchange).unwrap();
/// assert_eq!(exchange.response().unwrap().body, "hello");
/// ```
pub struct FnHandler<F> {
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&mut Exchange) -> AgoraResult<()> + Send + Sync + 'static,
{
    /// Creates a new function-based handler.
    #[must_use]
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut Exchange) -> AgoraResult<()> + Send + Sync + 'static,
{
    fn request(&self, exchange: &mut Exchange) -> AgoraResult<Step> {
        (self.func)(exchange)?;
        Ok(Step::Done)
    }
}

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}
