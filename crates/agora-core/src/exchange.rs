//! Exchange types.
//!
//! An [`Exchange`] is one request/response pair as handed over by the
//! transport. The core mutates its parameter bag, identity and phase, and
//! writes its response exactly once.

use std::fmt;
use std::net::IpAddr;

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{AgoraError, AgoraResult};

/// The parameter bag: unique keys mapped to dynamic values.
pub type Params = Map<String, Value>;

/// Content type of every JSON response.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// A unique identifier for each exchange, using UUID v7.
///
/// # Example
///
/// ```
/// use agora_core::ExchangeId;
///
/// let a = ExchangeId::new();
/// let b = ExchangeId::new();
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(Uuid);

impl ExchangeId {
    /// Creates a new time-ordered exchange ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ExchangeId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Lifecycle phase of an exchange.
///
/// Phases only move forward: `AwaitingRequest → AwaitingBody → Ready`, with
/// `Abandoned` as the terminal state for transport cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Request line and headers received, nothing dispatched yet.
    AwaitingRequest,
    /// The handler asked for the request body.
    AwaitingBody,
    /// Parameters are complete; the handler runs.
    Ready,
    /// The transport gave up on the exchange.
    Abandoned,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingRequest => "awaiting_request",
            Self::AwaitingBody => "awaiting_body",
            Self::Ready => "ready",
            Self::Abandoned => "abandoned",
        };
        f.write_str(name)
    }
}

/// A written response.
#[derive(Debug, Clone)]
pub struct Response {
    /// Status code.
    pub status: StatusCode,
    /// Response headers, including any queued before the write.
    pub headers: HeaderMap,
    /// Body bytes.
    pub body: Bytes,
}

impl Response {
    /// Decodes the body as JSON.
    pub fn json(&self) -> AgoraResult<Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// One request/response exchange.
///
/// # Example
///
/// ```
/// use agora_core::Exchange;
/// use http::{Method, StatusCode};
/// use serde_json::json;
///
/// let mut exchange = Exchange::new(Method::GET, "/met/people/knows?limit=3");
/// assert_eq!(exchange.path(), "/met/people/knows");
/// assert_eq!(exchange.query(), Some("limit=3"));
/// assert_eq!(exchange.segments(), ["met", "people", "knows"]);
///
/// exchange.reply_json(StatusCode::OK, &json!({"ok": true})).unwrap();
/// assert!(exchange.is_responded());
/// assert!(exchange.reply_json(StatusCode::OK, &json!(null)).is_err());
/// ```
#[derive(Debug)]
pub struct Exchange {
    id: ExchangeId,
    method: Method,
    host: String,
    path: String,
    query: Option<String>,
    segments: Vec<String>,
    headers: HeaderMap,
    client_addr: Option<IpAddr>,
    params: Params,
    identity: Option<String>,
    rights: Value,
    phase: Phase,
    body: Option<Bytes>,
    response_headers: HeaderMap,
    response: Option<Response>,
    responded: bool,
}

impl Exchange {
    /// Creates an exchange for `method` and a request target (`path[?query]`).
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };
        let path = if path.is_empty() { "/" } else { path };

        Self {
            id: ExchangeId::new(),
            method,
            host: String::new(),
            path: path.to_string(),
            query,
            segments: split_segments(path),
            headers: HeaderMap::new(),
            client_addr: None,
            params: Params::new(),
            identity: None,
            rights: Value::Null,
            phase: Phase::AwaitingRequest,
            body: None,
            response_headers: HeaderMap::new(),
            response: None,
            responded: false,
        }
    }

    /// Creates an exchange from the head of an HTTP request.
    #[must_use]
    pub fn from_request<B>(request: &http::Request<B>) -> Self {
        let target = request
            .uri()
            .path_and_query()
            .map_or_else(|| request.uri().path().to_string(), ToString::to_string);
        let mut exchange = Self::new(request.method().clone(), &target);
        for (name, value) in request.headers() {
            exchange.headers.append(name, value.clone());
        }
        exchange.host = request
            .uri()
            .host()
            .map(ToString::to_string)
            .or_else(|| exchange.host_header())
            .unwrap_or_default();
        exchange
    }

    /// Adds a request header. A `Host` header also sets the host.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name.clone(), value);
        if name == header::HOST {
            self.host = self.host_header().unwrap_or_default();
        }
        self
    }

    /// Sets the host the request was addressed to.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the client address.
    #[must_use]
    pub fn with_client_addr(mut self, addr: IpAddr) -> Self {
        self.client_addr = Some(addr);
        self
    }

    fn host_header(&self) -> Option<String> {
        let host = self.headers.get(header::HOST)?.to_str().ok()?;
        let host = host.rsplit_once(':').map_or(host, |(name, port)| {
            if port.chars().all(|c| c.is_ascii_digit()) {
                name
            } else {
                host
            }
        });
        Some(host.to_string())
    }

    /// Returns the exchange ID.
    #[must_use]
    pub const fn id(&self) -> ExchangeId {
        self.id
    }

    /// Returns the request method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request host (without port).
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the request path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the raw query string, if the target carried one.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns the percent-decoded, non-empty path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a request header as a string, if present and valid.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the client address.
    #[must_use]
    pub const fn client_addr(&self) -> Option<IpAddr> {
        self.client_addr
    }

    /// Returns the value of a request cookie.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.trim_matches('"'))
    }

    /// Returns the bearer token from the `Authorization` header.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        let value = self.header(header::AUTHORIZATION.as_str())?;
        let (scheme, token) = value.split_once(' ')?;
        scheme
            .eq_ignore_ascii_case("bearer")
            .then_some(token.trim())
            .filter(|t| !t.is_empty())
    }

    /// Returns the parameter bag.
    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    /// Returns the parameter bag mutably.
    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Returns a parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Returns a string parameter by name.
    #[must_use]
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    /// Returns the identity set by the Authority, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Returns the rights set by the Authority (`null` when anonymous).
    #[must_use]
    pub const fn rights(&self) -> &Value {
        &self.rights
    }

    /// Sets identity and rights.
    pub fn set_identity(&mut self, identity: impl Into<String>, rights: Value) {
        self.identity = Some(identity.into());
        self.rights = rights;
    }

    /// Clears identity and rights.
    pub fn clear_identity(&mut self) {
        self.identity = None;
        self.rights = Value::Null;
    }

    /// Returns true if the rights grant `right`.
    ///
    /// Rights may be a whitespace or comma separated string, an array of
    /// strings, or a record whose keys name the granted rights.
    #[must_use]
    pub fn has_right(&self, right: &str) -> bool {
        match &self.rights {
            Value::String(s) => s
                .split(|c: char| c.is_whitespace() || c == ',')
                .any(|r| r == right),
            Value::Array(items) => items.iter().any(|v| v.as_str() == Some(right)),
            Value::Object(map) => map
                .get(right)
                .is_some_and(|v| !matches!(v, Value::Null | Value::Bool(false))),
            _ => false,
        }
    }

    /// Returns the current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Moves the exchange to a later phase.
    pub fn enter(&mut self, next: Phase) -> AgoraResult<()> {
        if next <= self.phase {
            return Err(AgoraError::internal(format!(
                "cannot move from {} to {next}",
                self.phase
            )));
        }
        debug!(exchange_id = %self.id, from = %self.phase, to = %next, "phase transition");
        self.phase = next;
        Ok(())
    }

    /// Returns the collected request body.
    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Stores the collected request body.
    pub fn set_body(&mut self, body: Bytes) {
        self.body = Some(body);
    }

    /// Drops any collected request body.
    pub fn discard_body(&mut self) {
        self.body = None;
    }

    /// Queues a response header, sent with whatever response is written.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response_headers.append(name, value);
    }

    /// Returns the queued response headers.
    #[must_use]
    pub const fn pending_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    /// Writes the response.
    ///
    /// Fails with an internal error if a response was already written.
    pub fn reply(
        &mut self,
        status: StatusCode,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> AgoraResult<()> {
        if self.responded {
            error!(exchange_id = %self.id, %status, "response already written");
            return Err(AgoraError::internal("response already written"));
        }
        let mut headers = std::mem::take(&mut self.response_headers);
        let content_type = HeaderValue::from_str(content_type)
            .map_err(|e| AgoraError::internal_with_source("invalid content type", e))?;
        headers.insert(header::CONTENT_TYPE, content_type);
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        self.response = Some(Response {
            status,
            headers,
            body: body.into(),
        });
        self.responded = true;
        Ok(())
    }

    /// Writes a compact JSON response.
    pub fn reply_json(&mut self, status: StatusCode, value: &Value) -> AgoraResult<()> {
        let body = serde_json::to_vec(value)
            .map_err(|e| AgoraError::internal_with_source("encode response", e))?;
        self.reply(status, JSON_CONTENT_TYPE, body)
    }

    /// Writes a pretty-printed JSON response.
    pub fn reply_pretty_json(&mut self, status: StatusCode, value: &Value) -> AgoraResult<()> {
        let body = serde_json::to_vec_pretty(value)
            .map_err(|e| AgoraError::internal_with_source("encode response", e))?;
        self.reply(status, JSON_CONTENT_TYPE, body)
    }

    /// Writes the error envelope for `err`.
    pub fn reply_error(&mut self, err: &AgoraError) -> AgoraResult<()> {
        let envelope = err.to_envelope(Some(&self.id.to_string()));
        let body = serde_json::to_vec(&envelope)
            .map_err(|e| AgoraError::internal_with_source("encode error envelope", e))?;
        self.reply(err.status_code(), JSON_CONTENT_TYPE, body)
    }

    /// Returns true once a response has been written, even if it has
    /// since been taken.
    #[must_use]
    pub const fn is_responded(&self) -> bool {
        self.responded
    }

    /// Returns the written response.
    #[must_use]
    pub const fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Takes the written response, handing it to the transport.
    ///
    /// The exchange stays responded; a later write still fails.
    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }
}

fn split_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            urlencoding::decode(s).map_or_else(|_| s.to_string(), std::borrow::Cow::into_owned)
        })
        .collect()
}
