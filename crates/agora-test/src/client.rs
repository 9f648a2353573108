//! In-memory client driving a [`Dispatcher`].

use std::collections::BTreeMap;
use std::net::IpAddr;

use agora_server::{Dispatch, Dispatcher};
use bytes::Bytes;
use http::{header, Method};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::TestError;
use crate::request::{TestRequest, TestRequestBuilder};
use crate::response::{parse_set_cookie, TestResponse};

/// Sends requests through a dispatcher without a network.
///
/// Cookies set by responses are kept in a jar and sent with later
/// requests; a cookie set with a past expiry is dropped.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use agora_core::{Exchange, FnHandler};
/// use agora_server::{Dispatcher, Routes};
/// use agora_test::TestClient;
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
/// let client = TestClient::new(Dispatcher::new(routes));
///
/// let response = client.get("/ping").send();
/// response.assert_status(StatusCode::OK);
/// assert_eq!(response.text().unwrap(), "pong");
/// ```
#[must_use]
#[derive(Debug)]
pub struct TestClient {
    dispatcher: Dispatcher,
    default_headers: Vec<(String, String)>,
    client_addr: Option<IpAddr>,
    jar: Mutex<BTreeMap<String, String>>,
}

impl TestClient {
    /// Creates a client for `dispatcher`.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            default_headers: Vec::new(),
            client_addr: None,
            jar: Mutex::new(BTreeMap::new()),
        }
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Sets the client address used for every request.
    pub const fn with_client_addr(mut self, addr: IpAddr) -> Self {
        self.client_addr = Some(addr);
        self
    }

    /// Returns the dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Returns a cookie from the jar.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.jar.lock().get(name).cloned()
    }

    /// Puts a cookie in the jar.
    pub fn set_cookie(&self, name: impl Into<String>, value: impl Into<String>) {
        self.jar.lock().insert(name.into(), value.into());
    }

    /// Empties the jar.
    pub fn clear_cookies(&self) {
        self.jar.lock().clear();
    }

    /// Starts a GET request.
    pub fn get(&self, target: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::GET, target)
    }

    /// Starts a POST request.
    pub fn post(&self, target: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::POST, target)
    }

    /// Starts a PUT request.
    pub fn put(&self, target: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PUT, target)
    }

    /// Starts a DELETE request.
    pub fn delete(&self, target: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, target)
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, target: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequestBuilder::new(method, target))
    }

    /// Runs both phases of `request` and returns the response.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::Unrouted`] when the dispatcher leaves the
    /// exchange to the transport, and [`TestError::NoResponse`] if no
    /// response was written.
    pub fn execute(&self, request: TestRequest) -> Result<TestResponse, TestError> {
        let mut exchange = request.to_exchange();
        match self.dispatcher.dispatch(&mut exchange) {
            Dispatch::Complete => {}
            Dispatch::Collect(pending) => pending.collected(&mut exchange, request.body),
            Dispatch::Unrouted => {
                return Err(TestError::Unrouted {
                    method: request.method.to_string(),
                    path: exchange.path().to_string(),
                });
            }
        }

        let response: TestResponse = exchange
            .take_response()
            .ok_or(TestError::NoResponse)?
            .into();
        self.store_cookies(&response);
        Ok(response)
    }

    fn store_cookies(&self, response: &TestResponse) {
        let mut jar = self.jar.lock();
        for cookie in response.set_cookies().into_iter().filter_map(parse_set_cookie) {
            if cookie.expired {
                jar.remove(cookie.name);
            } else {
                jar.insert(cookie.name.to_string(), cookie.value.to_string());
            }
        }
    }

    fn cookie_header(&self) -> Option<String> {
        let jar = self.jar.lock();
        if jar.is_empty() {
            return None;
        }
        let pairs: Vec<String> = jar.iter().map(|(k, v)| format!("{k}={v}")).collect();
        Some(pairs.join("; "))
    }
}

/// A request builder bound to a [`TestClient`].
#[must_use]
#[derive(Debug)]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl<'a> TestClientRequest<'a> {
    fn new(client: &'a TestClient, mut builder: TestRequestBuilder) -> Self {
        for (name, value) in &client.default_headers {
            builder = builder.header(name, value);
        }
        if let Some(cookies) = client.cookie_header() {
            builder = builder.header(header::COOKIE.as_str(), cookies);
        }
        if let Some(addr) = client.client_addr {
            builder = builder.client_addr(addr);
        }
        Self { client, builder }
    }

    /// Appends a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets the `Authorization` header with a bearer token.
    pub fn bearer_token(mut self, token: impl AsRef<str>) -> Self {
        self.builder = self.builder.bearer_token(token);
        self
    }

    /// Adds a cookie beyond those in the jar.
    pub fn cookie(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.cookie(name, value);
        self
    }

    /// Sets the `Host` header.
    pub fn host(mut self, host: impl AsRef<str>) -> Self {
        self.builder = self.builder.host(host);
        self
    }

    /// Sets the client address.
    pub fn client_addr(mut self, addr: IpAddr) -> Self {
        self.builder = self.builder.client_addr(addr);
        self
    }

    /// Appends a URL-encoded query.
    pub fn query<T: Serialize>(mut self, value: &T) -> Self {
        self.builder = self.builder.query(value);
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sends the request.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or gets no response; use
    /// [`try_send`](Self::try_send) to inspect the error.
    pub fn send(self) -> TestResponse {
        match self.try_send() {
            Ok(response) => response,
            Err(err) => panic!("test request failed: {err}"),
        }
    }

    /// Sends the request.
    ///
    /// # Errors
    ///
    /// Returns the build or dispatch error.
    pub fn try_send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        self.client.execute(request)
    }
}
