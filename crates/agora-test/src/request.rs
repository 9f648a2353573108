//! Test request building.

use std::net::IpAddr;

use agora_core::Exchange;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;

use crate::error::TestError;

/// A request ready to be turned into an [`Exchange`].
#[derive(Debug, Clone)]
pub struct TestRequest {
    /// HTTP method.
    pub method: Method,
    /// Request target: path and optional query.
    pub target: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
    /// Client address seen by the server.
    pub client_addr: Option<IpAddr>,
}

impl TestRequest {
    /// Starts a GET request.
    pub fn get(target: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET, target)
    }

    /// Starts a POST request.
    pub fn post(target: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST, target)
    }

    /// Converts the request head into an exchange. The body is delivered
    /// separately, after phase 1.
    #[must_use]
    pub fn to_exchange(&self) -> Exchange {
        let mut exchange = Exchange::new(self.method.clone(), &self.target);
        for (name, value) in &self.headers {
            exchange = exchange.with_header(name.clone(), value.clone());
        }
        if let Some(addr) = self.client_addr {
            exchange = exchange.with_client_addr(addr);
        }
        exchange
    }
}

/// Builder for [`TestRequest`].
///
/// Header and encoding errors are kept until [`build`](Self::build).
#[must_use]
#[derive(Debug)]
pub struct TestRequestBuilder {
    method: Method,
    target: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    client_addr: Option<IpAddr>,
    error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Creates a builder for `method` and `target`.
    pub fn new(method: Method, target: impl AsRef<str>) -> Self {
        Self {
            method,
            target: target.as_ref().to_string(),
            headers: HeaderMap::new(),
            body: None,
            client_addr: None,
            error: None,
        }
    }

    /// Appends a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = HeaderName::try_from(name.as_ref());
        let value = HeaderValue::try_from(value.as_ref());
        match (name, value) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            (Err(e), _) => self.fail(TestError::InvalidHeader(e.to_string())),
            (_, Err(e)) => self.fail(TestError::InvalidHeader(e.to_string())),
        }
        self
    }

    /// Sets the `Content-Type` header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), content_type)
    }

    /// Sets the `Authorization` header with a bearer token.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        self.header(
            header::AUTHORIZATION.as_str(),
            format!("Bearer {}", token.as_ref()),
        )
    }

    /// Adds a `Cookie` header carrying one cookie.
    pub fn cookie(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.header(
            header::COOKIE.as_str(),
            format!("{}={}", name.as_ref(), value.as_ref()),
        )
    }

    /// Sets the `Host` header.
    pub fn host(self, host: impl AsRef<str>) -> Self {
        self.header(header::HOST.as_str(), host)
    }

    /// Sets the client address.
    pub const fn client_addr(mut self, addr: IpAddr) -> Self {
        self.client_addr = Some(addr);
        self
    }

    /// Appends `value` to the target as a URL-encoded query.
    pub fn query<T: Serialize>(mut self, value: &T) -> Self {
        match serde_urlencoded::to_string(value) {
            Ok(encoded) => {
                let separator = if self.target.contains('?') { '&' } else { '?' };
                self.target.push(separator);
                self.target.push_str(&encoded);
            }
            Err(e) => self.fail(TestError::RequestBuild(format!("query encoding: {e}"))),
        }
        self
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a JSON body and its content type.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.body = Some(Bytes::from(bytes)),
            Err(e) => self.fail(TestError::Json(e)),
        }
        self.content_type("application/json")
    }

    /// Finishes the request.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded while building.
    pub fn build(self) -> Result<TestRequest, TestError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if !self.target.starts_with('/') {
            return Err(TestError::RequestBuild(format!(
                "target must start with '/': {}",
                self.target
            )));
        }
        Ok(TestRequest {
            method: self.method,
            target: self.target,
            headers: self.headers,
            body: self.body.unwrap_or_default(),
            client_addr: self.client_addr,
        })
    }

    fn fail(&mut self, err: TestError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}
