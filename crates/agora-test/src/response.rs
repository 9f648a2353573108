//! Test response wrapper.

use std::fmt;
use std::time::SystemTime;

use agora_core::Response;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TestError;

/// A written response with helpers for assertions.
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Creates a test response from raw parts.
    #[must_use]
    pub const fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a `u16`.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns true for a 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value by name.
    #[must_use]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        self.headers.get(name.as_ref())
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.header(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the `Content-Type` header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE.as_str())
    }

    /// Returns every `Set-Cookie` header.
    #[must_use]
    pub fn set_cookies(&self) -> Vec<&str> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Returns the value set for cookie `name`, if any.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.set_cookies()
            .into_iter()
            .filter_map(parse_set_cookie)
            .find(|cookie| cookie.name == name)
            .map(|cookie| cookie.value)
    }

    /// Returns the raw body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::BodyRead`] if the body is not UTF-8.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| TestError::BodyRead(format!("invalid UTF-8: {e}")))
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::Json`] if the body does not decode.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Deserializes the body as a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::Json`] if the body does not decode.
    pub fn json_value(&self) -> Result<Value, TestError> {
        self.json()
    }

    /// Returns `error.code` from an error envelope body.
    #[must_use]
    pub fn error_code(&self) -> Option<String> {
        let envelope: Value = self.json().ok()?;
        envelope["error"]["code"].as_str().map(ToString::to_string)
    }

    /// Asserts the status code.
    ///
    /// # Panics
    ///
    /// Panics if the status differs; the body is included in the message.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "expected status {expected}, got {} with body {}",
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts a header value.
    ///
    /// # Panics
    ///
    /// Panics if the header is missing or differs.
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        let expected = expected.as_ref();
        let actual = self
            .header_str(name)
            .unwrap_or_else(|| panic!("header '{name}' not found"));
        assert_eq!(actual, expected, "header '{name}'");
        self
    }

    /// Asserts the JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the body is not JSON or differs.
    pub fn assert_json_eq(&self, expected: &Value) -> &Self {
        let actual = self
            .json_value()
            .unwrap_or_else(|e| panic!("body is not JSON: {e}"));
        assert_eq!(&actual, expected, "JSON body mismatch");
        self
    }

    /// Asserts the status and error code of an error envelope.
    ///
    /// # Panics
    ///
    /// Panics if either differs.
    pub fn assert_error(&self, status: StatusCode, code: &str) -> &Self {
        self.assert_status(status);
        assert_eq!(self.error_code().as_deref(), Some(code), "error code");
        self
    }
}

impl From<Response> for TestResponse {
    fn from(response: Response) -> Self {
        Self::new(response.status, response.headers, response.body)
    }
}

impl fmt::Debug for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// One parsed `Set-Cookie` line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct SetCookie<'a> {
    pub name: &'a str,
    pub value: &'a str,
    pub expired: bool,
}

pub(crate) fn parse_set_cookie(line: &str) -> Option<SetCookie<'_>> {
    let mut parts = line.split(';');
    let (name, value) = parts.next()?.trim().split_once('=')?;
    let expired = parts
        .filter_map(|attr| attr.trim().split_once('='))
        .filter(|(key, _)| key.eq_ignore_ascii_case("expires"))
        .filter_map(|(_, date)| httpdate::parse_http_date(date).ok())
        .any(|at| at <= SystemTime::now());
    Some(SetCookie {
        name,
        value,
        expired,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: StatusCode, body: &'static str) -> TestResponse {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=UTF-8"),
        );
        headers.append(
            header::SET_COOKIE,
            HeaderValue::from_static("IRTD2=abc; Path=/; HttpOnly"),
        );
        TestResponse::new(status, headers, Bytes::from_static(body.as_bytes()))
    }

    #[test]
    fn test_json_access() {
        let response = response(StatusCode::OK, r#"{"alice": "bob"}"#);
        response
            .assert_status(StatusCode::OK)
            .assert_json_eq(&json!({"alice": "bob"}))
            .assert_header("content-type", "application/json; charset=UTF-8");
        assert!(response.is_success());
        assert_eq!(response.cookie("IRTD2"), Some("abc"));
        assert_eq!(response.cookie("other"), None);
    }

    #[test]
    fn test_error_code() {
        let response = response(
            StatusCode::NOT_FOUND,
            r#"{"error": {"code": "NOT_FOUND", "message": "x"}}"#,
        );
        response.assert_error(StatusCode::NOT_FOUND, "NOT_FOUND");
    }

    #[test]
    #[should_panic(expected = "expected status 200 OK")]
    fn test_status_mismatch_panics() {
        response(StatusCode::BAD_REQUEST, "{}").assert_status(StatusCode::OK);
    }

    #[test]
    fn test_parse_set_cookie() {
        let cookie = parse_set_cookie("IRTD2=abc; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly")
            .unwrap();
        assert_eq!(cookie.name, "IRTD2");
        assert_eq!(cookie.value, "abc");
        assert!(cookie.expired);

        let cookie = parse_set_cookie("IRTD2=abc; Expires=Fri, 01 Jan 2100 00:00:00 GMT").unwrap();
        assert!(!cookie.expired);
        assert!(parse_set_cookie("garbage").is_none());
    }
}
