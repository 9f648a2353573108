//! # Agora Test
//!
//! In-memory exchange testing. A [`TestClient`] wraps a
//! [`Dispatcher`](agora_server::Dispatcher), turns each request into an
//! [`Exchange`](agora_core::Exchange), runs both handler phases and returns
//! the written response. No sockets are opened.
//!
//! ```rust
//! use std::sync::Arc;
//! use agora_server::{Dispatcher, Routes, Service};
//! use agora_test::TestClient;
//! use http::{Method, StatusCode};
//! use serde_json::json;
//!
//! let greet = Service::returning(|exchange: &agora_core::Exchange| {
//!     Ok(json!(format!("hello {}", exchange.param_str("name").unwrap_or("?"))))
//! });
//! let mut routes = Routes::new();
//! routes
//!     .register_methods(&[Method::GET, Method::POST], "*", "/greet", Arc::new(greet))
//!     .unwrap();
//! let client = TestClient::new(Dispatcher::new(routes));
//!
//! client
//!     .post("/greet")
//!     .json(&json!({"name": "ada"}))
//!     .send()
//!     .assert_status(StatusCode::OK)
//!     .assert_json_eq(&json!("hello ada"));
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use request::{TestRequest, TestRequestBuilder};
pub use response::TestResponse;
