//! # Agora Server
//!
//! The service binder and lifecycle driver of the Agora runtime.
//!
//! - [`Service`] binds a function to an input schema and runs the two-phase
//!   request/body lifecycle for it
//! - [`Dispatcher`] resolves exchanges through the route table, runs phase 1,
//!   and hands back a [`Pending`] when the body must be collected
//! - [`decode_query`] and [`merge_body`] build the parameter bag
//!
//! The socket loop is not part of this crate: any transport that can build
//! an [`agora_core::Exchange`], collect a body and send back the written
//! [`agora_core::Response`] can drive a dispatcher.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use agora_core::Exchange;
//! use agora_server::{Dispatch, Dispatcher, Routes, Service};
//! use bytes::Bytes;
//! use http::{Method, StatusCode};
//! use serde_json::json;
//!
//! let add = Service::returning(|exchange: &Exchange| {
//!     let a = exchange.param("a").and_then(|v| v.as_i64()).unwrap_or(0);
//!     let b = exchange.param("b").and_then(|v| v.as_i64()).unwrap_or(0);
//!     Ok(json!(a + b))
//! })
//! .with_schema(json!({"a": 0, "b": 0}))
//! .unwrap();
//!
//! let mut routes = Routes::new();
//! routes
//!     .register_methods(&[Method::GET, Method::POST], "*", "/add", Arc::new(add))
//!     .unwrap();
//! let dispatcher = Dispatcher::new(routes);
//!
//! let mut exchange = Exchange::new(Method::POST, "/add");
//! let Dispatch::Collect(pending) = dispatcher.dispatch(&mut exchange) else {
//!     unreachable!()
//! };
//! pending.collected(&mut exchange, Bytes::from_static(br#"{"a": 2, "b": 3}"#));
//!
//! let response = exchange.take_response().unwrap();
//! assert_eq!(response.status, StatusCode::OK);
//! assert_eq!(response.body, "5");
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
mod dispatcher;
mod query;
mod service;

pub use config::{DispatcherConfig, DispatcherConfigBuilder, DEFAULT_MAX_BODY_BYTES};
pub use dispatcher::{routes, CollectError, Dispatch, Dispatcher, Pending, Routes};
pub use query::{decode_query, merge_body, DEFAULT_ARGUMENT};
pub use service::{Service, DEFAULT_SERVICE_BODY_LIMIT};
