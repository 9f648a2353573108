//! # Agora
//!
//! A small runtime for schema-validated HTTP services:
//!
//! - **Schema validation**: example-shaped templates compile into
//!   descriptors that check every decoded request before a service runs.
//! - **Two-phase services**: handlers see the request head first and ask
//!   for the body only when they want it.
//! - **Sessions**: an [`Authority`](authority::Authority) issues cookie
//!   tokens and gates routes on identity and rights.
//! - **Fact store**: a [`Metabase`](metabase::Metabase) keeps
//!   domain/predicate/key facts in SQLite with transactional writes.
//!
//! ## Quick Start
//!
//! ```rust
//! use agora::prelude::*;
//! use http::{Method, StatusCode};
//! use serde_json::json;
//!
//! let mut config = AgoraConfig::default();
//! config.telemetry.logging.enabled = false;
//!
//! let greet = Service::returning(|exchange: &Exchange| {
//!     Ok(json!(format!("hello {}", exchange.param_str("name").unwrap_or("?"))))
//! })
//! .with_schema(json!({"name": "[a-z]+"}))
//! .unwrap();
//!
//! let runtime = Runtime::builder(config)
//!     .without_telemetry()
//!     .route(Method::GET, "/greet", greet)
//!     .build()
//!     .unwrap();
//!
//! let mut exchange = Exchange::new(Method::GET, "/greet?name=ada");
//! let _ = runtime.dispatcher().dispatch(&mut exchange);
//! assert_eq!(exchange.response().unwrap().status, StatusCode::OK);
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//! Exchange → RouteTable → [Authority gate] → phase 1 ─┬─ Done ─────────────┐
//!                                                     └─ Collect ─ phase 2 ┤
//!                                                                          ↓
//!                                   exactly one response (or error envelope)
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod runtime;

pub use error::RuntimeError;
pub use runtime::{
    authority_config, Runtime, RuntimeBuilder, DEFAULT_LOGIN_PATH, DEFAULT_LOGOUT_PATH,
};

pub use agora_authority as authority;
pub use agora_config as config;
pub use agora_core as core;
pub use agora_metabase as metabase;
pub use agora_router as router;
pub use agora_schema as schema;
pub use agora_server as server;
pub use agora_telemetry as telemetry;

/// Common imports.
///
/// ```rust
/// use agora::prelude::*;
/// ```
pub mod prelude {
    pub use agora_authority::{Authority, AuthorityConfig, CredentialVerifier, Realm, Session};
    pub use agora_config::{AgoraConfig, ConfigLoader};
    pub use agora_core::{AgoraError, AgoraResult, Exchange, FnHandler, Handler, Step};
    pub use agora_metabase::{Access, Address, Metabase, MetabaseService, Written};
    pub use agora_schema::Descriptor;
    pub use agora_server::{Dispatch, Dispatcher, Routes, Service};

    pub use crate::{Runtime, RuntimeBuilder, RuntimeError};
}
