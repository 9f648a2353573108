//! # Agora Core
//!
//! Core types and traits for the Agora runtime.
//!
//! - [`Exchange`] - One request/response pair with its parameter bag,
//!   identity, lifecycle [`Phase`] and write-once [`Response`]
//! - [`ExchangeId`] - UUID v7 exchange identifier
//! - [`Handler`] - The two-phase service contract
//! - [`AgoraError`] - Standard error taxonomy and envelopes

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod exchange;
mod handler;

pub use error::{AgoraError, AgoraResult, ErrorCategory, ErrorDetail, ErrorEnvelope};
pub use exchange::{Exchange, ExchangeId, Params, Phase, Response, JSON_CONTENT_TYPE};
pub use handler::{BoxedHandler, FnHandler, Handler, Step};
