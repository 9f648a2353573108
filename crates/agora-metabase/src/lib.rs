//! # Agora Metabase
//!
//! A transactional fact store. Each fact is addressed by domain, predicate
//! and key, and identified by a topic: the SHA-1 of the netstring-encoded
//! address. Values are opaque bytes, usually JSON.
//!
//! [`Metabase`] owns one SQLite connection behind a mutex and runs every
//! write as `begin, select, insert or update, commit`. [`MetabaseService`]
//! exposes the store over the two-phase handler contract.
//!
//! ```rust
//! use std::sync::Arc;
//! use agora_metabase::{Address, Metabase};
//! use serde_json::json;
//!
//! let store = Arc::new(Metabase::open_in_memory().unwrap());
//! store
//!     .write(&Address::new("people", "knows", "alice").unwrap(), br#""bob""#)
//!     .unwrap();
//! assert_eq!(store.produce("people", "knows").unwrap(), json!({"alice": "bob"}));
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod address;
mod error;
mod service;
mod store;

pub use address::{articulate, Address};
pub use error::{MetabaseError, MetabaseResult};
pub use service::{Access, MetabaseService, DEFAULT_MOUNT, ROUTED_METHODS};
pub use store::{decode_value, Facts, Metabase, Written, DEFAULT_BUSY_TIMEOUT};
