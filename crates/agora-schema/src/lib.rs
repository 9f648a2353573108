//! Agora Schema - template-compiled input validation
//!
//! This crate compiles example values ("templates") into immutable
//! [`Descriptor`]s and checks decoded request values against them before a
//! service body ever runs.
//!
//! # Overview
//!
//! ```text
//!   template (example JSON) ──compile──▶ Descriptor ──┐
//!                                                      ├──validate──▶ Ok | SchemaError{field, reason}
//!   decoded request value ─────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use agora_schema::Descriptor;
//! use serde_json::json;
//!
//! let descriptor = Descriptor::compile(&json!({
//!     "name": "[A-Za-z ]+",
//!     "tags": [""],
//!     "age?": 0
//! })).unwrap();
//!
//! assert!(descriptor.validate(&json!({"name": "Ada", "tags": []})).is_ok());
//!
//! let err = descriptor.validate(&json!({"name": "Ada", "tags": [1]})).unwrap_err();
//! assert_eq!(err.field, "$.tags[0]");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod descriptor;
pub mod error;
pub mod validation;

pub use descriptor::{Descriptor, Field, OPTIONAL_SUFFIX};
pub use error::{SchemaError, SchemaResult};
pub use validation::validate;
