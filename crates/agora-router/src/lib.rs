//! Route table for Agora.
//!
//! Maps `(method, host, path pattern)` to a handler of any type. Matching is
//! linear in registration order and the first matching route wins, so more
//! specific routes are registered before prefix mounts.
//!
//! # Patterns
//!
//! - Literal segments: `/login`
//! - Single-segment captures: `/users/{id}`
//! - Trailing rest captures for prefix mounts: `/met/*about`
//! - Regular expressions, when the pattern starts with `^`:
//!   `^/(?P<domain>\w+)/(?P<predicate>\w+)$`
//!
//! # Example
//!
//! ```rust
//! use agora_router::RouteTable;
//! use http::Method;
//!
//! let mut table = RouteTable::new();
//! table.route(Method::GET, "/users/{id}", "getUser").unwrap();
//! table.route(Method::GET, "/files/*path", "serveFile").unwrap();
//!
//! let resolved = table.resolve(&Method::GET, "localhost", "/users/123").unwrap();
//! assert_eq!(*resolved.handler, "getUser");
//! assert_eq!(resolved.params.get("id"), Some("123"));
//!
//! let resolved = table.resolve(&Method::GET, "localhost", "/files/img/logo.png").unwrap();
//! assert_eq!(resolved.params.get("path"), Some("img/logo.png"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod params;
mod pattern;
mod table;

pub use error::RouteError;
pub use params::PathParams;
pub use pattern::{Pattern, Segment};
pub use table::{Resolved, Route, RouteTable, ANY_HOST};
