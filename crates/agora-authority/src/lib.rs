//! Session identification for Agora.
//!
//! An [`Authority`] owns the sessions of one cookie realm. It establishes
//! sessions ([`Authority::identify`]), ends them ([`Authority::unidentify`])
//! and wraps handlers so they only run for identified exchanges
//! ([`Authority::identified`]) or for exchanges holding a right
//! ([`Authority::authorized`]).
//!
//! ```text
//!  login ──identify──▶ Session{token, identity, rights, expires_at}
//!                         │ Set-Cookie: IRTD2=<token>; Path; Domain; Expires; HttpOnly
//!                         ▼
//!  request ──cookie / Bearer──▶ Identified ──is_valid_at(now)──▶ handler
//!                                   └─ otherwise 401
//! ```
//!
//! Expiry is decided by [`Session::is_valid_at`] against an injected
//! [`Clock`]; expired sessions are removed by [`Authority::collect_expired`],
//! which [`Authority::spawn_reaper`] runs periodically.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod authority;
mod clock;
mod config;
mod guard;
mod session;
mod verifier;

pub use authority::{Authority, Rejection, CREDENTIAL_PARAM, IDENTITY_PARAM};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthorityConfig, DEFAULT_COOKIE_NAME, DEFAULT_TIMEOUT_SECS};
pub use guard::{Authorized, Identified};
pub use session::{Realm, Session, LATEST_EXPIRY};
pub use verifier::CredentialVerifier;
