//! Sessions and the cookie realm.

use std::net::IpAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;

/// An authenticated session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Opaque token handed to the client.
    pub token: String,
    /// Identity the session was established for.
    pub identity: String,
    /// Rights granted at identification.
    pub rights: Value,
    /// Address the session is bound to, if known.
    pub client_addr: Option<IpAddr>,
    /// Issue time, unix seconds.
    pub issued_at: i64,
    /// Expiry time, unix seconds. Always greater than `issued_at`.
    pub expires_at: i64,
}

impl Session {
    /// Returns true while `now` is before the expiry time.
    ///
    /// ```
    /// use agora_authority::Session;
    /// use serde_json::Value;
    ///
    /// let session = Session {
    ///     token: "t".into(),
    ///     identity: "alice".into(),
    ///     rights: Value::Null,
    ///     client_addr: None,
    ///     issued_at: 100,
    ///     expires_at: 700,
    /// };
    /// assert!(session.is_valid_at(699));
    /// assert!(!session.is_valid_at(700));
    /// ```
    #[must_use]
    pub const fn is_valid_at(&self, now: i64) -> bool {
        now < self.expires_at
    }

    /// Returns true if an exchange from `addr` may use this session.
    ///
    /// Unbound sessions and exchanges without an address always pass.
    #[must_use]
    pub fn admits(&self, addr: Option<IpAddr>) -> bool {
        match (self.client_addr, addr) {
            (Some(bound), Some(addr)) => bound == addr,
            _ => true,
        }
    }
}

/// Generates a fresh session token.
pub(crate) fn new_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Cookie scope: domain and path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Realm {
    domain: Option<String>,
    path: String,
}

impl Default for Realm {
    fn default() -> Self {
        Self {
            domain: None,
            path: "/".to_string(),
        }
    }
}

impl Realm {
    /// Creates a realm for `domain` and `path`.
    pub fn new(domain: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            path: path.into(),
        }
    }

    /// Creates a realm without a domain attribute.
    pub fn for_path(path: impl Into<String>) -> Self {
        Self {
            domain: None,
            path: path.into(),
        }
    }

    /// Returns the cookie domain.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Returns the cookie path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Formats a `Set-Cookie` value delivering `token` until `expires_at`.
    ///
    /// ```
    /// use agora_authority::Realm;
    ///
    /// let realm = Realm::new("example.org", "/");
    /// assert_eq!(
    ///     realm.cookie("IRTD2", "abc", 0),
    ///     "IRTD2=abc; Path=/; Domain=example.org; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly"
    /// );
    /// ```
    #[must_use]
    pub fn cookie(&self, name: &str, token: &str, expires_at: i64) -> String {
        let mut cookie = format!("{name}={token}; Path={}", self.path);
        if let Some(domain) = &self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        cookie.push_str("; Expires=");
        cookie.push_str(&httpdate::fmt_http_date(unix_time(expires_at)));
        cookie.push_str("; HttpOnly");
        cookie
    }

    /// Formats a `Set-Cookie` value that clears the cookie.
    #[must_use]
    pub fn expired_cookie(&self, name: &str) -> String {
        self.cookie(name, "", 0)
    }
}

/// Last second an HTTP date can express (9999-12-31T23:59:59Z).
pub const LATEST_EXPIRY: i64 = 253_402_300_799;

fn unix_time(secs: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(u64::try_from(secs.min(LATEST_EXPIRY)).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn session(addr: Option<IpAddr>) -> Session {
        Session {
            token: new_token(),
            identity: "alice".to_string(),
            rights: Value::Null,
            client_addr: addr,
            issued_at: 1_000,
            expires_at: 1_600,
        }
    }

    #[test]
    fn test_cookie_expiry_is_clamped() {
        let realm = Realm::new("example.org", "/");
        let cookie = realm.cookie("IRTD2", "abc", i64::MAX);
        assert!(cookie.contains("Expires=Fri, 31 Dec 9999 23:59:59 GMT"));
        assert_eq!(cookie, realm.cookie("IRTD2", "abc", LATEST_EXPIRY));
    }

    #[test]
    fn test_expiry_boundary() {
        let s = session(None);
        assert!(s.is_valid_at(1_000));
        assert!(s.is_valid_at(1_599));
        assert!(!s.is_valid_at(1_600));
        assert!(!s.is_valid_at(5_000));
    }

    #[test]
    fn test_address_scope() {
        let home = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let away = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        assert!(session(Some(home)).admits(Some(home)));
        assert!(!session(Some(home)).admits(Some(away)));
        assert!(session(Some(home)).admits(None));
        assert!(session(None).admits(Some(away)));
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(new_token(), new_token());
        assert_eq!(new_token().len(), 32);
    }

    #[test]
    fn test_cookie_without_domain() {
        let realm = Realm::for_path("/app");
        let cookie = realm.cookie("IRTD2", "tok", 784_111_777);
        assert_eq!(
            cookie,
            "IRTD2=tok; Path=/app; Expires=Sun, 06 Nov 1994 08:49:37 GMT; HttpOnly"
        );
    }

    #[test]
    fn test_expired_cookie() {
        let cookie = Realm::default().expired_cookie("IRTD2");
        assert!(cookie.starts_with("IRTD2=; Path=/"));
        assert!(cookie.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
    }
}
