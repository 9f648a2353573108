//! Fact addresses and their topic digests.

use std::fmt;

use sha1::{Digest, Sha1};

use crate::error::{MetabaseError, MetabaseResult};

/// A fact address: domain, predicate and key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    domain: String,
    predicate: String,
    key: String,
}

impl Address {
    /// Creates an address, rejecting empty components.
    ///
    /// ```
    /// use agora_metabase::Address;
    ///
    /// let address = Address::new("people", "knows", "alice").unwrap();
    /// assert_eq!(address.to_string(), "people/knows/alice");
    /// assert!(Address::new("people", "", "alice").is_err());
    /// ```
    pub fn new(
        domain: impl Into<String>,
        predicate: impl Into<String>,
        key: impl Into<String>,
    ) -> MetabaseResult<Self> {
        let address = Self {
            domain: domain.into(),
            predicate: predicate.into(),
            key: key.into(),
        };
        for (name, value) in [
            ("domain", &address.domain),
            ("predicate", &address.predicate),
            ("key", &address.key),
        ] {
            if value.is_empty() {
                return Err(MetabaseError::InvalidAddress(format!("empty {name}")));
            }
        }
        Ok(address)
    }

    /// Returns the domain.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the predicate.
    #[must_use]
    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    /// Returns the key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the topic: the hex SHA-1 of the netstring-encoded address.
    ///
    /// ```
    /// use agora_metabase::Address;
    ///
    /// let topic = Address::new("people", "knows", "alice").unwrap().topic();
    /// assert_eq!(topic.len(), 40);
    /// ```
    #[must_use]
    pub fn topic(&self) -> String {
        let mut hasher = Sha1::new();
        hasher.update(netstrings(&[&self.domain, &self.predicate, &self.key]));
        format!("{:x}", hasher.finalize())
    }

    /// Returns the names the key articulates, indexed when the fact is
    /// first stored.
    ///
    /// ```
    /// use agora_metabase::Address;
    ///
    /// let pair = Address::new("people", "met", "5:alice,3:bob,").unwrap();
    /// assert_eq!(pair.names(), ["alice", "bob"]);
    /// let single = Address::new("people", "knows", "alice").unwrap();
    /// assert_eq!(single.names(), ["alice"]);
    /// ```
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        articulate(&self.key)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.domain, self.predicate, self.key)
    }
}

/// Encodes each item as a netstring (`<len>:<bytes>,`) and concatenates.
pub(crate) fn netstrings(items: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    for item in items {
        out.extend_from_slice(item.len().to_string().as_bytes());
        out.push(b':');
        out.extend_from_slice(item.as_bytes());
        out.push(b',');
    }
    out
}

/// Splits `text` into its netstring items, skipping empty ones.
///
/// Text that is not a complete netstring sequence is one name.
#[must_use]
pub fn articulate(text: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let Some(item) = next_netstring(rest) else {
            return vec![text];
        };
        if !item.0.is_empty() {
            names.push(item.0);
        }
        rest = item.1;
    }
    if names.is_empty() {
        return vec![text];
    }
    names
}

/// Returns the first netstring of `text` and what follows it.
fn next_netstring(text: &str) -> Option<(&str, &str)> {
    let (len, rest) = text.split_once(':')?;
    if len.is_empty() || !len.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let len: usize = len.parse().ok()?;
    let item = rest.get(..len)?;
    let rest = rest.get(len..)?.strip_prefix(',')?;
    Some((item, rest))
}
