//! The SQLite-backed fact store.
//!
//! Facts live in three tables. `topics` maps a topic digest to its address
//! parts so a predicate can be enumerated; `facts` holds the value bytes
//! keyed by topic; `routes` indexes each name a key articulates to the
//! predicates it appears under. Every write runs inside an explicit
//! transaction.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use agora_core::AgoraResult;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::address::{articulate, Address};
use crate::error::{MetabaseError, MetabaseResult};

/// Busy timeout applied when none is given.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS topics (
    topic     TEXT PRIMARY KEY,
    domain    TEXT NOT NULL,
    predicate TEXT NOT NULL,
    key       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS topics_by_predicate ON topics (domain, predicate, key);
CREATE TABLE IF NOT EXISTS routes (
    domain    TEXT NOT NULL,
    name      TEXT NOT NULL,
    predicate TEXT NOT NULL,
    PRIMARY KEY (domain, name, predicate)
);
CREATE TABLE IF NOT EXISTS facts (
    topic TEXT PRIMARY KEY REFERENCES topics (topic),
    value BLOB NOT NULL
);
";

/// Outcome of a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Written {
    /// No value was stored before.
    Inserted,
    /// A value was replaced.
    Updated {
        /// The replaced value.
        previous: Vec<u8>,
    },
}

impl Written {
    /// Returns `"inserted"` or `"updated"`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated { .. } => "updated",
        }
    }
}

/// Statements against the store, scoped to a connection or transaction.
#[derive(Debug)]
pub struct Facts<'a> {
    conn: &'a Connection,
}

impl Facts<'_> {
    /// Reads the value at `address`.
    pub fn select(&self, address: &Address) -> MetabaseResult<Option<Vec<u8>>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM facts WHERE topic = ?1",
                params![address.topic()],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Stores a new value, failing if one exists.
    ///
    /// A topic seen for the first time also routes each of the key's
    /// [names](Address::names) to the predicate.
    pub fn insert(&self, address: &Address, value: &[u8]) -> MetabaseResult<()> {
        if self.select(address)?.is_some() {
            return Err(MetabaseError::AlreadyExists {
                address: address.to_string(),
            });
        }
        let topic = address.topic();
        let created = self.conn.execute(
            "INSERT INTO topics (topic, domain, predicate, key) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (topic) DO NOTHING",
            params![topic, address.domain(), address.predicate(), address.key()],
        )?;
        if created > 0 {
            let mut route = self.conn.prepare_cached(
                "INSERT INTO routes (domain, name, predicate) VALUES (?1, ?2, ?3)
                 ON CONFLICT DO NOTHING",
            )?;
            for name in address.names() {
                route.execute(params![address.domain(), name, address.predicate()])?;
            }
        }
        self.conn.execute(
            "INSERT INTO facts (topic, value) VALUES (?1, ?2)",
            params![topic, value],
        )?;
        Ok(())
    }

    /// Replaces an existing value, failing if none exists.
    pub fn update(&self, address: &Address, value: &[u8]) -> MetabaseResult<()> {
        let changed = self.conn.execute(
            "UPDATE facts SET value = ?2 WHERE topic = ?1",
            params![address.topic(), value],
        )?;
        if changed == 0 {
            return Err(MetabaseError::NotFound {
                address: address.to_string(),
            });
        }
        Ok(())
    }

    /// Collects every fact under `domain`/`predicate` into a record keyed by
    /// fact key, in key order. Returns `null` when there are none.
    ///
    /// Values that are not JSON are surfaced as strings.
    pub fn produce(&self, domain: &str, predicate: &str) -> MetabaseResult<Value> {
        let mut statement = self.conn.prepare_cached(
            "SELECT t.key, f.value FROM topics t JOIN facts f ON f.topic = t.topic
             WHERE t.domain = ?1 AND t.predicate = ?2 ORDER BY t.key",
        )?;
        let rows = statement.query_map(params![domain, predicate], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        let mut record = Map::new();
        for row in rows {
            let (key, bytes) = row?;
            record.insert(key, decode_value(&bytes));
        }
        if record.is_empty() {
            return Ok(Value::Null);
        }
        Ok(Value::Object(record))
    }

    /// Lists the predicates with at least one fact under `domain`.
    pub fn predicates(&self, domain: &str) -> MetabaseResult<Vec<String>> {
        let mut statement = self.conn.prepare_cached(
            "SELECT DISTINCT t.predicate FROM topics t JOIN facts f ON f.topic = t.topic
             WHERE t.domain = ?1 ORDER BY t.predicate",
        )?;
        let predicates = statement
            .query_map(params![domain], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(predicates)
    }

    /// Walks the name index of `domain` from `name`.
    ///
    /// Each name `name` articulates is looked up, and the result maps every
    /// predicate reached to the names that route to it, in name order.
    /// Returns an empty record when nothing is indexed.
    pub fn walk(&self, domain: &str, name: &str) -> MetabaseResult<Value> {
        let mut statement = self.conn.prepare_cached(
            "SELECT predicate FROM routes WHERE domain = ?1 AND name = ?2 ORDER BY predicate",
        )?;
        let mut names = articulate(name);
        names.sort_unstable();
        names.dedup();

        let mut routes: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for name in names {
            let predicates = statement
                .query_map(params![domain, name], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            for predicate in predicates {
                routes
                    .entry(predicate)
                    .or_default()
                    .push(Value::String(name.to_string()));
            }
        }
        Ok(Value::Object(
            routes
                .into_iter()
                .map(|(predicate, names)| (predicate, Value::Array(names)))
                .collect(),
        ))
    }
}

/// Decodes stored bytes as JSON, falling back to a string.
#[must_use]
pub fn decode_value(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// A fact store on one SQLite connection.
///
/// # Example
///
/// ```rust
/// use agora_metabase::{Address, Metabase, Written};
/// use serde_json::json;
///
/// let store = Metabase::open_in_memory().unwrap();
/// let alice = Address::new("people", "knows", "alice").unwrap();
///
/// assert_eq!(store.write(&alice, br#""bob""#).unwrap(), Written::Inserted);
/// assert_eq!(store.produce("people", "knows").unwrap(), json!({"alice": "bob"}));
/// assert!(store.insert(&alice, b"1").unwrap_err().is_already_exists());
/// ```
#[derive(Debug)]
pub struct Metabase {
    conn: Mutex<Connection>,
}

impl Metabase {
    /// Opens (creating if needed) the store at `path`.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> MetabaseResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        let store = Self::from_connection(conn, busy_timeout)?;
        info!(path = %path.display(), "fact store opened");
        Ok(store)
    }

    /// Opens a private in-memory store.
    pub fn open_in_memory() -> MetabaseResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, DEFAULT_BUSY_TIMEOUT)
    }

    fn from_connection(conn: Connection, busy_timeout: Duration) -> MetabaseResult<Self> {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Point lookup.
    pub fn select(&self, address: &Address) -> MetabaseResult<Option<Vec<u8>>> {
        self.read(|facts| facts.select(address))
    }

    /// Stores a new value in its own transaction. Fails with
    /// [`MetabaseError::AlreadyExists`] if one is present.
    pub fn insert(&self, address: &Address, value: &[u8]) -> MetabaseResult<()> {
        self.transact(|facts| facts.insert(address, value))
    }

    /// Replaces a value in its own transaction. Fails with
    /// [`MetabaseError::NotFound`] if none is present.
    pub fn update(&self, address: &Address, value: &[u8]) -> MetabaseResult<()> {
        self.transact(|facts| facts.update(address, value))
    }

    /// See [`Facts::produce`].
    pub fn produce(&self, domain: &str, predicate: &str) -> MetabaseResult<Value> {
        self.read(|facts| facts.produce(domain, predicate))
    }

    /// See [`Facts::predicates`].
    pub fn predicates(&self, domain: &str) -> MetabaseResult<Vec<String>> {
        self.read(|facts| facts.predicates(domain))
    }

    /// See [`Facts::walk`].
    pub fn walk(&self, domain: &str, name: &str) -> MetabaseResult<Value> {
        self.read(|facts| facts.walk(domain, name))
    }

    /// Inserts or updates the value at `address` in one transaction.
    pub fn write(&self, address: &Address, value: &[u8]) -> MetabaseResult<Written> {
        self.write_with(address, value, |_, _| Ok(()))
    }

    /// Like [`write`](Self::write), running `hook` between the read of the
    /// previous value and the write. A hook error rolls the write back.
    pub fn write_with<F>(&self, address: &Address, value: &[u8], hook: F) -> MetabaseResult<Written>
    where
        F: FnOnce(&Facts<'_>, Option<&[u8]>) -> AgoraResult<()>,
    {
        let written = self.transact(|facts| {
            let previous = facts.select(address)?;
            hook(facts, previous.as_deref()).map_err(MetabaseError::Rejected)?;
            match previous {
                Some(previous) => {
                    facts.update(address, value)?;
                    Ok(Written::Updated { previous })
                }
                None => {
                    facts.insert(address, value)?;
                    Ok(Written::Inserted)
                }
            }
        })?;
        debug!(%address, outcome = written.as_str(), bytes = value.len(), "fact written");
        agora_telemetry::record_metabase_write(written.as_str());
        Ok(written)
    }

    /// Runs `f` in one transaction, committing on `Ok` and rolling back on
    /// `Err`.
    pub fn transact<T, F>(&self, f: F) -> MetabaseResult<T>
    where
        F: FnOnce(&Facts<'_>) -> MetabaseResult<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        match f(&Facts { conn: &tx }) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if matches!(err, MetabaseError::Sqlite(_)) {
                    error!(error = %err, "fact store transaction rolled back");
                } else {
                    debug!(error = %err, "fact store transaction rolled back");
                }
                agora_telemetry::record_metabase_write("rolled_back");
                if let Err(rollback) = tx.rollback() {
                    error!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Facts<'_>) -> MetabaseResult<T>) -> MetabaseResult<T> {
        let conn = self.conn.lock();
        f(&Facts { conn: &conn })
    }
}
