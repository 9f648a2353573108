//! Path-addressed HTTP access to a [`Metabase`].
//!
//! Mounted under a prefix, the service answers:
//!
//! ```text
//! GET  <mount>/<domain>                        predicates with facts
//! GET  <mount>/<domain>?name=<name>            {predicate: [names]} walk
//! GET  <mount>/<domain>/<predicate>            {key: value} record, or null
//! GET  <mount>/<domain>/<predicate>/<key>      the value as JSON
//! GET  <mount>/<domain>/<predicate>/<key>/value  the stored bytes
//! POST <mount>/<domain>/<predicate>/<key>      write a JSON value
//! POST <mount>/<domain>/<predicate>/<key>/value  write raw bytes
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use agora_core::{AgoraError, AgoraResult, BoxedHandler, Exchange, Handler, Phase, Step};
use agora_router::RouteError;
use agora_schema::{Descriptor, SchemaResult};
use agora_server::{decode_query, Routes, DEFAULT_SERVICE_BODY_LIMIT};
use http::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::address::Address;
use crate::store::{decode_value, Metabase, Written};

/// Default mount prefix.
pub const DEFAULT_MOUNT: &str = "/met";

/// Methods routed to the service; all but GET and POST answer 501.
pub const ROUTED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
];

const RAW_RESOURCE: &str = "value";
const WALK_PARAM: &str = "name";
const RAW_CONTENT_TYPE: &str = "application/octet-stream";

/// Who may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    /// Anyone.
    #[default]
    Open,
    /// The identity named like the domain, or an identity holding a right
    /// named like the predicate.
    Owner,
}

/// What a path addresses.
#[derive(Debug, PartialEq, Eq)]
enum Target {
    Domain(String),
    Predicate(String, String),
    Fact(Address),
    Raw(Address),
}

/// Serves a [`Metabase`] under a mount prefix.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use agora_metabase::{Metabase, MetabaseService};
/// use agora_server::{Dispatcher, Routes};
///
/// let store = Arc::new(Metabase::open_in_memory().unwrap());
/// let mut routes = Routes::new();
/// MetabaseService::new(Arc::clone(&store))
///     .register(&mut routes, "*")
///     .unwrap();
/// let dispatcher = Dispatcher::new(routes);
/// ```
#[derive(Clone)]
pub struct MetabaseService {
    store: Arc<Metabase>,
    mount: String,
    depth: usize,
    access: Access,
    schemas: HashMap<String, Arc<Descriptor>>,
    body_limit: usize,
}

impl MetabaseService {
    /// Serves `store` at [`DEFAULT_MOUNT`] with open access.
    #[must_use]
    pub fn new(store: Arc<Metabase>) -> Self {
        Self {
            store,
            mount: DEFAULT_MOUNT.to_string(),
            depth: 1,
            access: Access::Open,
            schemas: HashMap::new(),
            body_limit: DEFAULT_SERVICE_BODY_LIMIT,
        }
    }

    /// Sets the mount prefix, e.g. `/met`.
    #[must_use]
    pub fn with_mount(mut self, mount: impl Into<String>) -> Self {
        let mount = mount.into();
        self.depth = mount.split('/').filter(|s| !s.is_empty()).count();
        self.mount = mount.trim_end_matches('/').to_string();
        self
    }

    /// Sets the write access policy.
    #[must_use]
    pub const fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    /// Requires JSON writes to `predicate` to match `template`.
    ///
    /// # Errors
    ///
    /// Returns the template's compile error.
    pub fn with_schema(mut self, predicate: impl Into<String>, template: &Value) -> SchemaResult<Self> {
        let descriptor = Descriptor::compile(template)?;
        let predicate = predicate.into();
        if descriptor.is_any() {
            self.schemas.remove(&predicate);
        } else {
            self.schemas.insert(predicate, Arc::new(descriptor));
        }
        Ok(self)
    }

    /// Sets the largest accepted write body.
    #[must_use]
    pub const fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Returns the mount prefix.
    #[must_use]
    pub fn mount(&self) -> &str {
        &self.mount
    }

    /// Returns the store.
    #[must_use]
    pub const fn store(&self) -> &Arc<Metabase> {
        &self.store
    }

    /// Returns the route pattern covering everything under the mount.
    #[must_use]
    pub fn pattern(&self) -> String {
        format!("{}/*address", self.mount)
    }

    /// Registers the service under its mount for `host`, for each of
    /// [`ROUTED_METHODS`].
    ///
    /// # Errors
    ///
    /// Returns the route error if the mount is not a valid pattern.
    pub fn register(self, routes: &mut Routes, host: &str) -> Result<(), RouteError> {
        let pattern = self.pattern();
        let handler: BoxedHandler = Arc::new(self);
        routes.register_methods(&ROUTED_METHODS, host, &pattern, handler)?;
        Ok(())
    }

    fn target(&self, exchange: &Exchange) -> AgoraResult<Target> {
        let parts = exchange.segments().get(self.depth..).unwrap_or_default();
        let target = match parts {
            [domain] => Target::Domain(domain.clone()),
            [domain, predicate] => Target::Predicate(domain.clone(), predicate.clone()),
            [domain, predicate, key] => Target::Fact(Address::new(
                domain.as_str(),
                predicate.as_str(),
                key.as_str(),
            )?),
            [domain, predicate, key, resource] if resource == RAW_RESOURCE => Target::Raw(
                Address::new(domain.as_str(), predicate.as_str(), key.as_str())?,
            ),
            _ => return Err(AgoraError::not_found_resource(exchange.path())),
        };
        Ok(target)
    }

    fn check_access(&self, exchange: &Exchange, address: &Address) -> AgoraResult<()> {
        if self.access == Access::Open
            || exchange.identity() == Some(address.domain())
            || exchange.has_right(address.predicate())
        {
            return Ok(());
        }
        warn!(
            exchange_id = %exchange.id(),
            identity = exchange.identity().unwrap_or("-"),
            %address,
            "write refused"
        );
        agora_telemetry::record_auth_decision("forbidden");
        Err(AgoraError::authorization(
            format!("no right to write {address}"),
            Some(address.predicate()),
        ))
    }

    fn read(&self, exchange: &mut Exchange, target: Target) -> AgoraResult<()> {
        exchange.enter(Phase::Ready)?;
        match target {
            Target::Domain(domain) => match walk_name(exchange)? {
                Some(name) => {
                    let routes = self.store.walk(&domain, &name)?;
                    exchange.reply_json(StatusCode::OK, &routes)
                }
                None => {
                    let predicates = self.store.predicates(&domain)?;
                    exchange.reply_json(StatusCode::OK, &json!(predicates))
                }
            },
            Target::Predicate(domain, predicate) => {
                let record = self.store.produce(&domain, &predicate)?;
                exchange.reply_json(StatusCode::OK, &record)
            }
            Target::Fact(address) => {
                let bytes = self.fetch(&address)?;
                exchange.reply_json(StatusCode::OK, &decode_value(&bytes))
            }
            Target::Raw(address) => {
                let bytes = self.fetch(&address)?;
                exchange.reply(StatusCode::OK, RAW_CONTENT_TYPE, bytes)
            }
        }
    }

    fn fetch(&self, address: &Address) -> AgoraResult<Vec<u8>> {
        self.store
            .select(address)?
            .ok_or_else(|| AgoraError::not_found_resource(address.to_string()))
    }

    fn encode(&self, exchange: &Exchange, address: &Address, body: &[u8]) -> AgoraResult<Vec<u8>> {
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            warn!(exchange_id = %exchange.id(), %address, error = %e, "undecodable value");
            AgoraError::from(e)
        })?;
        if let Some(schema) = self.schemas.get(address.predicate()) {
            schema.validate(&value).map_err(|err| {
                warn!(
                    exchange_id = %exchange.id(),
                    %address,
                    field = %err.field,
                    reason = %err.reason,
                    "value rejected by schema"
                );
                agora_telemetry::record_schema_rejection(address.predicate());
                AgoraError::from(err)
            })?;
        }
        Ok(serde_json::to_vec(&value)?)
    }
}

/// Returns the name to walk from, if the query asks for one.
fn walk_name(exchange: &Exchange) -> AgoraResult<Option<String>> {
    let Some(query) = exchange.query() else {
        return Ok(None);
    };
    match decode_query(query)?.remove(WALK_PARAM) {
        None => Ok(None),
        Some(Value::String(name)) if !name.is_empty() => Ok(Some(name)),
        Some(_) => Err(AgoraError::Validation {
            message: "expected one non-empty name".to_string(),
            field: Some(format!("$.{WALK_PARAM}")),
        }),
    }
}

impl Handler for MetabaseService {
    fn request(&self, exchange: &mut Exchange) -> AgoraResult<Step> {
        let method = exchange.method().clone();
        if method == Method::GET {
            let target = self.target(exchange)?;
            self.read(exchange, target)?;
            return Ok(Step::Done);
        }
        if method != Method::POST {
            return Err(AgoraError::not_implemented(&method));
        }

        match self.target(exchange)? {
            Target::Fact(address) | Target::Raw(address) => {
                self.check_access(exchange, &address)?;
                debug!(exchange_id = %exchange.id(), %address, "collecting value");
                Ok(Step::Collect {
                    limit: Some(self.body_limit),
                })
            }
            Target::Domain(_) | Target::Predicate(..) => {
                Err(AgoraError::not_found_resource(exchange.path()))
            }
        }
    }

    fn body(&self, exchange: &mut Exchange) -> AgoraResult<()> {
        let body = exchange.body().cloned().unwrap_or_default();
        let (address, value) = match self.target(exchange)? {
            Target::Fact(address) => {
                let value = self.encode(exchange, &address, &body)?;
                (address, value)
            }
            Target::Raw(address) => (address, body.to_vec()),
            Target::Domain(_) | Target::Predicate(..) => {
                return Err(AgoraError::not_found_resource(exchange.path()));
            }
        };

        exchange.enter(Phase::Ready)?;
        let written = self.store.write(&address, &value)?;
        let previous = match &written {
            Written::Inserted => Value::Null,
            Written::Updated { previous } => decode_value(previous),
        };
        exchange.reply_json(
            StatusCode::OK,
            &json!({
                "address": address.to_string(),
                "written": written.as_str(),
                "previous": previous,
            }),
        )
    }
}

impl fmt::Debug for MetabaseService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetabaseService")
            .field("mount", &self.mount)
            .field("access", &self.access)
            .field("schemas", &self.schemas.keys().collect::<Vec<_>>())
            .field("body_limit", &self.body_limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> MetabaseService {
        MetabaseService::new(Arc::new(Metabase::open_in_memory().unwrap()))
    }

    #[test]
    fn test_targets() {
        let service = service().with_mount("/data/met/");
        assert_eq!(service.mount(), "/data/met");

        let exchange = Exchange::new(Method::GET, "/data/met/people");
        assert_eq!(
            service.target(&exchange).unwrap(),
            Target::Domain("people".into())
        );
        let exchange = Exchange::new(Method::GET, "/data/met/people/knows");
        assert_eq!(
            service.target(&exchange).unwrap(),
            Target::Predicate("people".into(), "knows".into())
        );
        let exchange = Exchange::new(Method::GET, "/data/met/people/knows/al%20ice/value");
        assert_eq!(
            service.target(&exchange).unwrap(),
            Target::Raw(Address::new("people", "knows", "al ice").unwrap())
        );

        for path in ["/data/met", "/data/met/a/b/c/other", "/data/met/a/b/c/value/x"] {
            let exchange = Exchange::new(Method::GET, path);
            assert_eq!(
                service.target(&exchange).unwrap_err().status_code(),
                StatusCode::NOT_FOUND,
                "{path}"
            );
        }
    }

    #[test]
    fn test_owner_access() {
        let service = service().with_access(Access::Owner);
        let alice = Address::new("alice", "notes", "1").unwrap();

        let mut exchange = Exchange::new(Method::POST, "/met/alice/notes/1");
        assert_eq!(
            service.check_access(&exchange, &alice).unwrap_err().status_code(),
            StatusCode::FORBIDDEN
        );

        exchange.set_identity("alice", Value::Null);
        assert!(service.check_access(&exchange, &alice).is_ok());

        exchange.set_identity("bob", json!(["notes"]));
        assert!(service.check_access(&exchange, &alice).is_ok());

        exchange.set_identity("bob", json!("tags"));
        assert!(service.check_access(&exchange, &alice).is_err());
    }

    #[test]
    fn test_null_template_removes_schema() {
        let service = service()
            .with_schema("age", &json!(0))
            .unwrap()
            .with_schema("age", &Value::Null)
            .unwrap();
        assert!(service.schemas.is_empty());
    }

    #[test]
    fn test_post_without_key_is_not_found() {
        let service = service();
        let mut exchange = Exchange::new(Method::POST, "/met/people/knows");
        assert_eq!(
            service.request(&mut exchange).unwrap_err().status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_other_methods_not_implemented() {
        let service = service();
        let mut exchange = Exchange::new(Method::DELETE, "/met/people/knows/alice");
        assert_eq!(
            service.request(&mut exchange).unwrap_err().status_code(),
            StatusCode::NOT_IMPLEMENTED
        );
    }
}
