//! The service binder.
//!
//! A [`Service`] binds a function to an optional input schema and runs the
//! two-phase lifecycle for it:
//!
//! ```text
//! GET  ?query ──decode──▶ validate ──▶ Ready ──▶ invoke
//! GET  (bare) ──────────▶ 200 pretty-printed example, no invocation
//! POST ──────▶ Collect{limit} ··· body ──decode──▶ validate ──▶ merge ──▶ Ready ──▶ invoke
//! other ─────▶ 501
//! ```
//!
//! Malformed or non-conforming input is answered with a 400 envelope and
//! never reaches the function.

use std::fmt;
use std::sync::Arc;

use agora_core::{AgoraError, AgoraResult, Exchange, Handler, Phase, Step};
use agora_schema::{Descriptor, SchemaResult};
use http::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::query::{decode_query, merge_body};

type ServiceFn = dyn Fn(&mut Exchange) -> AgoraResult<()> + Send + Sync;

/// Default body limit for services (16 KiB).
pub const DEFAULT_SERVICE_BODY_LIMIT: usize = 16 * 1024;

/// A function bound to an input schema.
///
/// # Example
///
/// ```rust
/// use agora_core::{Exchange, Handler, Step};
/// use agora_server::Service;
/// use http::Method;
/// use serde_json::json;
///
/// let greet = Service::returning(|exchange: &Exchange| {
///     Ok(json!(format!("hello {}", exchange.param_str("name").unwrap_or("?"))))
/// })
/// .with_schema(json!({"name": "[a-z]+"}))
/// .unwrap();
///
/// let mut exchange = Exchange::new(Method::GET, "/greet?name=ada");
/// assert_eq!(greet.request(&mut exchange).unwrap(), Step::Done);
/// assert_eq!(exchange.response().unwrap().json().unwrap(), json!("hello ada"));
///
/// let mut exchange = Exchange::new(Method::GET, "/greet?name=ADA");
/// let err = greet.request(&mut exchange).unwrap_err();
/// assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
/// ```
#[derive(Clone)]
pub struct Service {
    name: Option<String>,
    schema: Option<Arc<Descriptor>>,
    example: Option<Value>,
    get: bool,
    post: bool,
    body_limit: Option<usize>,
    func: Arc<ServiceFn>,
}

impl Service {
    /// Binds a function that writes its own response.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&mut Exchange) -> AgoraResult<()> + Send + Sync + 'static,
    {
        Self {
            name: None,
            schema: None,
            example: None,
            get: true,
            post: true,
            body_limit: Some(DEFAULT_SERVICE_BODY_LIMIT),
            func: Arc::new(func),
        }
    }

    /// Binds a function producing a JSON value, written as a 200 response.
    pub fn returning<F>(func: F) -> Self
    where
        F: Fn(&Exchange) -> AgoraResult<Value> + Send + Sync + 'static,
    {
        Self::new(move |exchange: &mut Exchange| {
            let value = func(exchange)?;
            exchange.reply_json(StatusCode::OK, &value)
        })
    }

    /// Sets a name used in logs.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Compiles `template` into the input schema.
    ///
    /// A `null` template declares no schema. The template also becomes the
    /// bare-GET example unless one was set explicitly.
    pub fn with_schema(mut self, template: Value) -> SchemaResult<Self> {
        if template.is_null() {
            self.schema = None;
            return Ok(self);
        }
        self.schema = Some(Arc::new(Descriptor::compile(&template)?));
        if self.example.is_none() {
            self.example = Some(template);
        }
        Ok(self)
    }

    /// Uses a precompiled descriptor as the input schema.
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: Arc<Descriptor>) -> Self {
        self.schema = Some(descriptor);
        self
    }

    /// Sets the payload answered to a bare GET.
    #[must_use]
    pub fn with_example(mut self, example: Value) -> Self {
        self.example = Some(example);
        self
    }

    /// Accepts GET only.
    #[must_use]
    pub fn get_only(mut self) -> Self {
        self.get = true;
        self.post = false;
        self
    }

    /// Accepts POST only.
    #[must_use]
    pub fn post_only(mut self) -> Self {
        self.get = false;
        self.post = true;
        self
    }

    /// Sets the body limit for POST collection (`None` defers to the
    /// dispatcher's cap).
    #[must_use]
    pub fn with_body_limit(mut self, limit: Option<usize>) -> Self {
        self.body_limit = limit;
        self
    }

    /// Returns the compiled schema, if any.
    #[must_use]
    pub fn schema(&self) -> Option<&Descriptor> {
        self.schema.as_deref()
    }

    /// Returns the bare-GET example, if any.
    #[must_use]
    pub fn example(&self) -> Option<&Value> {
        self.example.as_ref()
    }

    /// Returns the POST body limit.
    #[must_use]
    pub fn body_limit(&self) -> Option<usize> {
        self.body_limit
    }

    /// Returns true if `method` is served.
    #[must_use]
    pub fn accepts(&self, method: &Method) -> bool {
        (*method == Method::GET && self.get) || (*method == Method::POST && self.post)
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("service")
    }

    fn check(&self, value: &Value, exchange: &Exchange) -> AgoraResult<()> {
        let Some(schema) = &self.schema else {
            return Ok(());
        };
        schema.validate(value).map_err(|err| {
            warn!(
                exchange_id = %exchange.id(),
                service = self.label(),
                field = %err.field,
                reason = %err.reason,
                "input rejected by schema"
            );
            agora_telemetry::record_schema_rejection(self.label());
            AgoraError::from(err)
        })
    }

    fn invoke(&self, exchange: &mut Exchange) -> AgoraResult<()> {
        exchange.enter(Phase::Ready)?;
        debug!(exchange_id = %exchange.id(), service = self.label(), "invoking service");
        (self.func)(exchange)
    }
}

impl Handler for Service {
    fn request(&self, exchange: &mut Exchange) -> AgoraResult<Step> {
        let method = exchange.method().clone();
        if !self.accepts(&method) {
            return Err(AgoraError::not_implemented(&method));
        }

        if method == Method::POST {
            return Ok(Step::Collect {
                limit: self.body_limit,
            });
        }

        match exchange.query() {
            Some(query) => {
                let decoded = decode_query(query)?;
                self.check(&Value::Object(decoded.clone()), exchange)?;
                exchange.params_mut().extend(decoded);
                self.invoke(exchange)?;
            }
            None => match &self.example {
                Some(example) => exchange.reply_pretty_json(StatusCode::OK, example)?,
                None => self.invoke(exchange)?,
            },
        }
        Ok(Step::Done)
    }

    fn body(&self, exchange: &mut Exchange) -> AgoraResult<()> {
        let bytes = exchange.body().cloned().unwrap_or_default();
        let decoded: Value = serde_json::from_slice(&bytes).map_err(|e| {
            warn!(exchange_id = %exchange.id(), service = self.label(), error = %e, "undecodable body");
            AgoraError::from(e)
        })?;
        self.check(&decoded, exchange)?;
        merge_body(exchange.params_mut(), decoded);
        self.invoke(exchange)
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("has_schema", &self.schema.is_some())
            .field("example", &self.example)
            .field("get", &self.get)
            .field("post", &self.post)
            .field("body_limit", &self.body_limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(calls: &Arc<AtomicUsize>) -> Service {
        let calls = Arc::clone(calls);
        Service::returning(move |exchange: &Exchange| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Object(exchange.params().clone()))
        })
    }

    fn post(body: &'static str) -> Exchange {
        let mut exchange = Exchange::new(Method::POST, "/svc");
        exchange.enter(Phase::AwaitingBody).unwrap();
        exchange.set_body(Bytes::from_static(body.as_bytes()));
        exchange
    }

    #[test]
    fn test_bare_get_returns_example_without_invoking() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = counting(&calls)
            .with_schema(json!({"name": ""}))
            .unwrap();

        let mut exchange = Exchange::new(Method::GET, "/svc");
        service.request(&mut exchange).unwrap();

        let response = exchange.response().unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json().unwrap(), json!({"name": ""}));
        assert!(std::str::from_utf8(&response.body).unwrap().contains('\n'));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_bare_get_without_example_invokes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = counting(&calls);
        let mut exchange = Exchange::new(Method::GET, "/svc");
        service.request(&mut exchange).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(exchange.phase(), Phase::Ready);
    }

    #[test]
    fn test_explicit_example_wins_over_template() {
        let service = Service::returning(|_: &Exchange| Ok(Value::Null))
            .with_example(json!({"name": "Ada"}))
            .with_schema(json!({"name": ""}))
            .unwrap();
        assert_eq!(service.example(), Some(&json!({"name": "Ada"})));
    }

    #[test]
    fn test_get_query_is_validated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = counting(&calls)
            .with_schema(json!({"name": "", "age": 0}))
            .unwrap();

        // Query values are strings, so an integer field never validates.
        let mut exchange = Exchange::new(Method::GET, "/svc?name=a&age=3");
        let err = service.request(&mut exchange).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!exchange.is_responded());
    }

    #[test]
    fn test_get_query_populates_bag() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = counting(&calls).with_schema(json!({"tag": [""]})).unwrap();
        let mut exchange = Exchange::new(Method::GET, "/svc?tag=a&tag=b");
        service.request(&mut exchange).unwrap();
        assert_eq!(
            exchange.response().unwrap().json().unwrap(),
            json!({"tag": ["a", "b"]})
        );
    }

    #[test]
    fn test_post_asks_for_body() {
        let service = counting(&Arc::new(AtomicUsize::new(0))).with_body_limit(Some(32));
        let mut exchange = Exchange::new(Method::POST, "/svc");
        assert_eq!(
            service.request(&mut exchange).unwrap(),
            Step::Collect { limit: Some(32) }
        );
    }

    #[test]
    fn test_post_body_merges_record() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = counting(&calls);
        let mut exchange = post(r#"{"name": "new"}"#);
        exchange.params_mut().insert("name".into(), json!("old"));
        exchange.params_mut().insert("keep".into(), json!(1));
        service.body(&mut exchange).unwrap();
        assert_eq!(
            exchange.response().unwrap().json().unwrap(),
            json!({"name": "new", "keep": 1})
        );
    }

    #[test]
    fn test_post_scalar_body_goes_to_arg0() {
        let service = counting(&Arc::new(AtomicUsize::new(0)));
        let mut exchange = post(r#""bob""#);
        service.body(&mut exchange).unwrap();
        assert_eq!(exchange.param("arg0"), Some(&json!("bob")));
    }

    #[test]
    fn test_post_invalid_body_never_invokes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = counting(&calls).with_schema(json!({"age": 0})).unwrap();

        let mut exchange = post(r#"{"age": "old"}"#);
        let err = service.body(&mut exchange).unwrap_err();
        assert_eq!(err.to_envelope(None).error.details.unwrap()["field"], "$.age");

        let mut exchange = post("{not json");
        assert_eq!(
            service.body(&mut exchange).unwrap_err().status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unregistered_method_is_not_implemented() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = counting(&calls).get_only();

        let mut exchange = Exchange::new(Method::POST, "/svc");
        let err = service.request(&mut exchange).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_IMPLEMENTED);

        let mut exchange = Exchange::new(Method::DELETE, "/svc");
        assert!(service.request(&mut exchange).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_null_template_means_no_schema() {
        let service = Service::returning(|_: &Exchange| Ok(Value::Null))
            .with_schema(Value::Null)
            .unwrap();
        assert!(service.schema().is_none());
        assert!(service.example().is_none());
    }
}
