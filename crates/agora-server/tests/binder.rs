//! Service binder behaviour driven through the dispatcher.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use agora_core::{Exchange, Phase};
use agora_server::{Dispatch, Dispatcher, Routes, Service};
use bytes::Bytes;
use http::{Method, StatusCode};
use serde_json::{json, Value};

fn profile_service(calls: &Arc<AtomicUsize>) -> Service {
    let calls = Arc::clone(calls);
    Service::returning(move |exchange: &Exchange| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({
            "saved": exchange.param("name").cloned().unwrap_or(Value::Null),
        }))
    })
    .named("profile")
    .with_schema(json!({"name": "[A-Za-z ]+", "age?": 0, "tags": [""]}))
    .unwrap()
}

fn dispatcher(calls: &Arc<AtomicUsize>) -> Dispatcher {
    let mut routes = Routes::new();
    routes
        .register_methods(
            &[Method::GET, Method::POST, Method::PUT],
            "*",
            "/profile",
            Arc::new(profile_service(calls)),
        )
        .unwrap();
    Dispatcher::new(routes)
}

fn post(dispatcher: &Dispatcher, body: &'static str) -> Exchange {
    let mut exchange = Exchange::new(Method::POST, "/profile");
    dispatcher.dispatch_with_body(&mut exchange, Bytes::from_static(body.as_bytes()));
    exchange
}

#[test]
fn bare_get_returns_example_and_never_invokes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = dispatcher(&calls);

    let mut exchange = Exchange::new(Method::GET, "/profile");
    assert!(matches!(dispatcher.dispatch(&mut exchange), Dispatch::Complete));

    let response = exchange.response().unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json().unwrap(),
        json!({"name": "[A-Za-z ]+", "age?": 0, "tags": [""]})
    );
    assert_eq!(response.headers["cache-control"], "no-cache");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn valid_post_invokes_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = dispatcher(&calls);

    let exchange = post(&dispatcher, r#"{"name": "Ada Lovelace", "tags": ["math"]}"#);
    let response = exchange.response().unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json().unwrap(), json!({"saved": "Ada Lovelace"}));
    assert_eq!(exchange.phase(), Phase::Ready);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn invalid_post_never_reaches_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = dispatcher(&calls);

    for (body, field) in [
        (r#"{"tags": []}"#, Some("$.name")),
        (r#"{"name": "Ada", "tags": [1]}"#, Some("$.tags[0]")),
        (r#"{"name": "Ada 2", "tags": []}"#, Some("$.name")),
        (r#"{"name": "Ada", "tags": [], "age": 1.5}"#, Some("$.age")),
        (r#""just a string""#, Some("$")),
        ("{broken", None),
    ] {
        let exchange = post(&dispatcher, body);
        let response = exchange.response().unwrap();
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "body {body}");
        let envelope = response.json().unwrap();
        assert_eq!(envelope["error"]["code"], "VALIDATION_ERROR");
        if let Some(field) = field {
            assert_eq!(envelope["error"]["details"]["field"], field, "body {body}");
        }
    }

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn unsupported_method_is_501() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = dispatcher(&calls);

    let mut exchange = Exchange::new(Method::PUT, "/profile");
    let _ = dispatcher.dispatch(&mut exchange);
    assert_eq!(
        exchange.response().unwrap().status,
        StatusCode::NOT_IMPLEMENTED
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn body_over_service_limit_is_413() {
    let calls = Arc::new(AtomicUsize::new(0));
    let service = profile_service(&calls).with_body_limit(Some(16));
    let mut routes = Routes::new();
    routes.route(Method::POST, "/small", Arc::new(service)).unwrap();
    let dispatcher = Dispatcher::new(routes);

    let mut exchange = Exchange::new(Method::POST, "/small");
    dispatcher.dispatch_with_body(
        &mut exchange,
        Bytes::from_static(br#"{"name": "a rather long name", "tags": []}"#),
    );
    assert_eq!(
        exchange.response().unwrap().status,
        StatusCode::PAYLOAD_TOO_LARGE
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn bare_query_name_is_null() {
    let service = Service::returning(|exchange: &Exchange| {
        Ok(json!({"verbose": exchange.param("verbose").cloned()}))
    })
    .with_schema(json!({"q": "", "verbose?": ""}))
    .unwrap();
    let mut routes = Routes::new();
    routes.route(Method::GET, "/search", Arc::new(service)).unwrap();
    let dispatcher = Dispatcher::new(routes);

    let mut exchange = Exchange::new(Method::GET, "/search?q=rust&verbose");
    let _ = dispatcher.dispatch(&mut exchange);
    let response = exchange.response().unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json().unwrap(), json!({"verbose": null}));

    let mut exchange = Exchange::new(Method::GET, "/search?q");
    let _ = dispatcher.dispatch(&mut exchange);
    let response = exchange.response().unwrap();
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json().unwrap()["error"]["code"], "VALIDATION_ERROR");
}
