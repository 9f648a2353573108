//! The fact store served over HTTP.

use std::sync::Arc;

use agora_metabase::{Access, Metabase, MetabaseService};
use agora_server::{Dispatcher, Routes};
use agora_test::TestClient;
use http::{Method, StatusCode};
use serde_json::{json, Value};

fn client_with(service: impl FnOnce(MetabaseService) -> MetabaseService) -> (Arc<Metabase>, TestClient) {
    let store = Arc::new(Metabase::open_in_memory().unwrap());
    let mut routes = Routes::new();
    service(MetabaseService::new(Arc::clone(&store)))
        .register(&mut routes, "*")
        .unwrap();
    (store, TestClient::new(Dispatcher::new(routes)))
}

fn client() -> (Arc<Metabase>, TestClient) {
    client_with(|service| service)
}

#[test]
fn test_post_then_produce() {
    let (store, client) = client();

    client
        .post("/met/people/knows/alice")
        .body(r#""bob""#)
        .send()
        .assert_status(StatusCode::OK)
        .assert_json_eq(&json!({
            "address": "people/knows/alice",
            "written": "inserted",
            "previous": null,
        }));

    assert_eq!(store.produce("people", "knows").unwrap(), json!({"alice": "bob"}));
    client
        .get("/met/people/knows")
        .send()
        .assert_json_eq(&json!({"alice": "bob"}));
}

#[test]
fn test_overwrite_reports_previous() {
    let (_, client) = client();
    client.post("/met/people/knows/alice").body(r#""bob""#).send();
    client
        .post("/met/people/knows/alice")
        .json(&json!({"name": "carol"}))
        .send()
        .assert_json_eq(&json!({
            "address": "people/knows/alice",
            "written": "updated",
            "previous": "bob",
        }));
    client
        .get("/met/people/knows/alice")
        .send()
        .assert_json_eq(&json!({"name": "carol"}));
}

#[test]
fn test_reads() {
    let (_, client) = client();
    client.get("/met/people/knows").send().assert_json_eq(&Value::Null);
    client
        .get("/met/people/knows/alice")
        .send()
        .assert_error(StatusCode::NOT_FOUND, "NOT_FOUND");

    client.post("/met/people/knows/alice/value").body("plain text").send();
    let raw = client.get("/met/people/knows/alice/value").send();
    raw.assert_status(StatusCode::OK)
        .assert_header("content-type", "application/octet-stream");
    assert_eq!(raw.text().unwrap(), "plain text");

    client
        .get("/met/people/knows/alice")
        .send()
        .assert_json_eq(&json!("plain text"));
    client.get("/met/people").send().assert_json_eq(&json!(["knows"]));
}

#[test]
fn test_domain_walk() {
    let (_, client) = client();
    client.post("/met/people/knows/alice").body(r#""bob""#).send();
    client.post("/met/people/met/5:alice,3:bob,").body("2024").send();

    client
        .get("/met/people")
        .query(&[("name", "alice")])
        .send()
        .assert_status(StatusCode::OK)
        .assert_json_eq(&json!({"knows": ["alice"], "met": ["alice"]}));
    client
        .get("/met/people")
        .query(&[("name", "3:bob,5:alice,")])
        .send()
        .assert_json_eq(&json!({"knows": ["alice"], "met": ["alice", "bob"]}));
    client
        .get("/met/places")
        .query(&[("name", "alice")])
        .send()
        .assert_json_eq(&json!({}));

    client.get("/met/people").send().assert_json_eq(&json!(["knows", "met"]));
    client
        .get("/met/people?name")
        .send()
        .assert_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR");
    client
        .get("/met/people?name=a&name=b")
        .send()
        .assert_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR");
}

#[test]
fn test_malformed_writes_are_rejected() {
    let (store, client) = client_with(|service| {
        service.with_schema("age", &json!(0)).unwrap()
    });

    client
        .post("/met/people/knows/alice")
        .body("{not json")
        .send()
        .assert_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR");
    client
        .post("/met/people/age/alice")
        .body(r#""old""#)
        .send()
        .assert_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR");
    client
        .post("/met/people/age/alice")
        .body("36")
        .send()
        .assert_status(StatusCode::OK);

    assert_eq!(store.predicates("people").unwrap(), vec!["age"]);
}

#[test]
fn test_routing_edges() {
    let (_, client) = client();
    client
        .post("/met/people/knows")
        .body("1")
        .send()
        .assert_error(StatusCode::NOT_FOUND, "NOT_FOUND");
    client
        .request(Method::DELETE, "/met/people/knows/alice")
        .send()
        .assert_error(StatusCode::NOT_IMPLEMENTED, "NOT_IMPLEMENTED");
    client
        .get("/met/people/knows/alice/history")
        .send()
        .assert_error(StatusCode::NOT_FOUND, "NOT_FOUND");
}

#[test]
fn test_body_limit() {
    let (_, client) = client_with(|service| service.with_body_limit(4));
    client
        .post("/met/people/knows/alice")
        .body(r#""bobby""#)
        .send()
        .assert_error(StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE");
}

#[test]
fn test_owner_access() {
    let (store, client) = client_with(|service| service.with_access(Access::Owner));
    client
        .post("/met/alice/notes/1")
        .body(r#""hi""#)
        .send()
        .assert_error(StatusCode::FORBIDDEN, "AUTHORIZATION_DENIED");
    assert_eq!(store.predicates("alice").unwrap(), Vec::<String>::new());
}

#[test]
fn test_custom_mount() {
    let (_, client) = client_with(|service| service.with_mount("/api/facts"));
    client
        .post("/api/facts/people/knows/alice")
        .body("1")
        .send()
        .assert_status(StatusCode::OK);
    client
        .get("/met/people/knows")
        .send()
        .assert_status(StatusCode::NOT_FOUND);
}
