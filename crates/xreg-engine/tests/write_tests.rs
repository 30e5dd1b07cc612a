#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use serde_json::json;
use xreg_engine::{HttpRequest, Method};

const F1: &str = "/dirs/d1/files/f1$structure";

#[test]
fn test_create_then_update_status_and_location() {
    let reg = registry();
    let resp = put(&reg, "/dirs/d1", json!({"name": "one"}));
    assert_eq!(resp.status, 201);
    assert_eq!(resp.header("Location"), Some("http://localhost:8080/dirs/d1"));
    let body = json(&resp);
    assert_eq!(body["dirid"], json!("d1"));
    assert_eq!(body["epoch"], json!(1));

    let resp = put(&reg, "/dirs/d1", json!({"name": "uno"}));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("Location"), None);
    assert_eq!(json(&resp)["epoch"], json!(2));
    assert_eq!(json(&resp)["name"], json!("uno"));
}

#[test]
fn test_patch_keeps_unnamed_attributes() {
    let reg = registry();
    put(&reg, "/dirs/d1", json!({"name": "one", "description": "first"}));
    let resp = send_json(&reg, Method::Patch, "/dirs/d1", json!({"name": "uno"}));
    assert_eq!(resp.status, 200);
    let body = json(&resp);
    assert_eq!(body["name"], json!("uno"));
    assert_eq!(body["description"], json!("first"));
}

#[test]
fn test_stale_epoch_is_rejected_with_message() {
    let reg = registry();
    put(&reg, "/dirs/d1", json!({}));
    let resp = put(&reg, "/dirs/d1", json!({"epoch": 5, "name": "late"}));
    assert_eq!(resp.status, 400);
    assert_eq!(
        resp.body_text(),
        "Attribute \"epoch\"(5) doesn't match existing value (1)\n"
    );
    assert!(get_json(&reg, "/dirs/d1").get("name").is_none());
}

#[test]
fn test_malformed_body_is_400() {
    let reg = registry();
    let resp = reg.handle(&HttpRequest::new(Method::Put, "/dirs/d1").with_body("{not json"));
    assert_eq!(resp.status, 400);
    assert!(resp.body_text().starts_with("Error parsing request body"));
    assert_eq!(get(&reg, "/dirs/d1").status, 404);
}

#[test]
fn test_method_not_allowed() {
    let reg = registry();
    put(&reg, "/dirs/d1", json!({}));
    let resp = send_json(&reg, Method::Post, "/dirs/d1", json!({}));
    assert_eq!(resp.status, 405);

    let resp = send_json(&reg, Method::Put, "/dirs", json!({}));
    assert_eq!(resp.status, 405);
}

#[test]
fn test_post_version_uses_next_id() {
    let reg = registry();
    assert_eq!(put(&reg, F1, json!({"name": "first"})).status, 201);

    let resp = send_json(&reg, Method::Post, F1, json!({"name": "second"}));
    assert_eq!(resp.status, 201, "{}", resp.body_text());
    assert_eq!(
        resp.header("Location"),
        Some("http://localhost:8080/dirs/d1/files/f1/versions/2")
    );
    let body = json(&resp);
    assert_eq!(body["versionid"], json!("2"));
    assert_eq!(body["isdefault"], json!(true));

    let meta = get_json(&reg, "/dirs/d1/files/f1/meta");
    assert_eq!(meta["defaultversionid"], json!("2"));
}

#[test]
fn test_setdefaultversionid_pins_default() {
    let reg = registry();
    put(&reg, F1, json!({}));
    let resp = reg.handle(
        &HttpRequest::new(Method::Post, F1)
            .with_query("setdefaultversionid", "1")
            .with_json(&json!({"versionid": "2"})),
    );
    assert_eq!(resp.status, 201, "{}", resp.body_text());

    let meta = get_json(&reg, "/dirs/d1/files/f1/meta");
    assert_eq!(meta["defaultversionid"], json!("1"));
    assert_eq!(meta["defaultversionsticky"], json!(true));

    let resp = reg.handle(&HttpRequest::get(F1).with_query("setdefaultversionid", ""));
    assert_eq!(resp.status, 400);
}

#[test]
fn test_nested_collections_need_flag() {
    let reg = registry();
    let body = json!({"name": "one", "files": {"f1": {"name": "inner"}}});

    put(&reg, "/dirs/d1", body.clone());
    assert_eq!(get_json(&reg, "/dirs/d1/files"), json!({}));

    let resp = reg.handle(
        &HttpRequest::new(Method::Put, "/dirs/d1")
            .with_query("nested", "")
            .with_json(&body),
    );
    assert_eq!(resp.status, 200);
    assert_eq!(keys(&get_json(&reg, "/dirs/d1/files")), vec!["f1"]);
}

#[test]
fn test_collection_post_renders_members_sorted() {
    let reg = registry();
    let resp = send_json(&reg, Method::Post, "/dirs", json!({"b": {}, "a": {"name": "x"}}));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("Location"), None);
    let body = json(&resp);
    assert_eq!(keys(&body), vec!["a", "b"]);
    assert_eq!(body["a"]["name"], json!("x"));
}

#[test]
fn test_raw_put_and_post_respond_with_document() {
    let reg = registry();
    let resp = reg.handle(
        &HttpRequest::new(Method::Put, "/dirs/d1/files/f1")
            .with_header("Content-Type", "text/plain")
            .with_body("v1 body"),
    );
    assert_eq!(resp.status, 201, "{}", resp.body_text());
    assert_eq!(resp.body, b"v1 body");
    assert_eq!(resp.header("Content-Type"), Some("text/plain"));
    assert_eq!(resp.header("xRegistry-versionid"), Some("1"));
    assert_eq!(resp.header("Location"), Some("http://localhost:8080/dirs/d1/files/f1"));

    let resp = reg.handle(
        &HttpRequest::new(Method::Post, "/dirs/d1/files/f1")
            .with_header("Content-Type", "text/plain")
            .with_header("xRegistry-versionid", "next")
            .with_body("v2 body"),
    );
    assert_eq!(resp.status, 201, "{}", resp.body_text());
    assert_eq!(resp.header("xRegistry-versionid"), Some("next"));
    assert_eq!(get(&reg, "/dirs/d1/files/f1/versions/1").body, b"v1 body");
}

#[test]
fn test_raw_patch_is_rejected() {
    let reg = registry();
    reg.handle(&HttpRequest::new(Method::Put, "/dirs/d1/files/f1").with_body("x"));
    let resp = reg.handle(&HttpRequest::new(Method::Patch, "/dirs/d1/files/f1").with_body("y"));
    assert_eq!(resp.status, 400);
    assert_eq!(get(&reg, "/dirs/d1/files/f1").body, b"x");
}

#[test]
fn test_bad_header_epoch() {
    let reg = registry();
    let resp = reg.handle(
        &HttpRequest::new(Method::Put, "/dirs/d1/files/f1")
            .with_header("xRegistry-epoch", "soon")
            .with_body("x"),
    );
    assert_eq!(resp.status, 400);
}

#[test]
fn test_write_api_outcome() {
    let reg = registry();
    let request = reg.request_context();
    let req = HttpRequest::new(Method::Put, "/dirs/d9").with_json(&json!({"name": "n"}));
    let opts = xreg_engine::RequestOptions::default();

    let outcome = reg.write(&req, &opts, &request).unwrap();
    assert!(outcome.created);
    assert_eq!(outcome.location.as_deref(), Some("http://localhost:8080/dirs/d9"));
    match &outcome.rendered {
        xreg_engine::Rendered::Json(v) => assert_eq!(v["name"], json!("n")),
        other => panic!("unexpected {:?}", other),
    }

    let again = reg.write(&req, &opts, &request).unwrap();
    assert!(!again.created);
    assert_eq!(again.location, None);
}
