#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use serde_json::json;
use xreg_core::CapabilitySet;
use xreg_engine::{HttpRequest, Method, RegistryConfig};

fn seeded() -> xreg_engine::Registry {
    let reg = registry();
    let resp = send_json(
        &reg,
        Method::Post,
        "/dirs",
        json!({
            "d2": {"name": "two", "tags": {"stage": "dev"}},
            "d1": {"name": "one"}
        }),
    );
    assert_eq!(resp.status, 200, "{}", resp.body_text());
    reg
}

#[test]
fn test_unknown_path_is_404_with_text_body() {
    let reg = registry();
    let resp = get(&reg, "/dirs/missing");
    assert_eq!(resp.status, 404);
    assert_eq!(resp.body_text(), "Not found\n");

    let resp = get(&reg, "/nothing");
    assert_eq!(resp.status, 404);
}

#[test]
fn test_registry_root_renders() {
    let reg = registry();
    let root = get_json(&reg, "/");
    assert_eq!(root["registryid"], json!("xRegistry"));
    assert_eq!(root["self"], json!(format!("{}/", BASE_URL)));
    assert_eq!(root["dirscount"], json!(0));
}

#[test]
fn test_collection_is_sorted_pretty_json() {
    let reg = seeded();
    let resp = get(&reg, "/dirs");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("content-type"), Some("application/json"));
    assert!(resp.body_text().ends_with("}\n"));
    assert!(resp.body_text().contains("\n  \"d1\": {"));
    assert_eq!(keys(&json(&resp)), vec!["d1", "d2"]);
}

#[test]
fn test_inline_query() {
    let reg = seeded();
    let plain = get_json(&reg, "/");
    assert!(plain.get("dirs").is_none());

    let resp = reg.handle(&HttpRequest::get("/").with_query("inline", "dirs"));
    let out = json(&resp);
    assert_eq!(keys(&out["dirs"]), vec!["d1", "d2"]);

    let resp = reg.handle(&HttpRequest::get("/").with_query("inline", "bogus"));
    assert_eq!(resp.status, 400);
    assert_eq!(resp.body_text(), "Invalid 'inline' value: bogus\n");
}

#[test]
fn test_filter_query() {
    let reg = seeded();
    let resp = reg.handle(&HttpRequest::get("/dirs").with_query("filter", "tags.stage=dev"));
    assert_eq!(keys(&json(&resp)), vec!["d2"]);

    let resp = reg.handle(&HttpRequest::get("/dirs").with_query("filter", "name=none"));
    assert_eq!(resp.status, 200);
    assert_eq!(json(&resp), json!({}));

    let resp = reg.handle(&HttpRequest::get("/dirs/d1").with_query("filter", "name=two"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body_text(), "{}\n");

    let resp = reg.handle(&HttpRequest::get("/").with_query("filter", "dirs.name=nomatch"));
    assert_eq!(resp.status, 404);
    assert_eq!(resp.body_text(), "Not found\n");

    let resp = reg.handle(
        &HttpRequest::get("/")
            .with_query("filter", "dirs.name=one")
            .with_query("filter", "dirs.name=two")
            .with_query("inline", "dirs"),
    );
    assert_eq!(keys(&json(&resp)["dirs"]), vec!["d1", "d2"]);
}

#[test]
fn test_disabled_filter_capability_ignores_parameter() {
    let config = RegistryConfig {
        capabilities: CapabilitySet {
            filter: false,
            inline: true,
        },
        ..RegistryConfig::default()
    };
    let reg = registry_with(&config);
    put(&reg, "/dirs/d1", json!({})).body_text();
    put(&reg, "/dirs/d2", json!({})).body_text();

    let resp = reg.handle(&HttpRequest::get("/dirs").with_query("filter", "name=none"));
    assert_eq!(keys(&json(&resp)), vec!["d1", "d2"]);

    let root = get_json(&reg, "/");
    assert!(root.get("capabilities").is_none());
    let resp = reg.handle(&HttpRequest::get("/").with_query("inline", "capabilities"));
    assert_eq!(json(&resp)["capabilities"]["flags"], json!(["inline"]));
}

#[test]
fn test_export_embeds_everything() {
    let reg = seeded();
    let resp = put(&reg, "/dirs/d1/files/f1$structure", json!({"file": {"k": "v"}}));
    assert_eq!(resp.status, 201, "{}", resp.body_text());

    let resp = reg.handle(&HttpRequest::get("/").with_query("export", ""));
    let out = json(&resp);
    assert!(out.get("model").is_some());
    assert_eq!(
        out["dirs"]["d1"]["files"]["f1"]["versions"]["1"]["file"],
        json!({"k": "v"})
    );
    assert_eq!(out["dirs"]["d1"]["files"]["f1"]["meta"]["defaultversionid"], json!("1"));
}

#[test]
fn test_raw_document_get() {
    let reg = registry();
    let resp = reg.handle(
        &HttpRequest::new(Method::Put, "/dirs/d1/files/f1")
            .with_header("Content-Type", "text/plain")
            .with_header("xRegistry-name", "greeting")
            .with_header("xRegistry-tags-stage", "dev")
            .with_body("hello"),
    );
    assert_eq!(resp.status, 201, "{}", resp.body_text());

    let resp = get(&reg, "/dirs/d1/files/f1");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, b"hello");
    assert_eq!(resp.header("Content-Type"), Some("text/plain"));
    assert_eq!(resp.header("xRegistry-fileid"), Some("f1"));
    assert_eq!(resp.header("xRegistry-versionid"), Some("1"));
    assert_eq!(resp.header("xRegistry-name"), Some("greeting"));
    assert_eq!(resp.header("xRegistry-tags-stage"), Some("dev"));

    let structure = get_json(&reg, "/dirs/d1/files/f1$structure");
    assert_eq!(structure["name"], json!("greeting"));
    assert!(structure.get("file").is_none());

    // export forces the JSON form
    let resp = reg.handle(&HttpRequest::get("/dirs/d1/files/f1").with_query("export", ""));
    assert_eq!(resp.header("Content-Type"), Some("application/json"));
    assert_eq!(json(&resp)["fileid"], json!("f1"));
}

#[test]
fn test_external_document_redirects() {
    let reg = registry();
    let resp = put(
        &reg,
        "/dirs/d1/files/f1$structure",
        json!({"fileurl": "https://example.com/doc.json"}),
    );
    assert_eq!(resp.status, 201, "{}", resp.body_text());

    let resp = get(&reg, "/dirs/d1/files/f1");
    assert_eq!(resp.status, 303);
    assert_eq!(resp.header("Location"), Some("https://example.com/doc.json"));
    assert!(resp.body.is_empty());
}

#[test]
fn test_resource_without_documents_is_always_json() {
    let reg = registry();
    put(&reg, "/dirs/d1/notes/n1", json!({"description": "plain"}));
    let out = get_json(&reg, "/dirs/d1/notes/n1");
    assert_eq!(out["description"], json!("plain"));
    assert_eq!(out["self"], json!(format!("{}/dirs/d1/notes/n1", BASE_URL)));
}

#[test]
fn test_expired_deadline_is_504() {
    let config = RegistryConfig {
        request_timeout_ms: Some(0),
        ..RegistryConfig::default()
    };
    let reg = registry_with(&config);
    let resp = get(&reg, "/");
    assert_eq!(resp.status, 504);
    assert_eq!(resp.body_text(), "Request deadline exceeded during 'resolve'\n");

    let resp = put(&reg, "/dirs/d1", json!({}));
    assert_eq!(resp.status, 504);

    let generous = registry_with(&RegistryConfig {
        request_timeout_ms: Some(60_000),
        ..RegistryConfig::default()
    });
    assert_eq!(get(&generous, "/").status, 200);
}

#[test]
fn test_resolve_and_render_directly() {
    let reg = seeded();
    let request = reg.request_context();
    let resolved = reg.resolve("/dirs", &request).unwrap();
    let selection = reg.apply_filter(&resolved, &["name=one"]).unwrap();
    let bytes = reg
        .render(&resolved, selection.as_ref(), None, false)
        .unwrap();
    let out: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(keys(&out), vec!["d1"]);

    let entity = reg.resolve("/dirs/d1", &request).unwrap();
    let empty = reg.apply_filter(&entity, &["name=two"]).unwrap().unwrap();
    assert!(empty.is_empty());
    let bytes = reg.render(&entity, Some(&empty), None, false).unwrap();
    assert_eq!(bytes, b"{}\n");

    let root = reg.resolve("/", &request).unwrap();
    assert!(reg.apply_filter(&root, &["dirs.name=nomatch"]).unwrap().is_none());
}

#[test]
fn test_request_id_is_echoed_or_generated() {
    let reg = registry();

    let resp = reg.handle(&HttpRequest::get("/").with_header("x-request-id", "abc-123"));
    assert_eq!(resp.header("X-Request-Id"), Some("abc-123"));

    let resp = reg.handle(&HttpRequest::get("/dirs/missing"));
    assert_eq!(resp.status, 404);
    let generated = resp.header("X-Request-Id").unwrap();
    assert_eq!(generated.len(), 36);
}
