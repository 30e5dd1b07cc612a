#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use serde_json::{json, Value};
use xreg_core::codec::document_bytes;
use xreg_core::render::to_json_bytes;
use xreg_core::RegistryError;

const F1: &str = "/dirs/d1/files/f1$structure";

fn keys(v: &Value) -> Vec<String> {
    v.as_object()
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default()
}

/// Drop the attributes that legitimately differ between two equivalent trees
fn strip(v: &mut Value) {
    match v {
        Value::Object(map) => {
            map.remove("epoch");
            map.remove("modifiedat");
            for child in map.values_mut() {
                strip(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip),
        _ => {}
    }
}

fn populate(fx: &Fixture) {
    fx.put(
        "/",
        json!({
            "name": "reg",
            "dirs": {
                "d1": {
                    "name": "one",
                    "tags": {"stage": "dev"},
                    "files": {
                        "f1": {"versions": {
                            "v1": {"file": {"foo": "bar"}, "createdat": "2024-01-01T00:00:00Z"},
                            "v2": {"filebase64": "aGVsbG8=", "createdat": "2024-01-02T00:00:00Z"}
                        }},
                        "f2": {
                            "meta": {"defaultversionid": "a", "defaultversionsticky": true},
                            "versions": {
                                "a": {"name": "first", "createdat": "2024-02-01T00:00:00Z"},
                                "b": {"name": "second", "createdat": "2024-02-02T00:00:00Z"}
                            }
                        }
                    },
                    "notes": {"n1": {"description": "plain"}}
                },
                "d2": {}
            }
        }),
    )
    .unwrap();
}

#[test]
fn test_json_document_round_trip() {
    let fx = Fixture::new();
    fx.put(F1, json!({"file": {"foo": "bar"}})).unwrap();

    let out = fx.get(F1, Some("file")).unwrap();
    assert_eq!(out["file"], json!({"foo": "bar"}));
    assert_eq!(out["contenttype"], json!("application/json"));

    let plain = fx.get(F1, None).unwrap();
    assert!(plain.get("file").is_none());
    assert_eq!(plain["contenttype"], json!("application/json"));
}

#[test]
fn test_base64_document_keeps_bytes() {
    let fx = Fixture::new();
    fx.put(F1, json!({"filebase64": "aGVsbG8="})).unwrap();

    let props = fx.props(&file("d1", "f1").version("1")).unwrap();
    assert_eq!(document_bytes(&props).unwrap(), b"hello");
    assert_eq!(props.get_str("contenttype"), None);

    let out = fx.get(F1, Some("file")).unwrap();
    assert_eq!(out["filebase64"], json!("aGVsbG8="));
    assert!(out.get("contenttype").is_none());
}

#[test]
fn test_null_document_clears_body_and_contenttype() {
    let fx = Fixture::new();
    fx.put(F1, json!({"file": {"a": 1}})).unwrap();
    fx.patch(F1, json!({"file": null})).unwrap();

    let out = fx.get(F1, Some("file")).unwrap();
    assert!(out.get("file").is_none());
    assert!(out.get("filebase64").is_none());
    assert!(out.get("contenttype").is_none());
}

#[test]
fn test_collections_sorted_by_id() {
    let fx = Fixture::new();
    fx.post("/dirs", json!({"b": {}, "c": {}, "a": {}})).unwrap();
    let out = fx.get("/dirs", None).unwrap();
    assert_eq!(keys(&out), vec!["a", "b", "c"]);
}

#[test]
fn test_attribute_order_and_derived_fields() {
    let fx = Fixture::new();
    populate(&fx);

    let group = fx.get("/dirs/d1", None).unwrap();
    assert_eq!(
        keys(&group)[..4],
        ["dirid", "self", "xid", "epoch"].map(String::from)
    );
    assert_eq!(group["self"], json!(format!("{}/dirs/d1", BASE_URL)));
    assert_eq!(group["xid"], json!("/dirs/d1"));
    assert_eq!(group["filesurl"], json!(format!("{}/dirs/d1/files", BASE_URL)));
    assert_eq!(group["filescount"], json!(2));
    assert_eq!(group["notescount"], json!(1));
    assert!(group.get("files").is_none());

    let resource = fx.get("/dirs/d1/files/f2$structure", None).unwrap();
    assert_eq!(keys(&resource)[..3], ["fileid", "versionid", "self"].map(String::from));
    assert_eq!(resource["versionid"], json!("a"));
    assert_eq!(resource["name"], json!("first"));
    assert_eq!(
        resource["metaurl"],
        json!(format!("{}/dirs/d1/files/f2/meta", BASE_URL))
    );
    assert_eq!(resource["versionscount"], json!(2));

    let version = fx.get("/dirs/d1/files/f2/versions/b$structure", None).unwrap();
    assert_eq!(version["isdefault"], json!(false));
    assert_eq!(version["versionid"], json!("b"));

    let meta = fx.get("/dirs/d1/files/f2/meta", None).unwrap();
    assert_eq!(meta["defaultversionid"], json!("a"));
    assert_eq!(meta["defaultversionsticky"], json!(true));
    assert_eq!(meta["readonly"], json!(false));
    assert_eq!(
        meta["defaultversionurl"],
        json!(format!("{}/dirs/d1/files/f2/versions/a$structure", BASE_URL))
    );
}

#[test]
fn test_inline_paths() {
    let fx = Fixture::new();
    populate(&fx);

    let out = fx.get("/", Some("dirs.files")).unwrap();
    assert_eq!(keys(&out["dirs"]), vec!["d1", "d2"]);
    let d1 = &out["dirs"]["d1"];
    assert_eq!(keys(&d1["files"]), vec!["f1", "f2"]);
    assert!(d1.get("notes").is_none());
    assert!(d1["files"]["f1"].get("versions").is_none());

    let out = fx.get("/", Some("dirs/files/versions,dirs.notes")).unwrap();
    assert_eq!(keys(&out["dirs"]["d1"]["files"]["f1"]["versions"]), vec!["v1", "v2"]);
    assert_eq!(keys(&out["dirs"]["d1"]["notes"]), vec!["n1"]);

    let out = fx.get("/dirs/d1/files", Some("meta")).unwrap();
    assert_eq!(out["f2"]["meta"]["defaultversionid"], json!("a"));

    let out = fx.get("/", Some("model,capabilities")).unwrap();
    assert!(out["model"]["groups"]["dirs"].is_object());
    assert_eq!(out["capabilities"]["flags"], json!(["filter", "inline"]));
    assert!(out.get("dirs").is_none());
}

#[test]
fn test_invalid_inline_rejected() {
    let fx = Fixture::new();
    populate(&fx);
    let err = fx.get("/", Some("dirs.bogus")).unwrap_err();
    assert!(matches!(err, RegistryError::InvalidInline { .. }));
    assert_eq!(err.to_string(), "Invalid 'inline' value: dirs.bogus");

    let err = fx.get("/", Some("*.dirs")).unwrap_err();
    assert!(matches!(err, RegistryError::InvalidInline { .. }));
}

#[test]
fn test_export_at_root_includes_model() {
    let fx = Fixture::new();
    populate(&fx);

    let root = fx.export("/").unwrap();
    assert!(root.get("model").is_some());
    assert!(root.get("capabilities").is_some());
    assert_eq!(root["dirs"]["d1"]["files"]["f1"]["versions"]["v1"]["file"], json!({"foo": "bar"}));

    let group = fx.export("/dirs/d1").unwrap();
    assert!(group.get("model").is_none());
    assert_eq!(keys(&group["files"]), vec!["f1", "f2"]);
    assert_eq!(group["files"]["f2"]["meta"]["defaultversionsticky"], json!(true));
}

#[test]
fn test_export_replay_into_fresh_registry() {
    let source = Fixture::new();
    populate(&source);
    let mut exported = source.export("/").unwrap();
    strip(&mut exported);

    let copy = Fixture::new();
    copy.put("/", exported.clone()).unwrap();
    let mut replayed = copy.export("/").unwrap();
    strip(&mut replayed);

    assert_eq!(replayed, exported);
    assert_eq!(copy.default_version(&file("d1", "f2")).as_deref(), Some("a"));
}

#[test]
fn test_export_replay_with_epochs_is_accepted() {
    let fx = Fixture::new();
    populate(&fx);
    let mut before = fx.export("/").unwrap();

    fx.put("/", before.clone()).unwrap();
    let mut after = fx.export("/").unwrap();
    strip(&mut after);
    strip(&mut before);
    assert_eq!(after, before);

    // the original group epoch is now stale
    let err = fx
        .put("/dirs/d1", json!({"epoch": 1, "name": "again"}))
        .unwrap_err();
    assert!(matches!(err, RegistryError::EpochMismatch { .. }));
}

#[test]
fn test_json_bytes_are_pretty_with_newline() {
    let bytes = to_json_bytes(&json!({"a": 1})).unwrap();
    assert_eq!(String::from_utf8(bytes).unwrap(), "{\n  \"a\": 1\n}\n");
}
