#![allow(dead_code)]

use serde_json::Value;
use xreg_core::{MemoryStore, Model};
use xreg_engine::{HttpRequest, HttpResponse, Method, Registry, RegistryConfig};

pub const BASE_URL: &str = "http://localhost:8080";

/// `dirs/dir` groups holding document-bearing `files` and plain `notes`
pub const MODEL_JSON: &str = r#"{
  "groups": {
    "dirs": {
      "plural": "dirs", "singular": "dir",
      "resources": {
        "files": {"plural": "files", "singular": "file"},
        "notes": {"plural": "notes", "singular": "note", "hasdocument": false}
      }
    }
  }
}"#;

pub fn model() -> Model {
    Model::from_json(MODEL_JSON.as_bytes()).unwrap()
}

pub fn registry_with(config: &RegistryConfig) -> Registry {
    Registry::new(Box::new(MemoryStore::new()), model(), config).unwrap()
}

pub fn registry() -> Registry {
    registry_with(&RegistryConfig::default())
}

pub fn get(reg: &Registry, path: &str) -> HttpResponse {
    reg.handle(&HttpRequest::get(path))
}

pub fn send_json(reg: &Registry, method: Method, path: &str, body: Value) -> HttpResponse {
    reg.handle(&HttpRequest::new(method, path).with_json(&body))
}

pub fn put(reg: &Registry, path: &str, body: Value) -> HttpResponse {
    send_json(reg, Method::Put, path, body)
}

pub fn json(resp: &HttpResponse) -> Value {
    serde_json::from_slice(&resp.body)
        .unwrap_or_else(|e| panic!("status {} body {:?}: {}", resp.status, resp.body_text(), e))
}

pub fn keys(v: &Value) -> Vec<String> {
    v.as_object()
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default()
}

/// GET that must succeed with JSON
pub fn get_json(reg: &Registry, path: &str) -> Value {
    let resp = get(reg, path);
    assert_eq!(resp.status, 200, "GET {}: {}", path, resp.body_text());
    json(&resp)
}
