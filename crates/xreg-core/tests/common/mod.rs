#![allow(dead_code)]

use serde_json::Value;
use xreg_core::commands::SetDefault;
use xreg_core::ops::{delete_entity, init_registry};
use xreg_core::xreg_core_types::RequestContext;
use xreg_core::{
    apply_all, plan_write, CapabilitySet, EntityPath, EntityTree, Filter, Inline, MemoryStore,
    Model, OpContext, ParsedPath, PropertyStore, Props, Result, Serializer, Target, WriteBody,
    WriteMethod, WriteRequest,
};

pub const BASE_URL: &str = "http://localhost:8080";

/// `dirs/dir` groups holding:
/// - `files/file`: documents, unlimited versions
/// - `notes/note`: no documents, at most two versions
/// - `singles/single`: no versioning, server-chosen ids
/// - `frozen/frozen`: read-only
pub const MODEL_JSON: &str = r#"{
  "attributes": {"*": {"type": "any"}},
  "groups": {
    "dirs": {
      "plural": "dirs", "singular": "dir",
      "attributes": {"*": {"type": "any"}},
      "resources": {
        "files": {"plural": "files", "singular": "file",
                  "attributes": {"*": {"type": "any"}}},
        "notes": {"plural": "notes", "singular": "note", "hasdocument": false, "maxversions": 2},
        "singles": {"plural": "singles", "singular": "single", "hasdocument": false,
                    "maxversions": 1, "setversionid": false},
        "frozen": {"plural": "frozen", "singular": "frozen", "readonly": true}
      }
    }
  }
}"#;

pub fn model() -> Model {
    Model::from_json(MODEL_JSON.as_bytes()).unwrap()
}

/// An initialized in-memory registry plus request helpers
pub struct Fixture {
    pub store: MemoryStore,
    pub model: Model,
    pub caps: CapabilitySet,
}

impl Fixture {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin_tx().unwrap();
            init_registry(tx.as_mut(), "xRegistry").unwrap();
            tx.commit().unwrap();
        }
        Self {
            store,
            model: model(),
            caps: CapabilitySet::default(),
        }
    }

    pub fn request(&self, method: WriteMethod, path: &str, body: Value) -> WriteRequest {
        let parsed = ParsedPath::parse(path, &self.model).unwrap();
        WriteRequest {
            target: parsed.target,
            structure: parsed.structure,
            method,
            body: WriteBody::Json(body),
            nested: true,
            set_default: None,
        }
    }

    /// Plan and apply one write in a single transaction
    pub fn run(&self, req: &WriteRequest) -> Result<()> {
        let plan = plan_write(&self.model, req)?;
        let request = RequestContext::new();
        let mut ctx = OpContext::new(self.store.begin_tx()?, &self.model, &request);
        apply_all(&mut ctx, &plan.commands)?;
        ctx.commit()
    }

    pub fn put(&self, path: &str, body: Value) -> Result<()> {
        self.run(&self.request(WriteMethod::Put, path, body))
    }

    pub fn patch(&self, path: &str, body: Value) -> Result<()> {
        self.run(&self.request(WriteMethod::Patch, path, body))
    }

    pub fn post(&self, path: &str, body: Value) -> Result<()> {
        self.run(&self.request(WriteMethod::Post, path, body))
    }

    pub fn post_with_default(&self, path: &str, body: Value, set_default: &str) -> Result<()> {
        let mut req = self.request(WriteMethod::Post, path, body);
        req.set_default = Some(SetDefault::parse(set_default));
        self.run(&req)
    }

    pub fn delete(&self, path: &str, epoch: Option<i64>, set_default: Option<&str>) -> Result<()> {
        let request = RequestContext::new();
        let mut ctx = OpContext::new(self.store.begin_tx()?, &self.model, &request);
        let target = EntityPath::from_key(path)?;
        let choice = set_default.map(SetDefault::parse);
        delete_entity(&mut ctx, &target, epoch, choice.as_ref())?;
        ctx.commit()
    }

    pub fn get(&self, path: &str, inline: Option<&str>) -> Result<Value> {
        self.get_filtered(path, &[], inline)
    }

    pub fn get_filtered(&self, path: &str, filters: &[&str], inline: Option<&str>) -> Result<Value> {
        let parsed = ParsedPath::parse(path, &self.model)?;
        let tx = self.store.begin_tx()?;
        let tree = EntityTree::load(tx.as_ref(), &self.model, &parsed.target)?;
        let inline = match inline {
            Some(v) => Inline::parse(v, &self.model, &parsed.target)?,
            None => Inline::none(),
        };
        let view = Serializer::new(&tree, &self.model, &self.caps, BASE_URL);
        if filters.is_empty() {
            return view.render(&inline);
        }
        let filter = Filter::parse(filters, &self.model, &parsed.target)?;
        let selection = xreg_core::filter::evaluate(&filter, &tree, &view)?;
        if selection.is_empty() && parsed.target == Target::Entity(EntityPath::root()) {
            return Err(xreg_core::RegistryError::not_found(path));
        }
        Serializer::new(&tree, &self.model, &self.caps, BASE_URL)
            .with_selection(&selection)
            .render(&inline)
    }

    pub fn export(&self, path: &str) -> Result<Value> {
        let parsed = ParsedPath::parse(path, &self.model)?;
        let tx = self.store.begin_tx()?;
        let tree = EntityTree::load(tx.as_ref(), &self.model, &parsed.target)?;
        Serializer::new(&tree, &self.model, &self.caps, BASE_URL).render(&Inline::export(&parsed.target))
    }

    /// Stored properties, hidden keys included
    pub fn props(&self, path: &EntityPath) -> Option<Props> {
        let tx = self.store.begin_tx().unwrap();
        tx.get_props(path).unwrap()
    }

    pub fn epoch(&self, path: &EntityPath) -> i64 {
        self.props(path)
            .and_then(|p| p.get_i64("epoch"))
            .unwrap_or_default()
    }

    pub fn default_version(&self, resource: &EntityPath) -> Option<String> {
        self.props(&resource.meta())
            .and_then(|p| p.get_str("defaultversionid").map(str::to_string))
    }

    pub fn versions(&self, resource: &EntityPath) -> Vec<String> {
        let tx = self.store.begin_tx().unwrap();
        tx.list_children(resource, "versions").unwrap()
    }
}

pub fn file(gid: &str, rid: &str) -> EntityPath {
    EntityPath::resource("dirs", gid, "files", rid)
}

pub fn note(gid: &str, rid: &str) -> EntityPath {
    EntityPath::resource("dirs", gid, "notes", rid)
}
