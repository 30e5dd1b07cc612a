//! Read-side entity arena
//!
//! A request's subtree is loaded once into a map keyed by entity path; the
//! filter and the serializer walk it through child-id lists. Resources are
//! presented through their default version, and an xref resource borrows
//! the target's versions under its own paths.

use std::collections::HashMap;

use xreg_core_types::attrs::{DEFAULTVERSIONID, VERSIONS, XREF};

use crate::catalog::ModelCatalog;
use crate::errors::{RegistryError, Result};
use crate::model::{EntityKind, EntityPath, Props, Target};
use crate::ops::default_version::version_order_key;
use crate::store::StoreTx;

/// Resource-only state derived while loading
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceState {
    pub default_vid: Option<String>,
    /// Newest version by `createdat`, ties to the greatest id
    pub latest_vid: Option<String>,
    /// Resource whose versions back this one
    pub source: Option<EntityPath>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub path: EntityPath,
    /// Own properties; a resource's are its default version's
    pub props: Props,
    /// Child collections in model order, ids ascending
    pub collections: Vec<(String, Vec<String>)>,
    pub resource: Option<ResourceState>,
}

impl Node {
    fn new(path: EntityPath, props: Props) -> Self {
        Self {
            path,
            props,
            collections: Vec::new(),
            resource: None,
        }
    }

    pub fn children(&self, collection: &str) -> &[String] {
        self.collections
            .iter()
            .find(|(name, _)| name == collection)
            .map_or(&[][..], |(_, ids)| ids.as_slice())
    }
}

#[derive(Debug, Clone)]
pub struct EntityTree {
    target: Target,
    nodes: HashMap<EntityPath, Node>,
}

impl EntityTree {
    /// Load everything at and below `target`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the addressed entity (or a collection's
    /// owner) does not exist, and store errors.
    pub fn load(tx: &dyn StoreTx, model: &dyn ModelCatalog, target: &Target) -> Result<Self> {
        let mut tree = Self {
            target: target.clone(),
            nodes: HashMap::new(),
        };
        let anchor = target.anchor();
        let not_found = || RegistryError::not_found(target.display_path());

        match anchor.kind() {
            EntityKind::Registry | EntityKind::Group | EntityKind::Resource => {
                if !tree.load_entity(tx, model, anchor)? {
                    return Err(not_found());
                }
            }
            EntityKind::Meta | EntityKind::Version => {
                if !tree.load_entity(tx, model, &anchor.resource_path())? {
                    return Err(not_found());
                }
                if !tree.nodes.contains_key(anchor) {
                    return Err(not_found());
                }
            }
        }
        tracing::debug!(scope = %target.display_path(), nodes = tree.nodes.len(), "tree loaded");
        Ok(tree)
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn get(&self, path: &EntityPath) -> Option<&Node> {
        self.nodes.get(path)
    }

    /// Ids of `collection` under `parent`; empty when unknown
    pub fn children(&self, parent: &EntityPath, collection: &str) -> &[String] {
        self.nodes.get(parent).map_or(&[][..], |n| n.children(collection))
    }

    /// Paths of the entities the target yields: the entity itself, or the
    /// members of the collection
    pub fn scope(&self) -> Vec<EntityPath> {
        match &self.target {
            Target::Entity(p) => vec![p.clone()],
            Target::Collection { parent, collection } => self
                .children(parent, collection)
                .iter()
                .map(|id| parent.child(collection, id))
                .collect(),
        }
    }

    fn load_entity(&mut self, tx: &dyn StoreTx, model: &dyn ModelCatalog, path: &EntityPath) -> Result<bool> {
        match path.kind() {
            EntityKind::Registry => {
                let props = tx.get_props(path)?.unwrap_or_default();
                self.load_container(tx, model, Node::new(path.clone(), props))?;
                Ok(true)
            }
            EntityKind::Group => match tx.get_props(path)? {
                Some(props) => {
                    self.load_container(tx, model, Node::new(path.clone(), props))?;
                    Ok(true)
                }
                None => Ok(false),
            },
            EntityKind::Resource => self.load_resource(tx, path),
            EntityKind::Meta | EntityKind::Version => Ok(false),
        }
    }

    fn load_container(&mut self, tx: &dyn StoreTx, model: &dyn ModelCatalog, mut node: Node) -> Result<()> {
        for collection in model.collections(&node.path) {
            let ids = tx.list_children(&node.path, &collection)?;
            for id in &ids {
                let child = node.path.child(&collection, id);
                self.load_entity(tx, model, &child)?;
            }
            node.collections.push((collection, ids));
        }
        self.nodes.insert(node.path.clone(), node);
        Ok(())
    }

    fn load_resource(&mut self, tx: &dyn StoreTx, path: &EntityPath) -> Result<bool> {
        let Some(meta) = tx.get_props(&path.meta())? else {
            return Ok(false);
        };
        let (source, source_meta) = match meta.get_str(XREF) {
            None => (Some(path.clone()), Some(meta.clone())),
            Some(xref) => resolve_xref(tx, xref)?.map_or((None, None), |(p, m)| (Some(p), Some(m))),
        };

        let mut vids = Vec::new();
        let mut latest: Option<(_, String)> = None;
        if let Some(source) = &source {
            vids = tx.list_children(source, VERSIONS)?;
            for vid in &vids {
                let props = tx.get_props(&source.version(vid))?.unwrap_or_default();
                let key = version_order_key(vid, &props);
                if latest.as_ref().map_or(true, |l| key > *l) {
                    latest = Some(key);
                }
                self.nodes.insert(path.version(vid), Node::new(path.version(vid), props));
            }
        }

        let default_vid = source_meta
            .as_ref()
            .and_then(|m| m.get_str(DEFAULTVERSIONID))
            .filter(|v| vids.iter().any(|x| x.as_str() == *v))
            .map(str::to_string);
        let props = default_vid
            .as_ref()
            .and_then(|v| self.nodes.get(&path.version(v)))
            .map(|n| n.props.clone())
            .unwrap_or_default();

        self.nodes.insert(path.meta(), Node::new(path.meta(), meta));
        let mut node = Node::new(path.clone(), props);
        node.collections.push((VERSIONS.to_string(), vids));
        node.resource = Some(ResourceState {
            default_vid,
            latest_vid: latest.map(|(_, vid)| vid),
            source,
        });
        self.nodes.insert(path.clone(), node);
        Ok(true)
    }
}

/// Target of an xref and its Meta; `None` when it is missing or itself an xref
fn resolve_xref(tx: &dyn StoreTx, xref: &str) -> Result<Option<(EntityPath, Props)>> {
    let Ok(target) = EntityPath::from_key(xref) else {
        return Ok(None);
    };
    if target.kind() != EntityKind::Resource {
        return Ok(None);
    }
    match tx.get_props(&target.meta())? {
        Some(meta) if meta.get_str(XREF).is_none() => Ok(Some((target, meta))),
        _ => {
            tracing::debug!(xref = %xref, "xref target unavailable");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Model;
    use crate::store::{MemoryStore, PropertyStore};
    use serde_json::json;

    fn model() -> Model {
        Model::from_json(
            br#"{"groups": {"dirs": {"plural": "dirs", "singular": "dir",
                 "resources": {"files": {"plural": "files", "singular": "file"}}}}}"#,
        )
        .unwrap()
    }

    fn props(v: serde_json::Value) -> Props {
        let mut p = Props::new();
        for (k, v) in v.as_object().unwrap() {
            p.set(k.clone(), v.clone());
        }
        p
    }

    fn seed(store: &MemoryStore) {
        let r = EntityPath::resource("dirs", "d1", "files", "f1");
        let x = EntityPath::resource("dirs", "d1", "files", "fx");
        let mut tx = store.begin_tx().unwrap();
        tx.put_props(&EntityPath::root(), &props(json!({"epoch": 1}))).unwrap();
        tx.put_props(&EntityPath::group("dirs", "d1"), &props(json!({"epoch": 1}))).unwrap();
        tx.put_props(&r, &Props::new()).unwrap();
        tx.put_props(&r.meta(), &props(json!({"defaultversionid": "1"}))).unwrap();
        tx.put_props(&r.version("1"), &props(json!({"name": "one", "createdat": "2024-01-01T00:00:00Z"})))
            .unwrap();
        tx.put_props(&r.version("2"), &props(json!({"name": "two", "createdat": "2024-01-02T00:00:00Z"})))
            .unwrap();
        tx.put_props(&x, &Props::new()).unwrap();
        tx.put_props(&x.meta(), &props(json!({"xref": "/dirs/d1/files/f1"}))).unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn test_resource_presents_default_version() {
        let store = MemoryStore::new();
        seed(&store);
        let tx = store.begin_tx().unwrap();
        let tree = EntityTree::load(tx.as_ref(), &model(), &Target::Entity(EntityPath::root())).unwrap();
        let r = EntityPath::resource("dirs", "d1", "files", "f1");
        let node = tree.get(&r).unwrap();
        assert_eq!(node.props.get_str("name"), Some("one"));
        let state = node.resource.as_ref().unwrap();
        assert_eq!(state.default_vid.as_deref(), Some("1"));
        assert_eq!(state.latest_vid.as_deref(), Some("2"));
        assert_eq!(tree.children(&r, "versions"), ["1", "2"]);
    }

    #[test]
    fn test_xref_borrows_target_versions() {
        let store = MemoryStore::new();
        seed(&store);
        let tx = store.begin_tx().unwrap();
        let x = EntityPath::resource("dirs", "d1", "files", "fx");
        let tree = EntityTree::load(tx.as_ref(), &model(), &Target::Entity(x.clone())).unwrap();
        assert_eq!(tree.get(&x).unwrap().props.get_str("name"), Some("one"));
        assert!(tree.get(&x.version("2")).is_some());
        assert!(tree.get(&x.meta()).unwrap().props.get_str("xref").is_some());
    }

    #[test]
    fn test_missing_entity_is_not_found() {
        let store = MemoryStore::new();
        seed(&store);
        let tx = store.begin_tx().unwrap();
        let r = EntityPath::resource("dirs", "d1", "files", "f1");
        let err = EntityTree::load(tx.as_ref(), &model(), &Target::Entity(r.version("9"))).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
        let err = EntityTree::load(
            tx.as_ref(),
            &model(),
            &Target::Collection {
                parent: EntityPath::group("dirs", "nope"),
                collection: "files".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }
}
