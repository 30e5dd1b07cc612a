use serde_json::{json, Value};
use xreg_core_types::attrs::{
    CREATEDAT, DEFAULTVERSIONID, DEFAULTVERSIONSTICKY, EPOCH, HIDDEN_CREATEDAT, HIDDEN_EPOCH,
    HIDDEN_NEXT_VERSION_ID, MODIFIEDAT, XREF,
};

use super::path::{EntityKind, EntityPath};
use super::props::Props;

/// Behavior shared by every stored entity kind
///
/// Epoch and timestamp maintenance live here once; kind-specific records
/// (see [`Meta`]) wrap an [`Entity`] and delegate to it.
pub trait EntityRecord {
    fn path(&self) -> &EntityPath;
    fn props(&self) -> &Props;
    fn props_mut(&mut self) -> &mut Props;

    fn kind(&self) -> EntityKind {
        self.path().kind()
    }

    fn epoch(&self) -> i64 {
        self.props().get_i64(EPOCH).unwrap_or(0)
    }

    /// Stamp a brand-new entity: epoch 1, both timestamps `now`
    fn init(&mut self, now: &str) {
        let props = self.props_mut();
        props.set(EPOCH, json!(1));
        props.set(CREATEDAT, json!(now));
        props.set(MODIFIEDAT, json!(now));
    }

    /// Record one mutation: epoch + 1, `modifiedat` = `now`
    fn touch(&mut self, now: &str) {
        let next = self.epoch() + 1;
        let props = self.props_mut();
        props.set(EPOCH, json!(next));
        props.set(MODIFIEDAT, json!(now));
    }
}

/// One stored entity: its path plus its property bag
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub path: EntityPath,
    pub props: Props,
}

impl Entity {
    pub fn new(path: EntityPath) -> Self {
        Self {
            path,
            props: Props::new(),
        }
    }

    pub fn with_props(path: EntityPath, props: Props) -> Self {
        Self { path, props }
    }
}

impl EntityRecord for Entity {
    fn path(&self) -> &EntityPath {
        &self.path
    }

    fn props(&self) -> &Props {
        &self.props
    }

    fn props_mut(&mut self) -> &mut Props {
        &mut self.props
    }
}

/// A resource's Meta record: default-version pointer and xref state
#[derive(Debug, Clone, PartialEq)]
pub struct Meta(pub Entity);

impl Meta {
    pub fn new(entity: Entity) -> Self {
        Self(entity)
    }

    pub fn into_entity(self) -> Entity {
        self.0
    }

    pub fn default_version_id(&self) -> Option<&str> {
        self.0.props.get_str(DEFAULTVERSIONID)
    }

    pub fn set_default_version_id(&mut self, vid: Option<&str>) {
        self.0
            .props
            .set(DEFAULTVERSIONID, vid.map_or(Value::Null, |v| json!(v)));
    }

    pub fn is_sticky(&self) -> bool {
        self.0.props.get_bool(DEFAULTVERSIONSTICKY).unwrap_or(false)
    }

    pub fn set_sticky(&mut self, sticky: bool) {
        self.0.props.set(DEFAULTVERSIONSTICKY, json!(sticky));
    }

    pub fn xref(&self) -> Option<&str> {
        self.0.props.get_str(XREF)
    }

    /// Next candidate for a server-generated version id
    pub fn next_version_id(&self) -> i64 {
        self.0.props.get_i64(HIDDEN_NEXT_VERSION_ID).unwrap_or(1)
    }

    pub fn set_next_version_id(&mut self, next: i64) {
        self.0.props.set(HIDDEN_NEXT_VERSION_ID, json!(next));
    }

    /// Stash the visible epoch/createdat while the resource is an xref
    pub fn freeze(&mut self) {
        let epoch = self.epoch();
        let created = self.0.props.get(CREATEDAT).cloned().unwrap_or(Value::Null);
        self.0.props.set(HIDDEN_EPOCH, json!(epoch));
        self.0.props.set(HIDDEN_CREATEDAT, created);
        self.0.props.remove(DEFAULTVERSIONID);
        self.0.props.remove(DEFAULTVERSIONSTICKY);
    }

    /// Undo [`Meta::freeze`]: epoch continues from the frozen value
    pub fn thaw(&mut self, now: &str) {
        let frozen = self.0.props.get_i64(HIDDEN_EPOCH).unwrap_or(0);
        let created = self
            .0
            .props
            .remove(HIDDEN_CREATEDAT)
            .unwrap_or_else(|| json!(now));
        self.0.props.remove(HIDDEN_EPOCH);
        self.0.props.remove(XREF);
        self.0.props.set(EPOCH, json!(frozen + 1));
        self.0.props.set(CREATEDAT, created);
        self.0.props.set(MODIFIEDAT, json!(now));
    }
}

impl EntityRecord for Meta {
    fn path(&self) -> &EntityPath {
        &self.0.path
    }

    fn props(&self) -> &Props {
        &self.0.props
    }

    fn props_mut(&mut self) -> &mut Props {
        &mut self.0.props
    }
}
