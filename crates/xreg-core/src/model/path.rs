use std::fmt;

use xreg_core_types::attrs::{META, VERSIONS};

use crate::catalog::ModelCatalog;
use crate::errors::{RegistryError, Result};

/// Suffix selecting the metadata form of a document-bearing entity
pub const STRUCTURE_SUFFIX: &str = "$structure";

/// The five kinds of stored entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Registry,
    Group,
    Resource,
    Meta,
    Version,
}

/// Address of one stored entity
///
/// Segments alternate collection name and id, except for Meta which ends
/// in the bare `meta` segment:
///
/// ```text
/// []                                     registry
/// [dirs, d1]                             group
/// [dirs, d1, files, f1]                  resource
/// [dirs, d1, files, f1, meta]            meta
/// [dirs, d1, files, f1, versions, v1]    version
/// ```
///
/// The storage key (and the `xid` attribute) is the `/`-joined form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityPath {
    segments: Vec<String>,
}

impl EntityPath {
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub fn group(gtype: &str, gid: &str) -> Self {
        Self {
            segments: vec![gtype.to_string(), gid.to_string()],
        }
    }

    pub fn resource(gtype: &str, gid: &str, rtype: &str, rid: &str) -> Self {
        Self {
            segments: vec![
                gtype.to_string(),
                gid.to_string(),
                rtype.to_string(),
                rid.to_string(),
            ],
        }
    }

    /// Child entity of `self` in `collection`
    pub fn child(&self, collection: &str, id: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(collection.to_string());
        segments.push(id.to_string());
        Self { segments }
    }

    /// Meta of a resource path
    pub fn meta(&self) -> Self {
        let mut segments = self.resource_path().segments;
        segments.push(META.to_string());
        Self { segments }
    }

    /// Version `vid` of a resource path
    pub fn version(&self, vid: &str) -> Self {
        self.resource_path().child(VERSIONS, vid)
    }

    pub fn kind(&self) -> EntityKind {
        match self.segments.len() {
            0 => EntityKind::Registry,
            2 => EntityKind::Group,
            4 => EntityKind::Resource,
            5 => EntityKind::Meta,
            _ => EntityKind::Version,
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Id of this entity; the resource id for Meta and `""` for the registry
    pub fn id(&self) -> &str {
        match self.kind() {
            EntityKind::Registry => "",
            EntityKind::Meta => &self.segments[3],
            _ => &self.segments[self.segments.len() - 1],
        }
    }

    /// Collection this entity lives in (`None` for registry and meta)
    pub fn collection(&self) -> Option<&str> {
        match self.kind() {
            EntityKind::Registry | EntityKind::Meta => None,
            _ => Some(&self.segments[self.segments.len() - 2]),
        }
    }

    pub fn group_type(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.segments.get(2).map(String::as_str)
    }

    /// Owning resource for resource/meta/version paths; `self` otherwise
    pub fn resource_path(&self) -> EntityPath {
        if self.segments.len() >= 4 {
            Self {
                segments: self.segments[..4].to_vec(),
            }
        } else {
            self.clone()
        }
    }

    pub fn group_path(&self) -> Option<EntityPath> {
        if self.segments.len() >= 2 {
            Some(Self {
                segments: self.segments[..2].to_vec(),
            })
        } else {
            None
        }
    }

    /// Parent entity (meta's parent is its resource)
    pub fn parent(&self) -> Option<EntityPath> {
        match self.kind() {
            EntityKind::Registry => None,
            EntityKind::Meta => Some(self.resource_path()),
            _ => Some(Self {
                segments: self.segments[..self.segments.len() - 2].to_vec(),
            }),
        }
    }

    /// All ancestors from the registry down to (excluding) `self`
    pub fn ancestors(&self) -> Vec<EntityPath> {
        let mut out = Vec::new();
        let mut cur = self.parent();
        while let Some(p) = cur {
            cur = p.parent();
            out.push(p);
        }
        out.reverse();
        out
    }

    /// True when `other` is `self` or lies beneath it
    pub fn is_ancestor_or_self_of(&self, other: &EntityPath) -> bool {
        other.segments.len() >= self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// Storage key / xid: `/` for the registry, `/dirs/d1/...` otherwise
    pub fn key(&self) -> String {
        if self.segments.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", self.segments.join("/"))
        }
    }

    /// Parse a storage key produced by [`EntityPath::key`]
    ///
    /// # Errors
    ///
    /// Returns `Persistence` when the key has an impossible shape.
    pub fn from_key(key: &str) -> Result<Self> {
        let trimmed = key.trim_matches('/');
        let segments: Vec<String> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').map(str::to_string).collect()
        };
        let ok = match segments.len() {
            0 | 2 | 4 => true,
            5 => segments[4] == META,
            6 => segments[4] == VERSIONS,
            _ => false,
        };
        if !ok {
            return Err(RegistryError::persistence(format!(
                "Malformed entity key '{}'",
                key
            )));
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// What a request path addresses: one entity, or a collection of them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Entity(EntityPath),
    Collection {
        parent: EntityPath,
        collection: String,
    },
}

impl Target {
    /// The entity itself, or the owner of the collection
    pub fn anchor(&self) -> &EntityPath {
        match self {
            Target::Entity(p) => p,
            Target::Collection { parent, .. } => parent,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Target::Collection { .. })
    }

    /// Level of the entities this target yields: the entity's own kind or
    /// the kind of the collection's members
    pub fn member_kind(&self) -> EntityKind {
        match self {
            Target::Entity(p) => p.kind(),
            Target::Collection { parent, .. } => match parent.kind() {
                EntityKind::Registry => EntityKind::Group,
                EntityKind::Group => EntityKind::Resource,
                _ => EntityKind::Version,
            },
        }
    }

    /// A path at the level of the entities this target yields; for a
    /// collection the member id is a placeholder
    pub fn member_level(&self) -> EntityPath {
        match self {
            Target::Entity(p) => p.clone(),
            Target::Collection { parent, collection } => parent.child(collection, "_"),
        }
    }

    pub fn display_path(&self) -> String {
        match self {
            Target::Entity(p) => p.key(),
            Target::Collection { parent, collection } => {
                if parent.segments().is_empty() {
                    format!("/{}", collection)
                } else {
                    format!("{}/{}", parent.key(), collection)
                }
            }
        }
    }
}

/// A parsed request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    pub target: Target,
    /// `$structure` was appended to the last segment
    pub structure: bool,
}

impl ParsedPath {
    /// Parse a URL path against the model
    ///
    /// Collection segments must name collections the model knows at that
    /// depth; ids are taken verbatim (validated only on write).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown collections or over-long paths, and
    /// `InvalidState` for `$structure` on anything but a resource/version.
    pub fn parse(path: &str, model: &dyn ModelCatalog) -> Result<Self> {
        let not_found = || RegistryError::not_found(path);
        let trimmed = path.trim_matches('/');
        let mut segments: Vec<String> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').map(str::to_string).collect()
        };
        if segments.iter().any(String::is_empty) {
            return Err(not_found());
        }

        let mut structure = false;
        if let Some(last) = segments.last_mut() {
            if let Some(stripped) = last.strip_suffix(STRUCTURE_SUFFIX) {
                if stripped.is_empty() {
                    return Err(not_found());
                }
                *last = stripped.to_string();
                structure = true;
            }
        }

        let n = segments.len();
        let gtype = segments.first().map(String::as_str);
        if let Some(g) = gtype {
            if model.group(g).is_none() {
                return Err(not_found());
            }
        }
        if n >= 3 {
            let g = gtype.unwrap_or_default();
            if model.resource(g, &segments[2]).is_none() {
                return Err(not_found());
            }
        }

        let target = match n {
            0 => Target::Entity(EntityPath::root()),
            1 => Target::Collection {
                parent: EntityPath::root(),
                collection: segments[0].clone(),
            },
            2 => Target::Entity(EntityPath::group(&segments[0], &segments[1])),
            3 => Target::Collection {
                parent: EntityPath::group(&segments[0], &segments[1]),
                collection: segments[2].clone(),
            },
            4 => Target::Entity(EntityPath::resource(
                &segments[0],
                &segments[1],
                &segments[2],
                &segments[3],
            )),
            5 => {
                let r = EntityPath::resource(&segments[0], &segments[1], &segments[2], &segments[3]);
                match segments[4].as_str() {
                    META => Target::Entity(r.meta()),
                    VERSIONS => Target::Collection {
                        parent: r,
                        collection: VERSIONS.to_string(),
                    },
                    _ => return Err(not_found()),
                }
            }
            6 if segments[4] == VERSIONS => {
                let r = EntityPath::resource(&segments[0], &segments[1], &segments[2], &segments[3]);
                Target::Entity(r.version(&segments[5]))
            }
            _ => return Err(not_found()),
        };

        if structure {
            let ok = matches!(
                &target,
                Target::Entity(p) if matches!(p.kind(), EntityKind::Resource | EntityKind::Version)
            );
            if !ok {
                return Err(RegistryError::invalid_state(format!(
                    "'{}' is only valid on a resource or version",
                    STRUCTURE_SUFFIX
                )));
            }
        }

        Ok(Self { target, structure })
    }
}

/// Allowed id characters: `[a-zA-Z0-9_][a-zA-Z0-9_.\-~@]{0,127}`
pub fn is_valid_id(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => {}
        _ => return false,
    }
    id.len() <= 128
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '~' | '@'))
}

/// # Errors
///
/// Returns `InvalidId` when `id` fails [`is_valid_id`].
pub fn check_id(id: &str) -> Result<()> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(RegistryError::InvalidId { id: id.to_string() })
    }
}
