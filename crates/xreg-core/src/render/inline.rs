//! `?inline` directive
//!
//! A directive is a tree of names relative to the request's level. `*`
//! embeds everything below the point where it appears; `model` and
//! `capabilities` are embedded only when named.

use std::collections::BTreeMap;

use xreg_core_types::attrs::{CAPABILITIES, META, MODEL};

use crate::catalog::ModelCatalog;
use crate::errors::{RegistryError, Result};
use crate::model::{EntityKind, EntityPath, Target};

const WILDCARD: &str = "*";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inline {
    all: bool,
    named: BTreeMap<String, Inline>,
}

impl Inline {
    /// Embed nothing
    pub fn none() -> Self {
        Self::default()
    }

    /// Embed every collection at every depth
    pub fn all() -> Self {
        Self {
            all: true,
            named: BTreeMap::new(),
        }
    }

    /// The `?export` directive: everything, plus model and capabilities at
    /// the registry root
    pub fn export(target: &Target) -> Self {
        let mut inline = Self::all();
        if *target == Target::Entity(EntityPath::root()) {
            inline.named.insert(MODEL.to_string(), Self::none());
            inline.named.insert(CAPABILITIES.to_string(), Self::none());
        }
        inline
    }

    /// Parse a comma-separated directive relative to `target`
    ///
    /// Levels may be separated by `.` or `/`. An empty value means `*`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInline` carrying the whole value when any segment
    /// does not name something embeddable at its level.
    pub fn parse(value: &str, model: &dyn ModelCatalog, target: &Target) -> Result<Self> {
        let invalid = || RegistryError::InvalidInline {
            value: value.to_string(),
        };
        let mut inline = Self::none();
        if value.trim().is_empty() {
            return Ok(Self::all());
        }
        for item in value.split(',') {
            let segments: Vec<&str> = item.trim().split(['.', '/']).collect();
            if segments.iter().any(|s| s.is_empty()) {
                return Err(invalid());
            }
            let mut node = &mut inline;
            let mut level = Some(target.member_level());
            for (i, seg) in segments.iter().enumerate() {
                if *seg == WILDCARD {
                    if i + 1 != segments.len() {
                        return Err(invalid());
                    }
                    node.all = true;
                    break;
                }
                let Some(here) = level else {
                    return Err(invalid());
                };
                level = match next_level(model, &here, seg) {
                    Step::Collection(next) => Some(next),
                    Step::Terminal => None,
                    Step::Unknown => return Err(invalid()),
                };
                node = node.named.entry((*seg).to_string()).or_default();
            }
        }
        Ok(inline)
    }

    /// True when `name` should be embedded here
    pub fn includes(&self, name: &str) -> bool {
        self.all || self.named.contains_key(name)
    }

    /// True when `name` was named explicitly (not only through `*`)
    pub fn names(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    /// Directive that applies inside `name`
    pub fn child(&self, name: &str) -> Inline {
        match self.named.get(name) {
            Some(c) if self.all => Inline {
                all: true,
                named: c.named.clone(),
            },
            Some(c) => c.clone(),
            None if self.all => Inline::all(),
            None => Inline::none(),
        }
    }
}

enum Step {
    Collection(EntityPath),
    Terminal,
    Unknown,
}

/// What `name` means at the level of `path`
fn next_level(model: &dyn ModelCatalog, path: &EntityPath, name: &str) -> Step {
    if model.is_known_collection(path, name) {
        return Step::Collection(path.child(name, "_"));
    }
    let has_document = || model.resource_flags(path).is_some_and(|f| f.has_document);
    let is_document = || has_document() && model.singular(path) == Some(name);
    match path.kind() {
        EntityKind::Registry if name == MODEL || name == CAPABILITIES => Step::Terminal,
        EntityKind::Resource if name == META => Step::Collection(path.meta()),
        EntityKind::Resource | EntityKind::Version if is_document() => Step::Terminal,
        _ => Step::Unknown,
    }
}
