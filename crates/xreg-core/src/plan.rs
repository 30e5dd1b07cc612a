//! Write planning: request body -> ordered command list
//!
//! Planning is pure. It checks everything that can be checked without the
//! store (body shape, id consistency, collection names, document forms) and
//! emits commands depth-first: group, then resource and meta, then versions
//! in body order, then the resource's settle step.

use serde_json::{Map, Value};
use xreg_core_types::attrs::{
    CAPABILITIES, DEFAULTVERSIONID, DEFAULTVERSIONSTICKY, DEFAULTVERSIONURL, EPOCH, ISDEFAULT,
    META, METAURL, MODEL, READONLY, REGISTRYID, SELF, SPECVERSION, VERSIONID, VERSIONS, XID,
    XREF,
};

use crate::catalog::ModelCatalog;
use crate::codec::{extract_document, DocumentInput, DocumentKeys};
use crate::commands::{
    AttrWrite, Command, DefaultWrite, MetaWrite, SetDefault, VersionWrite, WriteMode,
};
use crate::errors::{RegistryError, Result};
use crate::model::{check_id, EntityKind, EntityPath, Target};

/// Derived on output, ignored on input at every level
const DERIVED: &[&str] = &[
    SELF,
    XID,
    ISDEFAULT,
    READONLY,
    SPECVERSION,
    REGISTRYID,
    MODEL,
    CAPABILITIES,
    METAURL,
    DEFAULTVERSIONURL,
];

const VERSIONS_URL: &str = "versionsurl";
const VERSIONS_COUNT: &str = "versionscount";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMethod {
    Put,
    Patch,
    Post,
}

impl WriteMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMethod::Put => "PUT",
            WriteMethod::Patch => "PATCH",
            WriteMethod::Post => "POST",
        }
    }

    fn mode(&self) -> WriteMode {
        match self {
            WriteMethod::Patch => WriteMode::Merge,
            WriteMethod::Put | WriteMethod::Post => WriteMode::Replace,
        }
    }
}

/// Payload of a write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteBody {
    Json(Value),
    /// Document bytes with attributes taken from `xRegistry-*` headers
    Raw {
        bytes: Vec<u8>,
        attrs: Map<String, Value>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub target: Target,
    /// Path carried the `$structure` suffix
    pub structure: bool,
    pub method: WriteMethod,
    pub body: WriteBody,
    /// Process nested collections found in the body
    pub nested: bool,
    pub set_default: Option<SetDefault>,
}

/// What the response of a write renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultRef {
    Entity(EntityPath),
    /// Whichever version the request wrote last for this resource
    LastVersion(EntityPath),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub commands: Vec<Command>,
    pub results: Vec<ResultRef>,
    /// Respond with a map keyed by id instead of a single entity
    pub collection: bool,
}

impl Plan {
    fn single(result: ResultRef) -> Self {
        Self {
            commands: Vec::new(),
            results: vec![result],
            collection: false,
        }
    }

    fn many() -> Self {
        Self {
            commands: Vec::new(),
            results: Vec::new(),
            collection: true,
        }
    }
}

fn not_allowed(method: WriteMethod, target: &Target) -> RegistryError {
    RegistryError::MethodNotAllowed {
        method: method.as_str().to_string(),
        path: target.display_path(),
    }
}

fn as_object<'v>(value: &'v Value, what: &str) -> Result<&'v Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| RegistryError::invalid_data(format!("{} must be a JSON object", what)))
}

/// Build the command list for one write request
///
/// # Errors
///
/// Returns `MethodNotAllowed`, `InvalidState` (PATCH on a raw document,
/// `$structure` on a type without documents), `InvalidData`, `InvalidId`
/// and `IdMismatch`.
pub fn plan_write(model: &dyn ModelCatalog, req: &WriteRequest) -> Result<Plan> {
    let mode = req.method.mode();
    let nested = req.nested;

    if let WriteBody::Raw { .. } = req.body {
        if req.method == WriteMethod::Patch {
            return Err(RegistryError::invalid_state(
                "PATCH is not allowed on a resource's document; use \"$structure\"",
            ));
        }
    }

    match &req.target {
        Target::Entity(path) => match path.kind() {
            EntityKind::Registry => {
                if req.method == WriteMethod::Post {
                    return Err(not_allowed(req.method, &req.target));
                }
                let body = json_body(req)?;
                let mut plan = Plan::single(ResultRef::Entity(path.clone()));
                plan_registry(model, as_object(body, "Registry")?, mode, nested, &mut plan)?;
                Ok(plan)
            }
            EntityKind::Group => {
                if req.method == WriteMethod::Post {
                    return Err(not_allowed(req.method, &req.target));
                }
                let body = json_body(req)?;
                let mut plan = Plan::single(ResultRef::Entity(path.clone()));
                plan_group(model, path, as_object(body, "Group")?, mode, nested, &mut plan)?;
                Ok(plan)
            }
            EntityKind::Resource => plan_resource_target(model, path, req),
            EntityKind::Meta => {
                if req.method == WriteMethod::Post {
                    return Err(not_allowed(req.method, &req.target));
                }
                let body = json_body(req)?;
                let resource = path.resource_path();
                let (meta, default) = parse_meta(model, &resource, as_object(body, "Meta")?)?;
                let mut plan = Plan::single(ResultRef::Entity(path.clone()));
                plan.commands.push(Command::UpsertResource {
                    path: resource.clone(),
                    mode,
                    version: None,
                    meta: Some(meta),
                });
                plan.commands.push(Command::SettleResource {
                    path: resource,
                    default,
                    set_default: req.set_default.clone(),
                });
                Ok(plan)
            }
            EntityKind::Version => {
                if req.method == WriteMethod::Post {
                    return Err(not_allowed(req.method, &req.target));
                }
                let resource = path.resource_path();
                let mut plan = Plan::single(ResultRef::Entity(path.clone()));
                let write = version_write_from(model, &resource, Some(path.id()), req)?;
                plan.commands.push(Command::UpsertVersion {
                    resource: resource.clone(),
                    write,
                    mode,
                });
                plan.commands.push(Command::SettleResource {
                    path: resource,
                    default: DefaultWrite::default(),
                    set_default: req.set_default.clone(),
                });
                Ok(plan)
            }
        },
        Target::Collection { parent, collection } => {
            if req.method == WriteMethod::Put {
                return Err(not_allowed(req.method, &req.target));
            }
            let body = as_object(json_body(req)?, "Collection")?;
            let mut plan = Plan::many();
            match parent.kind() {
                EntityKind::Registry => {
                    for (id, entity) in body {
                        let path = EntityPath::group(collection, id);
                        plan_group(model, &path, as_object(entity, "Group")?, mode, nested, &mut plan)?;
                        plan.results.push(ResultRef::Entity(path));
                    }
                }
                EntityKind::Group => {
                    plan.commands.push(Command::EnsureGroup {
                        path: parent.clone(),
                    });
                    for (id, entity) in body {
                        let path = parent.child(collection, id);
                        let entity = as_object(entity, "Resource")?;
                        plan_resource(model, &path, entity, mode, nested, req.set_default.clone(), &mut plan)?;
                        plan.results.push(ResultRef::Entity(path));
                    }
                }
                _ => {
                    for (id, entity) in body {
                        let entity = as_object(entity, "Version")?;
                        let write = plan_version(model, parent, Some(id), entity)?;
                        plan.commands.push(Command::UpsertVersion {
                            resource: parent.clone(),
                            write,
                            mode,
                        });
                        plan.results.push(ResultRef::Entity(parent.version(id)));
                    }
                    plan.commands.push(Command::SettleResource {
                        path: parent.clone(),
                        default: DefaultWrite::default(),
                        set_default: req.set_default.clone(),
                    });
                }
            }
            Ok(plan)
        }
    }
}

fn json_body(req: &WriteRequest) -> Result<&Value> {
    match &req.body {
        WriteBody::Json(v) => Ok(v),
        WriteBody::Raw { .. } => Err(RegistryError::invalid_state(
            "A document body is only accepted on a resource or version",
        )),
    }
}

/// True when the request addresses the document (not `$structure`) form
fn is_raw_form(model: &dyn ModelCatalog, resource: &EntityPath, req: &WriteRequest) -> Result<bool> {
    let has_document = model
        .resource_flags(resource)
        .ok_or_else(|| RegistryError::not_found(resource.key()))?
        .has_document;
    if req.structure && !has_document {
        return Err(RegistryError::invalid_state(format!(
            "\"$structure\" is not valid for \"{}\", it has no document",
            resource
        )));
    }
    Ok(has_document && !req.structure)
}

fn plan_resource_target(model: &dyn ModelCatalog, path: &EntityPath, req: &WriteRequest) -> Result<Plan> {
    let mode = req.method.mode();
    let raw = is_raw_form(model, path, req)?;

    if req.method == WriteMethod::Post {
        let mut plan = Plan::single(ResultRef::LastVersion(path.clone()));
        let write = if raw {
            raw_version_write(model, path, None, req)?
        } else {
            plan_version(model, path, None, as_object(json_body(req)?, "Version")?)?
        };
        plan.commands.push(Command::UpsertVersion {
            resource: path.clone(),
            write,
            mode,
        });
        plan.commands.push(Command::SettleResource {
            path: path.clone(),
            default: DefaultWrite::default(),
            set_default: req.set_default.clone(),
        });
        return Ok(plan);
    }

    let mut plan = Plan::single(ResultRef::Entity(path.clone()));
    if raw {
        let write = raw_version_write(model, path, None, req)?;
        plan.commands.push(Command::UpsertResource {
            path: path.clone(),
            mode,
            version: Some(write),
            meta: None,
        });
        plan.commands.push(Command::SettleResource {
            path: path.clone(),
            default: DefaultWrite::default(),
            set_default: req.set_default.clone(),
        });
    } else {
        let body = as_object(json_body(req)?, "Resource")?;
        plan_resource(model, path, body, mode, req.nested, req.set_default.clone(), &mut plan)?;
    }
    Ok(plan)
}

fn version_write_from(
    model: &dyn ModelCatalog,
    resource: &EntityPath,
    vid: Option<&str>,
    req: &WriteRequest,
) -> Result<VersionWrite> {
    if is_raw_form(model, resource, req)? {
        raw_version_write(model, resource, vid, req)
    } else {
        plan_version(model, resource, vid, as_object(json_body(req)?, "Version")?)
    }
}

fn take_epoch(value: &Value) -> Result<Option<i64>> {
    match value {
        Value::Null => Ok(None),
        v => v.as_i64().filter(|n| *n >= 0).map(Some).ok_or_else(|| {
            RegistryError::invalid_data("Attribute \"epoch\" must be an unsigned integer")
        }),
    }
}

fn check_id_attr(attr: &str, expected: &str, value: &Value) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::String(s) if s == expected => Ok(()),
        other => Err(RegistryError::IdMismatch {
            attr: attr.to_string(),
            expected: expected.to_string(),
            got: other.as_str().map_or_else(|| other.to_string(), str::to_string),
        }),
    }
}

/// Attributes of one entity plus the nested collections found in its body
struct Parts {
    write: AttrWrite,
    nested: Vec<(String, Value)>,
}

fn split(
    model: &dyn ModelCatalog,
    path: &EntityPath,
    body: &Map<String, Value>,
    id_attrs: &[(String, String)],
    ignored: &[&str],
) -> Result<Parts> {
    let collections = model.collections(path);
    let mut parts = Parts {
        write: AttrWrite::default(),
        nested: Vec::new(),
    };
    for (key, value) in body {
        if key == EPOCH {
            parts.write.epoch = take_epoch(value)?;
            continue;
        }
        if let Some((attr, expected)) = id_attrs.iter().find(|(a, _)| a == key) {
            check_id_attr(attr, expected, value)?;
            continue;
        }
        if DERIVED.contains(&key.as_str()) || ignored.contains(&key.as_str()) {
            continue;
        }
        if collections.iter().any(|c| c == key) {
            parts.nested.push((key.clone(), value.clone()));
            continue;
        }
        let derived_collection_attr = collections
            .iter()
            .any(|c| key.strip_prefix(c.as_str()).is_some_and(|rest| rest == "url" || rest == "count"));
        if derived_collection_attr {
            continue;
        }
        parts.write.attrs.insert(key.clone(), value.clone());
    }
    Ok(parts)
}

fn plan_registry(
    model: &dyn ModelCatalog,
    body: &Map<String, Value>,
    mode: WriteMode,
    nested: bool,
    plan: &mut Plan,
) -> Result<()> {
    let root = EntityPath::root();
    let parts = split(model, &root, body, &[], &[])?;
    plan.commands.push(Command::UpsertRegistry {
        write: parts.write,
        mode,
    });
    if nested {
        for (plural, groups) in parts.nested {
            if groups.is_null() {
                continue;
            }
            for (id, group) in as_object(&groups, "Group collection")? {
                let path = EntityPath::group(&plural, id);
                plan_group(model, &path, as_object(group, "Group")?, mode, nested, plan)?;
            }
        }
    }
    Ok(())
}

fn plan_group(
    model: &dyn ModelCatalog,
    path: &EntityPath,
    body: &Map<String, Value>,
    mode: WriteMode,
    nested: bool,
    plan: &mut Plan,
) -> Result<()> {
    check_id(path.id())?;
    let singular = model
        .singular(path)
        .ok_or_else(|| RegistryError::not_found(path.key()))?;
    let id_attrs = [(format!("{}id", singular), path.id().to_string())];
    let parts = split(model, path, body, &id_attrs, &[])?;
    plan.commands.push(Command::UpsertGroup {
        path: path.clone(),
        write: parts.write,
        mode,
    });
    if nested {
        for (plural, resources) in parts.nested {
            if resources.is_null() {
                continue;
            }
            for (id, resource) in as_object(&resources, "Resource collection")? {
                let rpath = path.child(&plural, id);
                plan_resource(model, &rpath, as_object(resource, "Resource")?, mode, nested, None, plan)?;
            }
        }
    }
    Ok(())
}

fn plan_resource(
    model: &dyn ModelCatalog,
    path: &EntityPath,
    body: &Map<String, Value>,
    mode: WriteMode,
    nested: bool,
    set_default: Option<SetDefault>,
    plan: &mut Plan,
) -> Result<()> {
    check_id(path.id())?;
    let mut body = body.clone();
    let meta_body = body.remove(META);
    let target_vid = match body.remove(VERSIONID) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            return Err(RegistryError::invalid_data(format!(
                "Attribute \"versionid\" must be a string, not {}",
                other
            )))
        }
    };

    let (meta, default) = match &meta_body {
        Some(Value::Null) | None => (None, DefaultWrite::default()),
        Some(v) => {
            let (m, d) = parse_meta(model, path, as_object(v, "Meta")?)?;
            (Some(m), d)
        }
    };
    let xref_set = matches!(&meta, Some(MetaWrite { xref: Some(Some(_)), .. }));

    let mut version = plan_version(model, path, None, &body)?;
    version.vid = target_vid;
    let versions = body.get(VERSIONS).filter(|v| !v.is_null());
    let has_versions = nested && versions.is_some();

    let version = if xref_set || has_versions || (meta.is_some() && version.is_empty()) {
        None
    } else {
        Some(version)
    };
    plan.commands.push(Command::UpsertResource {
        path: path.clone(),
        mode,
        version,
        meta,
    });

    if has_versions && !xref_set {
        if let Some(versions) = versions {
            for (vid, vbody) in as_object(versions, "Version collection")? {
                let write = plan_version(model, path, Some(vid), as_object(vbody, "Version")?)?;
                plan.commands.push(Command::UpsertVersion {
                    resource: path.clone(),
                    write,
                    mode,
                });
            }
        }
    }
    plan.commands.push(Command::SettleResource {
        path: path.clone(),
        default,
        set_default,
    });
    Ok(())
}

/// Version content from a JSON body; `vid` is the id from the URL or map key
fn plan_version(
    model: &dyn ModelCatalog,
    resource: &EntityPath,
    vid: Option<&str>,
    body: &Map<String, Value>,
) -> Result<VersionWrite> {
    let rmodel = model
        .resource_model(resource)
        .ok_or_else(|| RegistryError::not_found(resource.key()))?;
    let mut id_attrs = vec![(format!("{}id", rmodel.singular), resource.id().to_string())];
    let mut client_vid = vid.map(str::to_string);
    match vid {
        Some(v) => {
            check_id(v)?;
            id_attrs.push((VERSIONID.to_string(), v.to_string()));
        }
        None => {
            if let Some(v) = body.get(VERSIONID).and_then(Value::as_str) {
                client_vid = Some(v.to_string());
            }
        }
    }
    let ignored = [
        XREF,
        DEFAULTVERSIONID,
        DEFAULTVERSIONSTICKY,
        VERSIONID,
        META,
        VERSIONS,
        VERSIONS_URL,
        VERSIONS_COUNT,
    ];
    let mut parts = split(model, &resource.version("_"), body, &id_attrs, &ignored)?;
    let doc = if rmodel.hasdocument {
        extract_document(&mut parts.write.attrs, &DocumentKeys::new(&rmodel.singular))?
    } else {
        None
    };
    Ok(VersionWrite {
        vid: client_vid,
        epoch: parts.write.epoch,
        attrs: parts.write.attrs,
        doc,
    })
}

/// Version content from a raw document body and `xRegistry-*` headers
fn raw_version_write(
    model: &dyn ModelCatalog,
    resource: &EntityPath,
    vid: Option<&str>,
    req: &WriteRequest,
) -> Result<VersionWrite> {
    let WriteBody::Raw { bytes, attrs } = &req.body else {
        return Err(RegistryError::invalid_data("Expected a document body"));
    };
    let mut write = plan_version(model, resource, vid, attrs)?;
    if write.doc.is_none() {
        write.doc = Some(DocumentInput::Bytes(bytes.clone()));
    }
    Ok(write)
}

fn parse_meta(
    model: &dyn ModelCatalog,
    resource: &EntityPath,
    body: &Map<String, Value>,
) -> Result<(MetaWrite, DefaultWrite)> {
    let singular = model
        .singular(resource)
        .ok_or_else(|| RegistryError::not_found(resource.key()))?;
    let id_attrs = [(format!("{}id", singular), resource.id().to_string())];
    let ignored = [XREF, DEFAULTVERSIONID, DEFAULTVERSIONSTICKY];
    let parts = split(model, &resource.meta(), body, &id_attrs, &ignored)?;

    let xref = match body.get(XREF) {
        None => None,
        Some(Value::Null) => Some(None),
        Some(Value::String(s)) if s.is_empty() => Some(None),
        Some(Value::String(s)) => Some(Some(s.clone())),
        Some(other) => {
            return Err(RegistryError::invalid_data(format!(
                "Attribute \"xref\" must be a string, not {}",
                other
            )))
        }
    };
    let id = match body.get(DEFAULTVERSIONID) {
        None => None,
        Some(Value::Null) => Some(None),
        Some(Value::String(s)) => Some(Some(s.clone())),
        Some(other) => {
            return Err(RegistryError::invalid_data(format!(
                "Attribute \"defaultversionid\" must be a string, not {}",
                other
            )))
        }
    };
    let sticky = match body.get(DEFAULTVERSIONSTICKY) {
        None => None,
        Some(Value::Null) => Some(None),
        Some(Value::Bool(b)) => Some(Some(*b)),
        Some(other) => {
            return Err(RegistryError::invalid_data(format!(
                "Attribute \"defaultversionsticky\" must be a boolean, not {}",
                other
            )))
        }
    };

    Ok((
        MetaWrite {
            epoch: parts.write.epoch,
            xref,
            attrs: parts.write.attrs,
        },
        DefaultWrite { id, sticky },
    ))
}
