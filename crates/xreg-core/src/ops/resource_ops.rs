use serde_json::json;
use xreg_core_types::attrs::{DEFAULTVERSIONID, DEFAULTVERSIONSTICKY, VERSIONS, XREF};

use super::attributes::write_attributes;
use super::context::OpContext;
use super::entity_ops::{create_entity, ensure_group};
use super::version_ops::upsert_version;
use crate::commands::{MetaWrite, VersionWrite, WriteMode};
use crate::errors::{RegistryError, Result};
use crate::model::{Entity, EntityKind, EntityPath, EntityRecord, Meta};

/// # Errors
///
/// Returns `ReadOnly` when the resource type is read-only, `NotFound` when
/// the model has no such type.
pub fn check_writable(ctx: &OpContext<'_>, resource: &EntityPath) -> Result<()> {
    let flags = ctx
        .model
        .resource_flags(resource)
        .ok_or_else(|| RegistryError::not_found(resource.key()))?;
    if flags.read_only {
        return Err(RegistryError::ReadOnly {
            path: resource.key(),
        });
    }
    Ok(())
}

/// Load the resource's Meta, creating group, resource and Meta as needed
///
/// # Errors
///
/// Returns `ReadOnly`, id errors or store errors.
pub fn ensure_resource(ctx: &mut OpContext<'_>, resource: &EntityPath) -> Result<Meta> {
    check_writable(ctx, resource)?;
    if let Some(meta) = ctx.load_meta(resource)? {
        return Ok(meta);
    }
    if let Some(group) = resource.group_path() {
        ensure_group(ctx, &group)?;
    }
    create_entity(ctx, resource)?;
    ctx.save_quiet(&Entity::new(resource.clone()))?;

    let mut meta = Meta::new(ctx.create(resource.meta()));
    meta.set_sticky(false);
    ctx.save_quiet(&meta)?;
    Ok(meta)
}

/// Validate an xref value for `resource`
///
/// # Errors
///
/// Returns `InvalidData` when the target is malformed, of another type,
/// the resource itself, missing, or itself an xref.
fn check_xref_target(ctx: &OpContext<'_>, resource: &EntityPath, target: &str) -> Result<EntityPath> {
    let bad = |why: &str| RegistryError::invalid_data(format!("Invalid \"xref\" value \"{}\": {}", target, why));
    let path = EntityPath::from_key(target).map_err(|_| bad("must be a resource path"))?;
    if path.kind() != EntityKind::Resource || !target.starts_with('/') {
        return Err(bad("must be a resource path"));
    }
    if path.group_type() != resource.group_type() || path.resource_type() != resource.resource_type() {
        return Err(bad("must reference a resource of the same type"));
    }
    if &path == resource {
        return Err(bad("must not reference itself"));
    }
    let target_meta = ctx.load_meta(&path)?.ok_or_else(|| bad("target does not exist"))?;
    if target_meta.xref().is_some() {
        return Err(bad("target is itself a cross-reference"));
    }
    Ok(path)
}

/// Turn `resource` into a cross-reference to `target`
///
/// # Errors
///
/// Returns xref validation or store errors.
fn set_xref(ctx: &mut OpContext<'_>, resource: &EntityPath, mut meta: Meta, target: &str) -> Result<()> {
    let target = check_xref_target(ctx, resource, target)?.key();
    if meta.xref() == Some(target.as_str()) {
        return Ok(());
    }
    if meta.xref().is_none() {
        for vid in ctx.children(resource, VERSIONS)? {
            ctx.delete(&resource.version(&vid))?;
        }
        meta.freeze();
    }
    meta.props_mut().set(XREF, json!(target));
    tracing::debug!(resource = %resource, xref = %target, "xref set");
    ctx.save(&mut meta)
}

/// Restore a cross-reference to a normal resource
///
/// # Errors
///
/// Returns store errors.
fn unset_xref(ctx: &mut OpContext<'_>, meta: &mut Meta) -> Result<()> {
    let previous = meta.epoch();
    let now = ctx.now().to_string();
    meta.thaw(&now);
    tracing::debug!(meta = %meta.path(), "xref removed");
    ctx.save_as_touched(meta, previous)
}

/// # Errors
///
/// Returns `InvalidState` when attributes are written to a cross-reference,
/// plus xref, id, validation, concurrency and store errors.
pub fn upsert_resource(
    ctx: &mut OpContext<'_>,
    resource: &EntityPath,
    mode: WriteMode,
    version: Option<&VersionWrite>,
    meta_write: Option<&MetaWrite>,
) -> Result<()> {
    let mut meta = ensure_resource(ctx, resource)?;

    if let Some(mw) = meta_write {
        match &mw.xref {
            Some(Some(target)) => return set_xref(ctx, resource, meta, target),
            Some(None) if meta.xref().is_some() => unset_xref(ctx, &mut meta)?,
            None if mode == WriteMode::Replace && meta.xref().is_some() => {
                unset_xref(ctx, &mut meta)?
            }
            _ => {}
        }
        ctx.check_epoch(&meta, mw.epoch)?;
        write_attributes(
            ctx.model,
            &mut meta,
            &mw.attrs,
            WriteMode::Merge,
            &[DEFAULTVERSIONID, DEFAULTVERSIONSTICKY, XREF],
        )?;
        ctx.save(&mut meta)?;
    }

    let Some(vw) = version else {
        return Ok(());
    };
    if meta.xref().is_some() {
        if vw.is_empty() {
            return Ok(());
        }
        return Err(RegistryError::invalid_state(format!(
            "Resource \"{}\" is a cross-reference; only its \"meta.xref\" may be updated",
            resource
        )));
    }
    let target = vw
        .vid
        .clone()
        .or_else(|| meta.default_version_id().map(str::to_string));
    upsert_version(ctx, resource, target.as_deref(), vw, mode)?;
    Ok(())
}
