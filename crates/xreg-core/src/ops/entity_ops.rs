use serde_json::json;
use xreg_core_types::attrs::{REGISTRYID, SPECVERSION};

use super::attributes::write_attributes;
use super::context::{format_timestamp, OpContext};
use crate::capabilities::SPEC_VERSION;
use crate::commands::{AttrWrite, WriteMode};
use crate::errors::{RegistryError, Result};
use crate::model::{check_id, Entity, EntityPath, EntityRecord};
use crate::store::StoreTx;

/// Stamp a new entity after checking its id
///
/// The id must be legal and must not collide, ignoring ASCII case, with an
/// existing sibling.
///
/// # Errors
///
/// Returns `InvalidId` or `DuplicateId`.
pub fn create_entity(ctx: &mut OpContext<'_>, path: &EntityPath) -> Result<Entity> {
    let id = path.id();
    check_id(id)?;
    if let (Some(parent), Some(collection)) = (path.parent(), path.collection()) {
        let clash = ctx
            .children(&parent, collection)?
            .into_iter()
            .find(|sibling| sibling != id && sibling.eq_ignore_ascii_case(id));
        if let Some(existing) = clash {
            return Err(RegistryError::DuplicateId {
                existing,
                requested: id.to_string(),
            });
        }
    }
    tracing::debug!(path = %path, "creating entity");
    Ok(ctx.create(path.clone()))
}

/// Create the registry root row if the store is empty
///
/// # Errors
///
/// Returns `Persistence` on store failure.
pub fn init_registry(tx: &mut dyn StoreTx, registry_id: &str) -> Result<bool> {
    let root = EntityPath::root();
    if tx.get_props(&root)?.is_some() {
        return Ok(false);
    }
    let mut entity = Entity::new(root.clone());
    entity.init(&format_timestamp(chrono::Utc::now()));
    entity.props.set(SPECVERSION, json!(SPEC_VERSION));
    entity.props.set(REGISTRYID, json!(registry_id));
    tx.put_props(&root, &entity.props)?;
    Ok(true)
}

/// # Errors
///
/// Returns `NotFound` if the registry was never initialized, plus any
/// validation or concurrency error.
pub fn upsert_registry(ctx: &mut OpContext<'_>, write: &AttrWrite, mode: WriteMode) -> Result<()> {
    let mut registry = ctx.require(&EntityPath::root())?;
    ctx.check_epoch(&registry, write.epoch)?;
    write_attributes(
        ctx.model,
        &mut registry,
        &write.attrs,
        mode,
        &[SPECVERSION, REGISTRYID],
    )?;
    ctx.save(&mut registry)
}

/// Create `path` if missing; existing groups are left alone
///
/// # Errors
///
/// Returns `InvalidId`, `DuplicateId` or store errors.
pub fn ensure_group(ctx: &mut OpContext<'_>, path: &EntityPath) -> Result<()> {
    if ctx.load(path)?.is_none() {
        let mut group = create_entity(ctx, path)?;
        ctx.save(&mut group)?;
    }
    Ok(())
}

/// # Errors
///
/// Returns id, validation, concurrency or store errors.
pub fn upsert_group(
    ctx: &mut OpContext<'_>,
    path: &EntityPath,
    write: &AttrWrite,
    mode: WriteMode,
) -> Result<()> {
    let mut group = match ctx.load(path)? {
        Some(group) => group,
        None => create_entity(ctx, path)?,
    };
    ctx.check_epoch(&group, write.epoch)?;
    write_attributes(ctx.model, &mut group, &write.attrs, mode, &[])?;
    ctx.save(&mut group)
}
