use xreg_core_types::attrs::VERSIONS;

use super::context::OpContext;
use super::default_version::ordered_versions;
use super::resource_ops::check_writable;
use crate::commands::SetDefault;
use crate::errors::{RegistryError, Result};
use crate::model::{EntityKind, EntityPath};

/// Delete one entity and everything beneath it
///
/// Deleting a resource's last version deletes the resource. Deleting the
/// default version re-points the default: to `set_default` when given
/// (pinned), otherwise to the newest remaining version (floating).
///
/// # Errors
///
/// - `MethodNotAllowed` for the registry and Meta
/// - `NotFound` when `path` does not exist
/// - `EpochMismatch` when `epoch` is stale
pub fn delete_entity(
    ctx: &mut OpContext<'_>,
    path: &EntityPath,
    epoch: Option<i64>,
    set_default: Option<&SetDefault>,
) -> Result<()> {
    match path.kind() {
        EntityKind::Registry | EntityKind::Meta => Err(RegistryError::MethodNotAllowed {
            method: "DELETE".to_string(),
            path: path.key(),
        }),
        EntityKind::Group => {
            let group = ctx.require(path)?;
            ctx.check_epoch(&group, epoch)?;
            ctx.delete(path)
        }
        EntityKind::Resource => {
            check_writable(ctx, path)?;
            let meta = ctx
                .load_meta(path)?
                .ok_or_else(|| RegistryError::not_found(path.key()))?;
            if epoch.is_some() {
                match meta.default_version_id() {
                    Some(vid) => {
                        let version = ctx.require(&path.version(vid))?;
                        ctx.check_epoch(&version, epoch)?;
                    }
                    None => ctx.check_epoch(&meta, epoch)?,
                }
            }
            ctx.delete(path)
        }
        EntityKind::Version => delete_version(ctx, path, epoch, set_default),
    }
}

fn delete_version(
    ctx: &mut OpContext<'_>,
    path: &EntityPath,
    epoch: Option<i64>,
    set_default: Option<&SetDefault>,
) -> Result<()> {
    let resource = path.resource_path();
    check_writable(ctx, &resource)?;
    let version = ctx.require(path)?;
    ctx.check_epoch(&version, epoch)?;

    let remaining: Vec<String> = ctx
        .children(&resource, VERSIONS)?
        .into_iter()
        .filter(|v| v != path.id())
        .collect();
    if remaining.is_empty() {
        tracing::debug!(resource = %resource, "last version deleted; deleting resource");
        return ctx.delete(&resource);
    }
    ctx.delete(path)?;

    let Some(mut meta) = ctx.load_meta(&resource)? else {
        return Ok(());
    };
    let was_default = meta.default_version_id() == Some(path.id());
    let (vid, sticky) = match set_default {
        Some(SetDefault::Version(id)) => {
            if !remaining.contains(id) {
                return Err(RegistryError::invalid_data(format!(
                    "Version \"{}\" does not exist in \"{}\"",
                    id, resource
                )));
            }
            (id.clone(), true)
        }
        Some(SetDefault::Float) => (newest(ctx, &resource, &remaining)?, false),
        _ if was_default => (newest(ctx, &resource, &remaining)?, false),
        _ => return Ok(()),
    };
    meta.set_default_version_id(Some(&vid));
    meta.set_sticky(sticky);
    ctx.save(&mut meta)
}

fn newest(ctx: &OpContext<'_>, resource: &EntityPath, vids: &[String]) -> Result<String> {
    Ok(ordered_versions(ctx, resource, vids)?.pop().unwrap_or_default())
}
