use xreg_core_types::attrs::CONTENTTYPE;

use super::attributes::write_attributes;
use super::context::OpContext;
use super::entity_ops::create_entity;
use super::resource_ops::ensure_resource;
use crate::codec::{apply_document, DocumentKeys};
use crate::commands::{VersionWrite, WriteMode};
use crate::errors::{RegistryError, Result};
use crate::model::{check_id, EntityPath, EntityRecord, Meta};

/// Claim the next free server-generated version id
///
/// Skips ids a client already took; the counter is bookkeeping and does not
/// count as a Meta mutation.
///
/// # Errors
///
/// Returns store errors.
pub fn next_version_id(
    ctx: &mut OpContext<'_>,
    resource: &EntityPath,
    meta: &mut Meta,
) -> Result<String> {
    let mut n = meta.next_version_id();
    loop {
        let candidate = n.to_string();
        n += 1;
        if ctx.load(&resource.version(&candidate))?.is_none() {
            meta.set_next_version_id(n);
            ctx.save_quiet(meta)?;
            return Ok(candidate);
        }
    }
}

/// Create or update one version of `resource`
///
/// `target` is the id to write; `None` generates one. Returns the id
/// written.
///
/// # Errors
///
/// - `InvalidState` when the resource is an xref, or the type forbids
///   client-chosen ids for new versions
/// - `ReadOnly` for read-only resource types
/// - id, validation and concurrency errors
pub fn upsert_version(
    ctx: &mut OpContext<'_>,
    resource: &EntityPath,
    target: Option<&str>,
    write: &VersionWrite,
    mode: WriteMode,
) -> Result<String> {
    let model = ctx.model;
    let rmodel = model
        .resource_model(resource)
        .ok_or_else(|| RegistryError::not_found(resource.key()))?;
    let mut meta = ensure_resource(ctx, resource)?;
    if meta.xref().is_some() {
        return Err(RegistryError::invalid_state(format!(
            "Resource \"{}\" is a cross-reference; only its \"meta.xref\" may be updated",
            resource
        )));
    }

    let vid = match target {
        Some(v) => {
            check_id(v)?;
            v.to_string()
        }
        None => next_version_id(ctx, resource, &mut meta)?,
    };
    let vpath = resource.version(&vid);
    let mut version = match ctx.load(&vpath)? {
        Some(v) => v,
        None => {
            let generated = meta.next_version_id().to_string();
            if !rmodel.setversionid && write.vid.as_deref().is_some_and(|v| v != generated) {
                return Err(RegistryError::invalid_state(format!(
                    "Resource type \"{}\" does not allow clients to choose version ids",
                    rmodel.plural
                )));
            }
            create_entity(ctx, &vpath)?
        }
    };
    ctx.check_epoch(&version, write.epoch)?;

    let keys = DocumentKeys::new(&rmodel.singular);
    let preserve: Vec<&str> = if write.doc.is_none() {
        vec![CONTENTTYPE, keys.url.as_str()]
    } else {
        Vec::new()
    };
    write_attributes(model, &mut version, &write.attrs, mode, &preserve)?;
    if let Some(doc) = &write.doc {
        apply_document(
            version.props_mut(),
            doc.clone(),
            &keys,
            write.attrs.contains_key(CONTENTTYPE),
        )?;
    }
    ctx.save(&mut version)?;
    ctx.note_version(resource, &vid);
    tracing::debug!(version = %vpath, "version written");
    Ok(vid)
}
