//! Default-version state machine
//!
//! A resource is either sticky (the pointer stays where a client put it) or
//! floating (the pointer tracks the newest version). "Newest" orders by
//! `createdat` and breaks ties with the byte-wise greatest version id.

use chrono::{DateTime, Utc};
use xreg_core_types::attrs::{CREATEDAT, VERSIONS};

use super::context::OpContext;
use super::entity_ops::create_entity;
use super::version_ops::next_version_id;
use crate::commands::{DefaultWrite, SetDefault};
use crate::errors::{RegistryError, Result};
use crate::model::{EntityPath, Props};

/// Sort key giving the "newest" order of versions
pub fn version_order_key(vid: &str, props: &Props) -> (Option<DateTime<Utc>>, String) {
    let created = props
        .get_str(CREATEDAT)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc));
    (created, vid.to_string())
}

/// Version ids of `resource` from oldest to newest
///
/// # Errors
///
/// Returns store errors.
pub fn ordered_versions(ctx: &OpContext<'_>, resource: &EntityPath, vids: &[String]) -> Result<Vec<String>> {
    let mut keyed = Vec::with_capacity(vids.len());
    for vid in vids {
        let props = ctx
            .load(&resource.version(vid))?
            .map(|e| e.props)
            .unwrap_or_default();
        keyed.push(version_order_key(vid, &props));
    }
    keyed.sort();
    Ok(keyed.into_iter().map(|(_, vid)| vid).collect())
}

fn require_version(resource: &EntityPath, vids: &[String], vid: &str) -> Result<()> {
    if vids.iter().any(|v| v == vid) {
        Ok(())
    } else {
        Err(RegistryError::invalid_data(format!(
            "Version \"{}\" does not exist in \"{}\"",
            vid, resource
        )))
    }
}

/// Bring a resource back to a consistent state after a write
///
/// Creates an initial version when none exists, applies explicit default
/// fields and `setdefaultversionid`, re-selects the default, and prunes the
/// oldest non-default versions beyond `maxversions`. Meta's epoch moves
/// only when its visible state changes.
///
/// # Errors
///
/// Returns `InvalidData` for a default naming a missing version and
/// `InvalidState` for a sticky default on a type with `maxversions == 1`.
pub fn settle_resource(
    ctx: &mut OpContext<'_>,
    resource: &EntityPath,
    default: &DefaultWrite,
    set_default: Option<&SetDefault>,
) -> Result<()> {
    let Some(mut meta) = ctx.load_meta(resource)? else {
        return Ok(());
    };
    if meta.xref().is_some() {
        return Ok(());
    }
    let flags = ctx
        .model
        .resource_flags(resource)
        .ok_or_else(|| RegistryError::not_found(resource.key()))?;

    let mut vids = ctx.children(resource, VERSIONS)?;
    if vids.is_empty() {
        let vid = next_version_id(ctx, resource, &mut meta)?;
        let mut version = create_entity(ctx, &resource.version(&vid))?;
        ctx.save(&mut version)?;
        ctx.note_version(resource, &vid);
        vids.push(vid);
    }

    let before = (
        meta.default_version_id().map(str::to_string),
        meta.is_sticky(),
    );
    let mut sticky = match default.sticky {
        Some(Some(b)) => b,
        Some(None) => false,
        None => before.1,
    };
    let mut chosen: Option<String> = None;
    if let Some(Some(id)) = &default.id {
        if sticky {
            require_version(resource, &vids, id)?;
            chosen = Some(id.clone());
        }
    }
    let mut use_request = false;
    match set_default {
        Some(SetDefault::Version(id)) => {
            require_version(resource, &vids, id)?;
            chosen = Some(id.clone());
            sticky = true;
        }
        Some(SetDefault::Request) => use_request = true,
        Some(SetDefault::Float) => {
            sticky = false;
            chosen = None;
        }
        None => {}
    }
    if sticky && flags.max_versions == 1 {
        return Err(RegistryError::invalid_state(format!(
            "Resource \"{}\" does not support versioning; its default version cannot be sticky",
            resource
        )));
    }

    let ordered = ordered_versions(ctx, resource, &vids)?;
    let newest = ordered.last().cloned().unwrap_or_default();
    let requested = ctx
        .last_version(resource)
        .filter(|v| vids.iter().any(|x| x.as_str() == *v))
        .map(str::to_string);
    let existing = before.0.clone().filter(|v| vids.contains(v));

    let target = match (use_request, requested) {
        (true, Some(vid)) => vid,
        _ if sticky => chosen.or(existing).unwrap_or_else(|| newest.clone()),
        _ => newest.clone(),
    };
    meta.set_default_version_id(Some(&target));
    meta.set_sticky(sticky);

    if flags.max_versions > 0 {
        let max = usize::try_from(flags.max_versions).unwrap_or(usize::MAX);
        let mut count = ordered.len();
        for vid in &ordered {
            if count <= max {
                break;
            }
            if vid == &target {
                continue;
            }
            tracing::debug!(resource = %resource, version = %vid, "pruning beyond maxversions");
            ctx.delete(&resource.version(vid))?;
            count -= 1;
        }
    }

    let after = (meta.default_version_id().map(str::to_string), meta.is_sticky());
    if after != before {
        ctx.save(&mut meta)
    } else {
        ctx.save_quiet(&meta)
    }
}

/// Move the default-version pointer without writing anything else
///
/// # Errors
///
/// As [`settle_resource`]; `NotFound` when the resource does not exist.
pub fn set_default_version(
    ctx: &mut OpContext<'_>,
    resource: &EntityPath,
    choice: &SetDefault,
) -> Result<()> {
    if ctx.load_meta(resource)?.is_none() {
        return Err(RegistryError::not_found(resource.key()));
    }
    settle_resource(ctx, resource, &DefaultWrite::default(), Some(choice))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tie_breaks_on_greatest_id() {
        let mut props = Props::new();
        props.set(CREATEDAT, json!("2024-01-01T00:00:00Z"));
        let v10 = version_order_key("v10", &props);
        let v2 = version_order_key("v2", &props);
        assert!(v2 > v10);
    }

    #[test]
    fn test_later_createdat_wins_over_id() {
        let mut early = Props::new();
        early.set(CREATEDAT, json!("2024-01-01T00:00:00Z"));
        let mut late = Props::new();
        late.set(CREATEDAT, json!("2024-01-01T00:00:01+00:00"));
        assert!(version_order_key("a", &late) > version_order_key("z", &early));
    }
}
