//! Apply planned commands inside one request transaction
//!
//! ## Atomicity Contract
//!
//! Commands run in order against the context's transaction. The first
//! error stops the run; the caller then drops the context, which rolls the
//! transaction back, so a failed write leaves no partial state.

use crate::commands::Command;
use crate::errors::Result;
use crate::model::{EntityKind, EntityPath};
use crate::ops::{self, OpContext};

/// Apply one command
///
/// # Errors
///
/// Returns the first validation, concurrency, deadline or store error.
pub fn apply(ctx: &mut OpContext<'_>, cmd: &Command) -> Result<()> {
    match cmd {
        Command::EnsureGroup { path } => ops::ensure_group(ctx, path),

        Command::UpsertRegistry { write, mode } => ops::upsert_registry(ctx, write, *mode),

        Command::UpsertGroup { path, write, mode } => ops::upsert_group(ctx, path, write, *mode),

        Command::UpsertResource {
            path,
            mode,
            version,
            meta,
        } => ops::upsert_resource(ctx, path, *mode, version.as_ref(), meta.as_ref()),

        Command::UpsertVersion {
            resource,
            write,
            mode,
        } => {
            ops::upsert_version(ctx, resource, write.vid.as_deref(), write, *mode)?;
            Ok(())
        }

        Command::SettleResource {
            path,
            default,
            set_default,
        } => ops::settle_resource(ctx, path, default, set_default.as_ref()),

        Command::DeleteEntity {
            path,
            epoch,
            set_default,
            must_exist,
        } => {
            if !*must_exist && !exists(ctx, path)? {
                return Ok(());
            }
            ops::delete_entity(ctx, path, *epoch, set_default.as_ref())
        }
    }
}

/// Apply every command in order, stopping at the first error
///
/// # Errors
///
/// Returns the first error; later commands are not run.
pub fn apply_all(ctx: &mut OpContext<'_>, cmds: &[Command]) -> Result<()> {
    for cmd in cmds {
        apply(ctx, cmd)?;
    }
    Ok(())
}

fn exists(ctx: &OpContext<'_>, path: &EntityPath) -> Result<bool> {
    let probe = match path.kind() {
        EntityKind::Resource => path.meta(),
        _ => path.clone(),
    };
    Ok(ctx.load(&probe)?.is_some())
}
