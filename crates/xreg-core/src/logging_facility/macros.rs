//! Operation boundary macros
//!
//! Each expands to a single `tracing` event carrying `component`, `op` and
//! `event`, followed by any extra `key = value` fields the caller passes.
//! Call sites need `tracing` as a direct dependency.

/// Start of an operation
///
/// ```
/// # use xreg_core::log_op_start;
/// log_op_start!("write");
/// log_op_start!("write", path = "/dirs/d1");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::xreg_core_types::schema::EVENT_START
            $(, $($field)*)?
        )
    };
}

/// Successful end of an operation; `duration_ms` is mandatory
///
/// ```
/// # use xreg_core::log_op_end;
/// log_op_end!("render", duration_ms = 3, bytes = 120);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::xreg_core_types::schema::EVENT_END,
            duration_ms = $duration
            $(, $($field)*)?
        )
    };
}

/// Failed end of an operation
///
/// The error is converted to an `ExError` so the event carries its stable
/// kind and code.
///
/// ```
/// # use xreg_core::{log_op_error, errors::RegistryError};
/// let err = RegistryError::not_found("/dirs/d1");
/// log_op_error!("resolve", err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {{
        let ex: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::xreg_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?ex.kind(),
            err.code = ex.code()
            $(, $($field)*)?
        )
    }};
}
