//! Structured logging
//!
//! A process installs its subscriber once with [`init`]. Engine entry points
//! bracket each operation with [`log_op_start!`](crate::log_op_start) and
//! [`log_op_end!`](crate::log_op_end) or [`log_op_error!`](crate::log_op_error);
//! everything below them logs at `debug`. Tests swap the subscriber for
//! [`init_test_capture`] and assert on the recorded events.
//!
//! ```rust
//! xreg_core::logging_facility::init(xreg_core::logging_facility::Profile::Production);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
