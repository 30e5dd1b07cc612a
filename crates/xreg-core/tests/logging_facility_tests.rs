#![allow(clippy::unwrap_used, clippy::expect_used)]

use xreg_core::errors::{ExError, ExErrorKind, RegistryError};
use xreg_core::logging_facility::test_capture::init_test_capture;
use xreg_core::xreg_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};
use xreg_core::{log_op_end, log_op_error, log_op_start};

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "xreg_log_op_start_unique_1";

    log_op_start!(op_name);

    let starts: Vec<_> = capture
        .events_for_op(op_name)
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_START))
        .collect();
    assert_eq!(starts.len(), 1, "Should have exactly one start event");
    assert!(starts[0].component.is_some());
}

#[test]
fn test_log_op_end_records_duration() {
    let capture = init_test_capture();
    let op_name = "xreg_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42);

    let events = capture.events_for_op(op_name);
    let end = events
        .iter()
        .find(|e| e.event.as_deref() == Some(EVENT_END))
        .expect("Should have end event");
    assert_eq!(end.duration_ms(), Some(42));
}

#[test]
fn test_log_op_error_includes_code() {
    let capture = init_test_capture();
    let op_name = "xreg_log_op_error_unique_3";

    let err = RegistryError::not_found("/dirs/d1");
    log_op_error!(op_name, err, duration_ms = 10);

    capture.assert_event_exists(op_name, EVENT_END_ERROR);
    let events = capture.events_for_op(op_name);
    assert_eq!(events[0].err_code(), Some("ERR_NOT_FOUND"));
    assert_eq!(events[0].duration_ms(), Some(10));
}

#[test]
fn test_epoch_conflict_logs_conflict_code() {
    let capture = init_test_capture();
    let op_name = "xreg_log_conflict_unique_4";

    let err = RegistryError::EpochMismatch {
        path: "/dirs/d1".to_string(),
        got: 1,
        want: 2,
    };
    log_op_error!(op_name, err.clone(), duration_ms = 3, path = "/dirs/d1");

    let events = capture.events_for_op(op_name);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].err_code(), Some("ERR_CONFLICT"));
    assert_eq!(events[0].field("path"), Some("/dirs/d1"));

    let ex: ExError = err.into();
    assert_eq!(ex.kind(), ExErrorKind::Conflict);
}

#[test]
fn test_start_and_end_pair() {
    let capture = init_test_capture();
    let op_name = "xreg_log_pair_unique_5";

    log_op_start!(op_name, path = "/dirs");
    log_op_end!(op_name, duration_ms = 1);

    let events = capture.events_for_op(op_name);
    let kinds: Vec<_> = events.iter().filter_map(|e| e.event.as_deref()).collect();
    assert_eq!(kinds, vec![EVENT_START, EVENT_END]);
}

#[test]
#[should_panic(expected = "expected start")]
fn test_capture_assert_event_exists_fails() {
    let capture = init_test_capture();
    capture.assert_event_exists("xreg_nonexistent_op_unique_999", EVENT_START);
}
