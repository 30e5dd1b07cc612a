//! Field and event names used by every structured log line
//!
//! The logging macros write these names; log consumers and the test capture
//! layer read them back.

/// Module path of the code that emitted the event
pub const FIELD_COMPONENT: &str = "component";
/// Registry operation name (`resolve`, `render`, `write`, `delete`)
pub const FIELD_OP: &str = "op";
/// One of the `EVENT_*` values below
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_fields_share_prefix() {
        for f in [FIELD_ERR_KIND, FIELD_ERR_CODE] {
            assert!(f.starts_with("err."), "{}", f);
        }
    }

    #[test]
    fn test_every_event_ends_one_way() {
        let events = [EVENT_START, EVENT_END, EVENT_END_ERROR];
        let ends: Vec<_> = events.iter().filter(|e| e.starts_with("end")).collect();
        assert_eq!(ends.len(), 2);
        assert!(!EVENT_START.starts_with("end"));
    }
}
