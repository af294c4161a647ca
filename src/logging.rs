//! Helper macros enforcing consistent session log fields.
//!
//! Every event emitted from the session and transport layers carries `session` (and `peer`
//! when the remote address is known) so one connection's lines can be filtered out of a
//! busy log.

/// Log a session-scoped event. The event name becomes the message; extra fields are
/// recorded with their `Display` form.
#[macro_export]
macro_rules! bridge_event {
    ($level:ident, $event:expr, session = $session:expr, peer = $peer:expr $(, $field:ident = $value:expr )* $(,)?) => {
        ::tracing::$level!(
            session = %$session,
            peer = %$peer,
            $($field = %$value,)*
            "{}",
            $event
        )
    };
    ($level:ident, $event:expr, session = $session:expr $(, $field:ident = $value:expr )* $(,)?) => {
        ::tracing::$level!(
            session = %$session,
            $($field = %$value,)*
            "{}",
            $event
        )
    };
}
