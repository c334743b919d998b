//! Host lifecycle event names.
//!
//! These are dispatched through the pre-dispatch mapping, so scripts
//! subscribe with `plugin::hook(name, callback)`. Participant events pass a
//! single `#{ slot, name, in_session }` map.

/// A session (map) started. No arguments.
pub const SESSION_START: &str = "session_start";
/// The session ended. No arguments.
pub const SESSION_END: &str = "session_end";
/// A participant took a slot.
pub const PARTICIPANT_CONNECTED: &str = "participant_connected";
/// A participant finished joining the session.
pub const PARTICIPANT_IN_SESSION: &str = "participant_in_session";
/// A participant left.
pub const PARTICIPANT_DISCONNECTED: &str = "participant_disconnected";
/// One host tick. No arguments.
pub const TICK: &str = "tick";
