//! Structured logging field names shared by every archipelago crate.
//!
//! Use these constants as `tracing` field keys so that log queries work the
//! same way across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Store or downstream failure surfaced to a caller |
//! | WARN  | Advisory service failed, request still succeeded |
//! | INFO  | Lifecycle events (startup, shutdown, migrations), mutations |
//! | DEBUG | Access decisions (including refusals), query sizes |
//! | TRACE | Per-row iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "api", "db", "inference", "core"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "notes", "tags", "tag_suggester", "tag_graph"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "create_and_link", "subtree", "set_user_access"
pub const OPERATION: &str = "op";

/// Authenticated caller.
pub const USER_ID: &str = "user_id";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Note UUID being operated on.
pub const NOTE_ID: &str = "note_id";

/// Directory id being operated on.
pub const DIR_ID: &str = "dir_id";

/// Tag UUID being operated on.
pub const TAG_ID: &str = "tag_id";

/// Summary UUID being operated on.
pub const SUMMARY_ID: &str = "summary_id";

/// Effective access level of the caller.
pub const ACCESS: &str = "access";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows or items returned.
pub const RESULT_COUNT: &str = "result_count";

/// Number of directories in an assembled tree.
pub const DIR_COUNT: &str = "dir_count";

/// Number of notes in an assembled tree.
pub const NOTE_COUNT: &str = "note_count";

// ─── Pool fields ───────────────────────────────────────────────────────────

/// Connections currently held by the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";
