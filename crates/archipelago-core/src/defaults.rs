//! Shared default values.
//!
//! Crates and the server binary reference these constants instead of
//! repeating literals. Grouped by area.

// =============================================================================
// SERVER
// =============================================================================

/// Default bind host.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default HTTP port.
pub const SERVER_PORT: u16 = 8080;

/// Per-request timeout applied by the HTTP layer.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session_id";

/// Default Redis URL for the session store.
pub const REDIS_URL: &str = "redis://127.0.0.1:6379";

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum number of pooled connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Acquire timeout of the pool; bounds every store call.
pub const DB_ACQUIRE_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// TAGS
// =============================================================================

/// Maximum length of a normalized tag name, in characters.
pub const TAG_NAME_MAX_LEN: usize = 80;

/// Minimum length of a suggested tag, in characters.
pub const SUGGESTED_TAG_MIN_LEN: usize = 2;

/// Number of tags suggested when the caller does not ask for a count.
pub const SUGGESTED_TAG_COUNT: usize = 3;

/// Upper bound on the number of tags a caller may ask to be suggested.
pub const SUGGESTED_TAG_COUNT_MAX: usize = 10;

/// Model attempts per suggested tag before giving up on it.
pub const SUGGEST_MAX_ATTEMPTS: usize = 2;

/// Default number of neighbours returned by a closest-tags lookup.
pub const CLOSEST_TAGS_LIMIT: usize = 5;

// =============================================================================
// ADVISORY SERVICES
// =============================================================================

/// Default chat model used for tag suggestion.
pub const SUGGESTER_MODEL: &str = "gpt-4o-mini";

/// Timeout for a single tag suggestion request.
pub const SUGGESTER_TIMEOUT_SECS: u64 = 60;

/// Default Qdrant collection holding tag embeddings.
pub const TAG_GRAPH_COLLECTION: &str = "tags";

/// Default model name on the Triton inference server producing tag embeddings.
pub const INFERER_MODEL: &str = "ensemble_model";

/// Timeout for embedding and vector index requests.
pub const TAG_GRAPH_TIMEOUT_SECS: u64 = 10;
