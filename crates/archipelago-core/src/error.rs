//! Error types for archipelago.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using archipelago's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], used by callers to decide how to
/// surface it (status code, log level, retry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Entity (or link) absent.
    NotFound,
    /// Caller's access level is below the operation's minimum.
    Forbidden,
    /// Name collision or already-existing link.
    Conflict,
    /// Empty name, malformed id, unknown access level.
    InvalidInput,
    /// Caller identity could not be established.
    Unauthorized,
    /// Store, transaction, or downstream service failure.
    Unavailable,
}

/// Core error type for archipelago operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Directory not found
    #[error("Directory not found: {0}")]
    DirectoryNotFound(i64),

    /// Note not found
    #[error("Note not found: {0}")]
    NoteNotFound(Uuid),

    /// Tag not found
    #[error("Tag not found: {0}")]
    TagNotFound(Uuid),

    /// Summary not found
    #[error("Summary not found: {0}")]
    SummaryNotFound(Uuid),

    /// The tag is not linked to the note
    #[error("Tag-note link not found: tag {tag_id}, note {note_id}")]
    TagLinkNotFound { tag_id: Uuid, note_id: Uuid },

    /// The two tags are not linked to each other
    #[error("Tag-to-tag link not found: {tag1_id} and {tag2_id}")]
    TagsLinkNotFound { tag1_id: Uuid, tag2_id: Uuid },

    /// The two tags are already linked to each other
    #[error("Tags are already linked: {tag1_id} and {tag2_id}")]
    TagsAlreadyLinked { tag1_id: Uuid, tag2_id: Uuid },

    /// Uniqueness or state conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Authenticated but not authorized
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Caller identity missing or unresolvable
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// HTTP/network request to an advisory service failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_)
            | Error::DirectoryNotFound(_)
            | Error::NoteNotFound(_)
            | Error::TagNotFound(_)
            | Error::SummaryNotFound(_)
            | Error::TagLinkNotFound { .. }
            | Error::TagsLinkNotFound { .. } => ErrorKind::NotFound,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::Conflict(_) | Error::TagsAlreadyLinked { .. } => ErrorKind::Conflict,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::Database(_)
            | Error::Request(_)
            | Error::Serialization(_)
            | Error::Config(_)
            | Error::Internal(_) => ErrorKind::Unavailable,
        }
    }

    /// Whether a caller may reasonably retry the failed operation.
    ///
    /// Only store/transport failures qualify; nothing inside the core retries.
    /// A missing configuration or a malformed response stays failed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Request(_))
    }

    /// Whether this is an expected, caller-facing outcome rather than a defect.
    pub fn is_expected(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Unavailable)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("test resource".to_string());
        assert_eq!(err.to_string(), "Not found: test resource");
    }

    #[test]
    fn test_error_display_directory_not_found() {
        let err = Error::DirectoryNotFound(42);
        assert_eq!(err.to_string(), "Directory not found: 42");
    }

    #[test]
    fn test_error_display_note_not_found() {
        let id = Uuid::nil();
        let err = Error::NoteNotFound(id);
        assert_eq!(err.to_string(), format!("Note not found: {}", id));
    }

    #[test]
    fn test_error_display_tag_link_not_found() {
        let tag_id = Uuid::new_v4();
        let note_id = Uuid::new_v4();
        let err = Error::TagLinkNotFound { tag_id, note_id };
        let msg = err.to_string();
        assert!(msg.contains(&tag_id.to_string()));
        assert!(msg.contains(&note_id.to_string()));
    }

    #[test]
    fn test_kind_not_found_family() {
        let id = Uuid::new_v4();
        assert_eq!(Error::TagNotFound(id).kind(), ErrorKind::NotFound);
        assert_eq!(Error::SummaryNotFound(id).kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::TagsLinkNotFound {
                tag1_id: id,
                tag2_id: id
            }
            .kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_kind_conflict_family() {
        let id = Uuid::new_v4();
        assert_eq!(
            Error::TagsAlreadyLinked {
                tag1_id: id,
                tag2_id: id
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            Error::Conflict("dup".to_string()).kind(),
            ErrorKind::Conflict
        );
    }

    #[test]
    fn test_only_transport_failures_are_retryable() {
        assert!(Error::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(Error::Request("connection reset".to_string()).is_retryable());
        let unconfigured = Error::Config("Tag suggestion is not configured".to_string());
        assert_eq!(unconfigured.kind(), ErrorKind::Unavailable);
        assert!(!unconfigured.is_retryable());
        assert!(!Error::Serialization("bad json".to_string()).is_retryable());
        assert!(!Error::Internal("boom".to_string()).is_retryable());
        assert!(!Error::Forbidden("read only".to_string()).is_retryable());
        assert!(!Error::NoteNotFound(Uuid::nil()).is_retryable());
        assert!(!Error::InvalidInput("empty".to_string()).is_retryable());
    }

    #[test]
    fn test_forbidden_is_expected() {
        assert!(Error::Forbidden("nope".to_string()).is_expected());
        assert!(!Error::Internal("boom".to_string()).is_expected());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
