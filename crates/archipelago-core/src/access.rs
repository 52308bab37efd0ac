//! Note access levels and the access resolver.
//!
//! Every note has a creator, a default access level that applies to any
//! authenticated user, and optional per-user overrides. The effective level
//! of a user is decided by [`AccessSnapshot::resolve`]:
//!
//! 1. the creator always holds [`AccessLevel::Manage`];
//! 2. an explicit override wins next, even when it is more restrictive than
//!    the default (an override of [`AccessLevel::None`] revokes access);
//! 3. otherwise the note's default applies.
//!
//! Operations on a note declare a minimum level through
//! [`NoteOperation::required_level`] and are checked with [`authorize`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{Error, Result};

/// Ordered permission tier: `none < read < write < modify < manage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[serde(alias = "empty")]
    None,
    Read,
    Write,
    Modify,
    #[serde(alias = "manage_access")]
    Manage,
}

impl AccessLevel {
    /// All levels, lowest first.
    pub const ALL: [AccessLevel; 5] = [
        AccessLevel::None,
        AccessLevel::Read,
        AccessLevel::Write,
        AccessLevel::Modify,
        AccessLevel::Manage,
    ];

    /// Canonical wire/storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::None => "none",
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
            AccessLevel::Modify => "modify",
            AccessLevel::Manage => "manage",
        }
    }

    /// Whether this level may be used as a note's default access.
    ///
    /// Defaults are capped at `write`: editing metadata and sharing are only
    /// ever granted to specific users.
    pub fn is_valid_default(&self) -> bool {
        *self <= AccessLevel::Write
    }

    /// Whether this level satisfies `required`.
    pub fn satisfies(&self, required: AccessLevel) -> bool {
        *self >= required
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "empty" => Ok(AccessLevel::None),
            "read" => Ok(AccessLevel::Read),
            "write" => Ok(AccessLevel::Write),
            "modify" => Ok(AccessLevel::Modify),
            "manage" | "manage_access" => Ok(AccessLevel::Manage),
            other => Err(Error::InvalidInput(format!(
                "Unknown access level '{}'",
                other
            ))),
        }
    }
}

/// Everything the resolver needs about one note and one caller, read in a
/// single query so that the default and the override cannot skew.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessSnapshot {
    pub note_id: Uuid,
    pub creator_id: Uuid,
    pub default_access: AccessLevel,
    /// Override row for the caller the snapshot was read for, if any.
    pub override_access: Option<AccessLevel>,
}

impl AccessSnapshot {
    /// Effective access level of `user_id` on the note.
    pub fn resolve(&self, user_id: Uuid) -> AccessLevel {
        resolve(self, user_id)
    }
}

/// Effective access level of `user_id` given a note snapshot.
///
/// Pure function: no I/O, no inputs besides the snapshot and the caller.
pub fn resolve(snapshot: &AccessSnapshot, user_id: Uuid) -> AccessLevel {
    if user_id == snapshot.creator_id {
        return AccessLevel::Manage;
    }
    snapshot
        .override_access
        .unwrap_or(snapshot.default_access)
}

/// Operations a caller can attempt on a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteOperation {
    Get,
    ListTags,
    ListSummaries,
    EditContent,
    Update,
    Delete,
    ManageTags,
    AttachSummary,
    SetAccess,
}

impl NoteOperation {
    /// All operations, in the order they are reported to clients.
    pub const ALL: [NoteOperation; 9] = [
        NoteOperation::Get,
        NoteOperation::ListTags,
        NoteOperation::ListSummaries,
        NoteOperation::EditContent,
        NoteOperation::Update,
        NoteOperation::Delete,
        NoteOperation::ManageTags,
        NoteOperation::AttachSummary,
        NoteOperation::SetAccess,
    ];

    /// Minimum access level needed to perform the operation.
    pub fn required_level(&self) -> AccessLevel {
        match self {
            NoteOperation::Get | NoteOperation::ListTags | NoteOperation::ListSummaries => {
                AccessLevel::Read
            }
            NoteOperation::EditContent => AccessLevel::Write,
            NoteOperation::Update
            | NoteOperation::Delete
            | NoteOperation::ManageTags
            | NoteOperation::AttachSummary => AccessLevel::Modify,
            NoteOperation::SetAccess => AccessLevel::Manage,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteOperation::Get => "get",
            NoteOperation::ListTags => "list_tags",
            NoteOperation::ListSummaries => "get_summary_list",
            NoteOperation::EditContent => "edit_content",
            NoteOperation::Update => "update",
            NoteOperation::Delete => "delete",
            NoteOperation::ManageTags => "manage_tags",
            NoteOperation::AttachSummary => "attach_summary",
            NoteOperation::SetAccess => "set_access",
        }
    }
}

impl fmt::Display for NoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check `level` against the minimum of `operation`.
///
/// The error message names only the operation and the levels involved so
/// that a refusal never reveals anything about the note itself.
pub fn authorize(level: AccessLevel, operation: NoteOperation) -> Result<()> {
    let required = operation.required_level();
    if level.satisfies(required) {
        Ok(())
    } else {
        debug!(
            subsystem = "core",
            component = "access",
            op = operation.as_str(),
            access = level.as_str(),
            required = required.as_str(),
            "Operation refused"
        );
        Err(Error::Forbidden(format!(
            "operation '{}' requires '{}' access, caller has '{}'",
            operation, required, level
        )))
    }
}

/// Every operation `level` permits, in [`NoteOperation::ALL`] order.
pub fn allowed_operations(level: AccessLevel) -> Vec<NoteOperation> {
    NoteOperation::ALL
        .iter()
        .copied()
        .filter(|op| level.satisfies(op.required_level()))
        .collect()
}
