//! Domain models: directories, notes, access grants, tags, summaries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AccessLevel, Error, Result};

// =============================================================================
// DIRECTORIES
// =============================================================================

/// Materialized path of a directory: the ids of its ancestors, root-first.
///
/// A root directory has an empty path. The path never contains the
/// directory's own id; [`MaterializedPath::child`] produces the path a child
/// of this directory would have.
///
/// The textual form is the dot-joined id chain (`"1.2.3"`, `""` for roots),
/// which is also the label syntax of PostgreSQL `ltree`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterializedPath(Vec<i64>);

impl MaterializedPath {
    /// Path of a root directory.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_ancestors(ancestors: Vec<i64>) -> Self {
        Self(ancestors)
    }

    pub fn ancestors(&self) -> &[i64] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Immediate parent, `None` for roots.
    pub fn parent_id(&self) -> Option<i64> {
        self.0.last().copied()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.0.contains(&id)
    }

    /// Path of a directory whose parent has this path and the given id.
    pub fn child(&self, id: i64) -> Self {
        let mut chain = Vec::with_capacity(self.0.len() + 1);
        chain.extend_from_slice(&self.0);
        chain.push(id);
        Self(chain)
    }

    /// Dot-joined key of the chain.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MaterializedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for id in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", id)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for MaterializedPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::root());
        }
        s.split('.')
            .map(|label| {
                label
                    .parse::<i64>()
                    .map_err(|_| Error::InvalidInput(format!("Malformed directory path '{}'", s)))
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

/// A directory node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    pub id: i64,
    pub name: String,
    /// Ancestor chain, root-first.
    pub path: MaterializedPath,
}

impl Directory {
    /// Ancestor chain plus this directory's own id.
    pub fn full_path(&self) -> MaterializedPath {
        self.path.child(self.id)
    }

    pub fn parent_id(&self) -> Option<i64> {
        self.path.parent_id()
    }

    pub fn is_root(&self) -> bool {
        self.path.is_root()
    }
}

// =============================================================================
// NOTES
// =============================================================================

/// A note. Content lives behind `automerge_url`; the store only keeps the handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub dir_id: i64,
    pub title: String,
    pub automerge_url: String,
    pub creator_id: Uuid,
    pub default_access: AccessLevel,
}

/// Request for creating a new note.
#[derive(Debug, Clone)]
pub struct CreateNoteRequest {
    pub dir_id: i64,
    pub title: String,
    pub automerge_url: String,
    pub creator_id: Uuid,
    /// Defaults to [`AccessLevel::None`] (private) when absent.
    pub default_access: Option<AccessLevel>,
}

/// Partial update of a note; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub dir_id: Option<i64>,
    pub automerge_url: Option<String>,
    pub default_access: Option<AccessLevel>,
}

impl UpdateNoteRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.dir_id.is_none()
            && self.automerge_url.is_none()
            && self.default_access.is_none()
    }
}

/// A note together with the effective access of the user it was listed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessibleNote {
    #[serde(flatten)]
    pub note: Note,
    pub access: AccessLevel,
}

/// Explicit per-user access override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteAccessGrant {
    pub note_id: Uuid,
    pub user_id: Uuid,
    pub access: AccessLevel,
}

// =============================================================================
// TAGS
// =============================================================================

/// A tag. Names are normalized (see [`crate::tags::normalize_tag_name`]) and unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "tag_id")]
    pub id: Uuid,
    pub name: String,
}

/// A tag reached through the tag-to-tag graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedTag {
    #[serde(flatten)]
    pub tag: Tag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

// =============================================================================
// SUMMARIES
// =============================================================================

/// Requested level of detail of a meeting summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detalization {
    #[default]
    Default,
    Short,
    Long,
}

impl Detalization {
    /// Storage code (SMALLINT).
    pub fn code(&self) -> i16 {
        match self {
            Detalization::Default => 0,
            Detalization::Short => 1,
            Detalization::Long => 2,
        }
    }

    /// Unknown codes fall back to `Default`.
    pub fn from_code(code: i16) -> Self {
        match code {
            1 => Detalization::Short,
            2 => Detalization::Long,
            _ => Detalization::Default,
        }
    }
}

/// A meeting summary produced by an external transcription pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub id: Uuid,
    pub name: String,
    pub text: String,
    pub text_with_role: String,
    pub role: String,
    pub active: bool,
    pub platform: String,
    pub started_at: DateTime<Utc>,
    pub detalization: Detalization,
}

/// Request for saving (upserting) summary text.
#[derive(Debug, Clone)]
pub struct SaveSummaryRequest {
    pub id: Uuid,
    pub text: String,
    pub active: bool,
    pub detalization: Detalization,
    pub platform: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_parse_root() {
        let path: MaterializedPath = "".parse().unwrap();
        assert!(path.is_root());
        assert_eq!(path.parent_id(), None);
        assert_eq!(path.key(), "");
    }

    #[test]
    fn test_path_parse_chain() {
        let path: MaterializedPath = "1.2".parse().unwrap();
        assert_eq!(path.ancestors(), &[1, 2]);
        assert_eq!(path.parent_id(), Some(2));
        assert_eq!(path.depth(), 2);
        assert_eq!(path.to_string(), "1.2");
    }

    #[test]
    fn test_path_parse_garbage() {
        assert!("1.x.3".parse::<MaterializedPath>().is_err());
        assert!("1..3".parse::<MaterializedPath>().is_err());
    }

    #[test]
    fn test_path_child_appends_id() {
        let root = MaterializedPath::root();
        assert_eq!(root.child(7).to_string(), "7");
        assert_eq!(root.child(7).child(9).to_string(), "7.9");
    }

    #[test]
    fn test_directory_full_path_and_parent() {
        let dir = Directory {
            id: 3,
            name: "grandchild".to_string(),
            path: MaterializedPath::from_ancestors(vec![1, 2]),
        };
        assert_eq!(dir.full_path().key(), "1.2.3");
        assert_eq!(dir.parent_id(), Some(2));
        assert!(!dir.is_root());
        assert!(!dir.path.contains(dir.id));
    }

    #[test]
    fn test_update_note_request_is_empty() {
        assert!(UpdateNoteRequest::default().is_empty());
        let req = UpdateNoteRequest {
            title: Some("t".to_string()),
            ..Default::default()
        };
        assert!(!req.is_empty());
    }

    #[test]
    fn test_tag_serializes_id_as_tag_id() {
        let tag = Tag {
            id: Uuid::nil(),
            name: "lemon".to_string(),
        };
        let json = serde_json::to_value(&tag).unwrap();
        assert_eq!(json["tag_id"], Uuid::nil().to_string());
        assert_eq!(json["name"], "lemon");
    }

    #[test]
    fn test_detalization_codes() {
        for d in [Detalization::Default, Detalization::Short, Detalization::Long] {
            assert_eq!(Detalization::from_code(d.code()), d);
        }
        assert_eq!(Detalization::from_code(99), Detalization::Default);
    }
}
