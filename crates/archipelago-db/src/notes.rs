//! Note repository implementation, including per-user access overrides.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info};
use uuid::Uuid;

use archipelago_core::{
    new_v7, AccessLevel, AccessSnapshot, AccessibleNote, CreateNoteRequest, Error, Note,
    NoteAccessGrant, NoteRepository, Result, UpdateNoteRequest,
};

use crate::is_foreign_key_violation;

const NOTE_COLUMNS: &str = "n.id, n.dir_id, n.title, n.automerge_url, n.creator_id, n.default_access";

fn parse_access(raw: &str) -> Result<AccessLevel> {
    raw.parse()
        .map_err(|_| Error::Internal(format!("Unknown access level '{}' in store", raw)))
}

fn note_from_row(row: &PgRow) -> Result<Note> {
    let default_access: String = row.get("default_access");
    Ok(Note {
        id: row.get("id"),
        dir_id: row.get("dir_id"),
        title: row.get("title"),
        automerge_url: row.get("automerge_url"),
        creator_id: row.get("creator_id"),
        default_access: parse_access(&default_access)?,
    })
}

fn ensure_valid_default(access: AccessLevel) -> Result<()> {
    if access.is_valid_default() {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "Default access cannot be '{}'; allowed: none, read, write",
            access
        )))
    }
}

/// PostgreSQL implementation of NoteRepository.
pub struct PgNoteRepository {
    pool: Pool<Postgres>,
}

impl PgNoteRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn snapshot_from_row(note_id: Uuid, row: &PgRow) -> Result<AccessSnapshot> {
    let default_access: String = row.get("default_access");
    let override_access: Option<String> = row.get("override_access");
    Ok(AccessSnapshot {
        note_id,
        creator_id: row.get("creator_id"),
        default_access: parse_access(&default_access)?,
        override_access: override_access.as_deref().map(parse_access).transpose()?,
    })
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn get(&self, id: Uuid) -> Result<Note> {
        let row = sqlx::query(&format!("SELECT {} FROM note n WHERE n.id = $1", NOTE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::NoteNotFound(id))?;
        note_from_row(&row)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<AccessibleNote>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}, na.access AS override_access
            FROM note n
            LEFT JOIN note_access na ON na.note_id = n.id AND na.user_id = $1
            WHERE n.creator_id = $1
               OR COALESCE(na.access, n.default_access) <> 'none'
            ORDER BY n.title, n.id
            "#,
            NOTE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut notes = Vec::with_capacity(rows.len());
        for row in &rows {
            let note = note_from_row(row)?;
            let access = snapshot_from_row(note.id, row)?.resolve(user_id);
            if access.satisfies(AccessLevel::Read) {
                notes.push(AccessibleNote { note, access });
            }
        }

        debug!(
            subsystem = "db",
            component = "notes",
            op = "list_for_user",
            user_id = %user_id,
            result_count = notes.len(),
            "Listed accessible notes"
        );
        Ok(notes)
    }

    async fn list_by_dir_ids(&self, dir_ids: &[i64]) -> Result<Vec<Note>> {
        if dir_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {} FROM note n WHERE n.dir_id = ANY($1) ORDER BY n.title, n.id",
            NOTE_COLUMNS
        ))
        .bind(dir_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(note_from_row).collect()
    }

    async fn create(&self, req: CreateNoteRequest) -> Result<Note> {
        let default_access = req.default_access.unwrap_or(AccessLevel::None);
        ensure_valid_default(default_access)?;

        let id = new_v7();
        let row = sqlx::query(
            r#"
            INSERT INTO note AS n (id, dir_id, title, automerge_url, creator_id, default_access)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING n.id, n.dir_id, n.title, n.automerge_url, n.creator_id, n.default_access
            "#,
        )
        .bind(id)
        .bind(req.dir_id)
        .bind(&req.title)
        .bind(&req.automerge_url)
        .bind(req.creator_id)
        .bind(default_access.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                Error::DirectoryNotFound(req.dir_id)
            } else {
                Error::Database(e)
            }
        })?;

        info!(
            subsystem = "db",
            component = "notes",
            op = "create",
            note_id = %id,
            dir_id = req.dir_id,
            user_id = %req.creator_id,
            "Note created"
        );
        note_from_row(&row)
    }

    async fn update(&self, id: Uuid, req: UpdateNoteRequest) -> Result<Note> {
        if let Some(access) = req.default_access {
            ensure_valid_default(access)?;
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE note AS n
            SET title = COALESCE($2, n.title),
                dir_id = COALESCE($3, n.dir_id),
                automerge_url = COALESCE($4, n.automerge_url),
                default_access = COALESCE($5, n.default_access)
            WHERE n.id = $1
            RETURNING {}
            "#,
            NOTE_COLUMNS
        ))
        .bind(id)
        .bind(req.title.as_deref())
        .bind(req.dir_id)
        .bind(req.automerge_url.as_deref())
        .bind(req.default_access.map(|a| a.as_str()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match req.dir_id {
            Some(dir_id) if is_foreign_key_violation(&e) => Error::DirectoryNotFound(dir_id),
            _ => Error::Database(e),
        })?
        .ok_or(Error::NoteNotFound(id))?;

        note_from_row(&row)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let exists = sqlx::query("SELECT id FROM note WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?;
        if exists.is_none() {
            return Err(Error::NoteNotFound(id));
        }

        // Tags of this note are locked before their links disappear so the
        // orphan check below sees a stable count.
        let tag_ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT t.tag_id
            FROM tag t
            JOIN tag_to_note ttn ON ttn.tag_id = t.tag_id
            WHERE ttn.note_id = $1
            ORDER BY t.tag_id
            FOR UPDATE OF t
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query("DELETE FROM note WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let collected = sqlx::query(
            r#"
            DELETE FROM tag t
            WHERE t.tag_id = ANY($1)
              AND NOT EXISTS (SELECT 1 FROM tag_to_note ttn WHERE ttn.tag_id = t.tag_id)
            "#,
        )
        .bind(&tag_ids)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "notes",
            op = "delete",
            note_id = %id,
            result_count = collected.rows_affected(),
            "Note deleted, orphaned tags collected"
        );
        Ok(())
    }

    async fn access_snapshot(&self, note_id: Uuid, user_id: Uuid) -> Result<AccessSnapshot> {
        let row = sqlx::query(
            r#"
            SELECT n.creator_id, n.default_access, na.access AS override_access
            FROM note n
            LEFT JOIN note_access na ON na.note_id = n.id AND na.user_id = $2
            WHERE n.id = $1
            "#,
        )
        .bind(note_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::NoteNotFound(note_id))?;

        snapshot_from_row(note_id, &row)
    }

    async fn access_snapshots(
        &self,
        note_ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<Vec<AccessSnapshot>> {
        if note_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT n.id, n.creator_id, n.default_access, na.access AS override_access
            FROM note n
            LEFT JOIN note_access na ON na.note_id = n.id AND na.user_id = $2
            WHERE n.id = ANY($1)
            "#,
        )
        .bind(note_ids)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter()
            .map(|row| snapshot_from_row(row.get("id"), row))
            .collect()
    }

    async fn set_user_access(
        &self,
        note_id: Uuid,
        user_id: Uuid,
        access: AccessLevel,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO note_access (note_id, user_id, access)
            VALUES ($1, $2, $3)
            ON CONFLICT (note_id, user_id) DO UPDATE SET access = EXCLUDED.access
            "#,
        )
        .bind(note_id)
        .bind(user_id)
        .bind(access.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                Error::NoteNotFound(note_id)
            } else {
                Error::Database(e)
            }
        })?;

        info!(
            subsystem = "db",
            component = "notes",
            op = "set_user_access",
            note_id = %note_id,
            user_id = %user_id,
            access = access.as_str(),
            "Access override stored"
        );
        Ok(())
    }

    async fn remove_user_access(&self, note_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM note_access WHERE note_id = $1 AND user_id = $2")
            .bind(note_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_access(&self, note_id: Uuid) -> Result<Vec<NoteAccessGrant>> {
        let rows = sqlx::query(
            "SELECT note_id, user_id, access FROM note_access WHERE note_id = $1 ORDER BY user_id",
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter()
            .map(|r| {
                let access: String = r.get("access");
                Ok(NoteAccessGrant {
                    note_id: r.get("note_id"),
                    user_id: r.get("user_id"),
                    access: parse_access(&access)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_valid_default() {
        assert!(ensure_valid_default(AccessLevel::None).is_ok());
        assert!(ensure_valid_default(AccessLevel::Write).is_ok());
        assert!(matches!(
            ensure_valid_default(AccessLevel::Modify),
            Err(Error::InvalidInput(_))
        ));
        assert!(ensure_valid_default(AccessLevel::Manage).is_err());
    }

    #[test]
    fn test_parse_access_from_store() {
        assert_eq!(parse_access("write").unwrap(), AccessLevel::Write);
        assert!(matches!(parse_access("owner"), Err(Error::Internal(_))));
    }
}
