//! Tag linker: tags, tag-note links and the tag-tag graph.
//!
//! Every mutating operation runs in one transaction. Tag rows are locked
//! `FOR UPDATE` before their link counts are read, so two concurrent unlinks
//! cannot both observe a remaining link and leave an orphan behind.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use archipelago_core::{
    new_v7, normalize_and_validate, Error, LinkedTag, Result, Tag, TagRepository,
};

use crate::is_unique_violation;

fn tag_from_row(row: &PgRow) -> Tag {
    Tag {
        id: row.get("tag_id"),
        name: row.get("name"),
    }
}

/// Order a pair the way `tag_to_tag` stores it.
pub(crate) fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// PostgreSQL implementation of TagRepository.
pub struct PgTagRepository {
    pool: Pool<Postgres>,
}

impl PgTagRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn lock_tag_tx(&self, tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<Tag> {
        let row = sqlx::query("SELECT tag_id, name FROM tag WHERE tag_id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::TagNotFound(id))?;
        Ok(tag_from_row(&row))
    }

    async fn lock_tag_by_name_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
    ) -> Result<Option<Tag>> {
        let row = sqlx::query("SELECT tag_id, name FROM tag WHERE name = $1 FOR UPDATE")
            .bind(name)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(tag_from_row))
    }

    /// Hold the note row for the rest of the transaction so it cannot be
    /// deleted between the check and the link insert.
    async fn ensure_note_tx(&self, tx: &mut Transaction<'_, Postgres>, note_id: Uuid) -> Result<()> {
        sqlx::query("SELECT id FROM note WHERE id = $1 FOR KEY SHARE")
            .bind(note_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::NoteNotFound(note_id))?;
        Ok(())
    }

    /// Find a tag by normalized name or create it; the row is locked either way.
    async fn get_or_create_tx(&self, tx: &mut Transaction<'_, Postgres>, name: &str) -> Result<Tag> {
        if let Some(tag) = self.lock_tag_by_name_tx(tx, name).await? {
            return Ok(tag);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO tag (tag_id, name) VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            RETURNING tag_id, name
            "#,
        )
        .bind(new_v7())
        .bind(name)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        match inserted {
            Some(row) => {
                let tag = tag_from_row(&row);
                debug!(
                    subsystem = "db",
                    component = "tags",
                    op = "create_tag",
                    tag_id = %tag.id,
                    "Tag created"
                );
                Ok(tag)
            }
            // A concurrent transaction created it first.
            None => self
                .lock_tag_by_name_tx(tx, name)
                .await?
                .ok_or_else(|| Error::Internal(format!("Tag '{}' vanished after insert", name))),
        }
    }

    async fn link_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tag_id: Uuid,
        note_id: Uuid,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tag_to_note (tag_id, note_id) VALUES ($1, $2)
            ON CONFLICT (tag_id, note_id) DO NOTHING
            "#,
        )
        .bind(tag_id)
        .bind(note_id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Delete the (locked) tag when no note links remain. Returns whether it was deleted.
    async fn collect_if_orphan_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tag_id: Uuid,
    ) -> Result<bool> {
        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tag_to_note WHERE tag_id = $1")
                .bind(tag_id)
                .fetch_one(&mut **tx)
                .await
                .map_err(Error::Database)?;
        if remaining > 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM tag WHERE tag_id = $1")
            .bind(tag_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        debug!(
            subsystem = "db",
            component = "tags",
            op = "collect_orphan",
            tag_id = %tag_id,
            "Tag deleted after its last note link was removed"
        );
        Ok(true)
    }

    /// Move every note link and tag-tag link of `from` onto `into`, then
    /// delete `from`. Pairs `into` already has are skipped.
    async fn merge_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        from: Uuid,
        into: Uuid,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tag_to_note (tag_id, note_id)
            SELECT $2, note_id FROM tag_to_note WHERE tag_id = $1
            ON CONFLICT (tag_id, note_id) DO NOTHING
            "#,
        )
        .bind(from)
        .bind(into)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            r#"
            INSERT INTO tag_to_tag (tag1_id, tag2_id, label)
            SELECT LEAST($2::uuid, other), GREATEST($2::uuid, other), label
            FROM (
                SELECT CASE WHEN tag1_id = $1 THEN tag2_id ELSE tag1_id END AS other, label
                FROM tag_to_tag
                WHERE tag1_id = $1 OR tag2_id = $1
            ) links
            WHERE other <> $2
            ON CONFLICT (tag1_id, tag2_id) DO NOTHING
            "#,
        )
        .bind(from)
        .bind(into)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query("DELETE FROM tag WHERE tag_id = $1")
            .bind(from)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl TagRepository for PgTagRepository {
    async fn get(&self, id: Uuid) -> Result<Tag> {
        let row = sqlx::query("SELECT tag_id, name FROM tag WHERE tag_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::TagNotFound(id))?;
        Ok(tag_from_row(&row))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let name = normalize_and_validate(name)?;
        let row = sqlx::query("SELECT tag_id, name FROM tag WHERE name = $1")
            .bind(&name)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(tag_from_row))
    }

    async fn create_and_link(&self, name: &str, note_id: Uuid) -> Result<Tag> {
        let name = normalize_and_validate(name)?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        self.ensure_note_tx(&mut tx, note_id).await?;
        let tag = self.get_or_create_tx(&mut tx, &name).await?;
        self.link_tx(&mut tx, tag.id, note_id).await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "tags",
            op = "create_and_link",
            tag_id = %tag.id,
            note_id = %note_id,
            "Tag linked to note"
        );
        Ok(tag)
    }

    async fn link_to_note(&self, tag_id: Uuid, note_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        self.lock_tag_tx(&mut tx, tag_id).await?;
        self.ensure_note_tx(&mut tx, note_id).await?;
        self.link_tx(&mut tx, tag_id, note_id).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn unlink_from_note(&self, tag_id: Uuid, note_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        self.lock_tag_tx(&mut tx, tag_id).await?;

        let removed = sqlx::query("DELETE FROM tag_to_note WHERE tag_id = $1 AND note_id = $2")
            .bind(tag_id)
            .bind(note_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        if removed.rows_affected() == 0 {
            return Err(Error::TagLinkNotFound { tag_id, note_id });
        }

        let deleted = self.collect_if_orphan_tx(&mut tx, tag_id).await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "tags",
            op = "unlink_from_note",
            tag_id = %tag_id,
            note_id = %note_id,
            tag_deleted = deleted,
            "Tag unlinked from note"
        );
        Ok(deleted)
    }

    async fn update_tag(&self, id: Uuid, new_name: &str) -> Result<Tag> {
        let name = normalize_and_validate(new_name)?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let tag = self.lock_tag_tx(&mut tx, id).await?;
        if tag.name == name {
            tx.commit().await.map_err(Error::Database)?;
            return Ok(tag);
        }

        let surviving = match self.lock_tag_by_name_tx(&mut tx, &name).await? {
            Some(existing) => {
                self.merge_tx(&mut tx, id, existing.id).await?;
                info!(
                    subsystem = "db",
                    component = "tags",
                    op = "update_tag",
                    tag_id = %id,
                    merged_into = %existing.id,
                    "Tag merged into existing tag with the same name"
                );
                existing
            }
            None => {
                let row = sqlx::query(
                    "UPDATE tag SET name = $1 WHERE tag_id = $2 RETURNING tag_id, name",
                )
                .bind(&name)
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        Error::Conflict(format!("Tag '{}' was created concurrently", name))
                    } else {
                        Error::Database(e)
                    }
                })?;
                tag_from_row(&row)
            }
        };

        tx.commit().await.map_err(Error::Database)?;
        Ok(surviving)
    }

    async fn rename_for_note(
        &self,
        tag_id: Uuid,
        note_id: Uuid,
        new_name: &str,
    ) -> Result<(Tag, bool)> {
        let name = normalize_and_validate(new_name)?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let old = self.lock_tag_tx(&mut tx, tag_id).await?;

        let linked = sqlx::query(
            "SELECT tag_id FROM tag_to_note WHERE tag_id = $1 AND note_id = $2 FOR UPDATE",
        )
        .bind(tag_id)
        .bind(note_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;
        if linked.is_none() {
            return Err(Error::TagLinkNotFound { tag_id, note_id });
        }

        if old.name == name {
            tx.commit().await.map_err(Error::Database)?;
            return Ok((old, false));
        }

        let target = self.get_or_create_tx(&mut tx, &name).await?;
        sqlx::query("DELETE FROM tag_to_note WHERE tag_id = $1 AND note_id = $2")
            .bind(tag_id)
            .bind(note_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        self.link_tx(&mut tx, target.id, note_id).await?;
        let old_deleted = self.collect_if_orphan_tx(&mut tx, tag_id).await?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "tags",
            op = "rename_for_note",
            tag_id = %tag_id,
            note_id = %note_id,
            new_tag_id = %target.id,
            tag_deleted = old_deleted,
            "Note tag renamed"
        );
        Ok((target, old_deleted))
    }

    async fn link_tags(&self, tag1_id: Uuid, tag2_id: Uuid, label: Option<&str>) -> Result<()> {
        if tag1_id == tag2_id {
            return Err(Error::InvalidInput(
                "A tag cannot be linked to itself".to_string(),
            ));
        }
        let (first, second) = canonical_pair(tag1_id, tag2_id);

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        // Canonical order keeps concurrent link/unlink pairs from deadlocking.
        self.lock_tag_tx(&mut tx, first).await?;
        self.lock_tag_tx(&mut tx, second).await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO tag_to_tag (tag1_id, tag2_id, label) VALUES ($1, $2, $3)
            ON CONFLICT (tag1_id, tag2_id) DO NOTHING
            "#,
        )
        .bind(first)
        .bind(second)
        .bind(label.map(str::trim).filter(|l| !l.is_empty()))
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;
        if inserted.rows_affected() == 0 {
            return Err(Error::TagsAlreadyLinked { tag1_id, tag2_id });
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn unlink_tags(&self, tag1_id: Uuid, tag2_id: Uuid) -> Result<()> {
        let (first, second) = canonical_pair(tag1_id, tag2_id);
        let removed = sqlx::query("DELETE FROM tag_to_tag WHERE tag1_id = $1 AND tag2_id = $2")
            .bind(first)
            .bind(second)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if removed.rows_affected() == 0 {
            return Err(Error::TagsLinkNotFound { tag1_id, tag2_id });
        }
        Ok(())
    }

    async fn linked_tags(&self, id: Uuid) -> Result<Vec<LinkedTag>> {
        self.get(id).await?;

        let rows = sqlx::query(
            r#"
            SELECT t.tag_id, t.name, l.label
            FROM tag_to_tag l
            JOIN tag t ON t.tag_id = CASE WHEN l.tag1_id = $1 THEN l.tag2_id ELSE l.tag1_id END
            WHERE l.tag1_id = $1 OR l.tag2_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .iter()
            .map(|r| LinkedTag {
                tag: tag_from_row(r),
                label: r.get("label"),
            })
            .collect())
    }

    async fn tags_for_note(&self, note_id: Uuid) -> Result<Vec<Tag>> {
        let rows = sqlx::query(
            r#"
            SELECT t.tag_id, t.name
            FROM tag t
            JOIN tag_to_note ttn ON ttn.tag_id = t.tag_id
            WHERE ttn.note_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn notes_for_tag(&self, tag_id: Uuid) -> Result<Vec<Uuid>> {
        self.get(tag_id).await?;

        sqlx::query_scalar("SELECT note_id FROM tag_to_note WHERE tag_id = $1 ORDER BY note_id")
            .bind(tag_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn delete_tag(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM tag WHERE tag_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::TagNotFound(id));
        }

        info!(
            subsystem = "db",
            component = "tags",
            op = "delete_tag",
            tag_id = %id,
            "Tag deleted"
        );
        Ok(())
    }
}
