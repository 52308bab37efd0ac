//! Directory repository implementation.
//!
//! The `path` column is an `ltree` holding the ancestor chain followed by the
//! directory's own id. Reads project `SUBPATH(path, 0, -1)` so callers only
//! ever see the ancestor chain.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, info};

use archipelago_core::{DirectoryRepository, Directory, Error, MaterializedPath, Result};

const DIR_COLUMNS: &str = "id, name, SUBPATH(path, 0, -1)::text AS ancestors";

fn dir_from_row(row: &PgRow) -> Result<Directory> {
    let ancestors: String = row.get("ancestors");
    Ok(Directory {
        id: row.get("id"),
        name: row.get("name"),
        path: ancestors.parse()?,
    })
}

fn validate_dir_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput(
            "Directory name cannot be empty".to_string(),
        ));
    }
    Ok(name)
}

/// PostgreSQL implementation of DirectoryRepository.
pub struct PgDirectoryRepository {
    pool: Pool<Postgres>,
}

impl PgDirectoryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Lock a directory row and return its full path (ancestors + own id).
    async fn lock_full_path_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
    ) -> Result<MaterializedPath> {
        let row = sqlx::query("SELECT path::text AS full_path FROM dir WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::DirectoryNotFound(id))?;
        let full_path: String = row.get("full_path");
        full_path.parse()
    }

    /// Fetch a directory within an existing transaction.
    pub async fn get_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
    ) -> Result<Directory> {
        let row = sqlx::query(&format!("SELECT {} FROM dir WHERE id = $1", DIR_COLUMNS))
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::DirectoryNotFound(id))?;
        dir_from_row(&row)
    }
}

#[async_trait]
impl DirectoryRepository for PgDirectoryRepository {
    async fn get(&self, id: i64) -> Result<Directory> {
        let row = sqlx::query(&format!("SELECT {} FROM dir WHERE id = $1", DIR_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::DirectoryNotFound(id))?;
        dir_from_row(&row)
    }

    async fn subtree(&self, root_id: i64) -> Result<Vec<Directory>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM dir
            WHERE path <@ (SELECT path FROM dir WHERE id = $1)
            ORDER BY path
            "#,
            DIR_COLUMNS
        ))
        .bind(root_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "dirs",
            op = "subtree",
            dir_id = root_id,
            result_count = rows.len(),
            "Fetched directory subtree"
        );

        rows.iter().map(dir_from_row).collect()
    }

    async fn list_roots(&self) -> Result<Vec<Directory>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM dir WHERE nlevel(path) = 1 ORDER BY name, id",
            DIR_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(dir_from_row).collect()
    }

    async fn create(&self, name: &str, parent_id: Option<i64>) -> Result<Directory> {
        let name = validate_dir_name(name)?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Locking the parent keeps it from being moved or deleted while the
        // child's path is derived from it.
        let parent_path = match parent_id {
            Some(parent_id) => self.lock_full_path_tx(&mut tx, parent_id).await?,
            None => MaterializedPath::root(),
        };

        let id: i64 = sqlx::query_scalar("SELECT nextval(pg_get_serial_sequence('dir', 'id'))")
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let full_path = parent_path.child(id);
        sqlx::query("INSERT INTO dir (id, name, path) VALUES ($1, $2, $3::ltree)")
            .bind(id)
            .bind(name)
            .bind(full_path.key())
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "dirs",
            op = "create",
            dir_id = id,
            parent_id = ?parent_id,
            "Directory created"
        );

        Ok(Directory {
            id,
            name: name.to_string(),
            path: parent_path,
        })
    }

    async fn rename(&self, id: i64, name: &str) -> Result<Directory> {
        let name = validate_dir_name(name)?;

        let row = sqlx::query(&format!(
            "UPDATE dir SET name = $1 WHERE id = $2 RETURNING {}",
            DIR_COLUMNS
        ))
        .bind(name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::DirectoryNotFound(id))?;

        dir_from_row(&row)
    }

    async fn move_to(&self, id: i64, new_parent_id: Option<i64>) -> Result<Directory> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let old_full = self.lock_full_path_tx(&mut tx, id).await?;
        let new_parent_path = match new_parent_id {
            Some(parent_id) => {
                let parent_full = self.lock_full_path_tx(&mut tx, parent_id).await?;
                if parent_full.contains(id) {
                    return Err(Error::InvalidInput(format!(
                        "Cannot move directory {} under its own subtree ({})",
                        id, parent_id
                    )));
                }
                parent_full
            }
            None => MaterializedPath::root(),
        };
        let new_full = new_parent_path.child(id);

        if new_full != old_full {
            // Lock the subtree first. Creates already holding a lock inside
            // it commit before this returns, so the rewrite below runs on a
            // fresh snapshot that sees their rows, and later creates wait for
            // this commit.
            sqlx::query("SELECT id FROM dir WHERE path <@ $1::ltree FOR UPDATE")
                .bind(old_full.key())
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;

            // One statement rewrites the directory and every descendant.
            let moved = sqlx::query(
                r#"
                UPDATE dir
                SET path = CASE
                    WHEN path = $2::ltree THEN $1::ltree
                    ELSE $1::ltree || subpath(path, nlevel($2::ltree))
                END
                WHERE path <@ $2::ltree
                "#,
            )
            .bind(new_full.key())
            .bind(old_full.key())
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

            info!(
                subsystem = "db",
                component = "dirs",
                op = "move",
                dir_id = id,
                new_parent_id = ?new_parent_id,
                result_count = moved.rows_affected(),
                "Directory subtree moved"
            );
        }

        let dir = self.get_tx(&mut tx, id).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(dir)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let full_path = self.lock_full_path_tx(&mut tx, id).await?;

        let has_children: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM dir WHERE path <@ $1::ltree AND id <> $2)",
        )
        .bind(full_path.key())
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;
        if has_children {
            return Err(Error::Conflict(format!(
                "Directory {} still has child directories",
                id
            )));
        }

        let has_notes: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM note WHERE dir_id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .map_err(Error::Database)?;
        if has_notes {
            return Err(Error::Conflict(format!("Directory {} still has notes", id)));
        }

        sqlx::query("DELETE FROM dir WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "dirs",
            op = "delete",
            dir_id = id,
            "Directory deleted"
        );
        Ok(())
    }
}
