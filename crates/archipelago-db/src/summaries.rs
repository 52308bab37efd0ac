//! Meeting summary repository implementation.

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Pool, Postgres, Row};
use tracing::info;
use uuid::Uuid;

use archipelago_core::{
    Detalization, Error, Result, SaveSummaryRequest, Summary, SummaryRepository,
};

const SUMMARY_COLUMNS: &str =
    "s.id, s.name, s.text, s.text_with_role, s.role, s.active, s.platform, s.started_at, s.detalization";

fn summary_from_row(row: &PgRow) -> Summary {
    Summary {
        id: row.get("id"),
        name: row.get("name"),
        text: row.get("text"),
        text_with_role: row.get("text_with_role"),
        role: row.get("role"),
        active: row.get("active"),
        platform: row.get("platform"),
        started_at: row.get("started_at"),
        detalization: Detalization::from_code(row.get("detalization")),
    }
}

/// PostgreSQL implementation of SummaryRepository.
pub struct PgSummaryRepository {
    pool: Pool<Postgres>,
}

impl PgSummaryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Run an update keyed by summary id; no row → `SummaryNotFound`.
    async fn execute_for(&self, id: Uuid, query: Query<'_, Postgres, PgArguments>) -> Result<()> {
        let result = query.execute(&self.pool).await.map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::SummaryNotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl SummaryRepository for PgSummaryRepository {
    async fn save_text(&self, req: SaveSummaryRequest) -> Result<Summary> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO summ AS s (id, text, active, platform, detalization)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id)
            DO UPDATE SET text = EXCLUDED.text, text_with_role = '', role = ''
            RETURNING {}
            "#,
            SUMMARY_COLUMNS
        ))
        .bind(req.id)
        .bind(&req.text)
        .bind(req.active)
        .bind(&req.platform)
        .bind(req.detalization.code())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(summary_from_row(&row))
    }

    async fn update_text_role(&self, id: Uuid, text_with_role: &str, role: &str) -> Result<()> {
        self.execute_for(
            id,
            sqlx::query("UPDATE summ SET text_with_role = $2, role = $3 WHERE id = $1")
                .bind(id)
                .bind(text_with_role)
                .bind(role),
        )
        .await
    }

    async fn finish(&self, id: Uuid) -> Result<()> {
        self.execute_for(
            id,
            sqlx::query("UPDATE summ SET active = FALSE WHERE id = $1").bind(id),
        )
        .await?;

        info!(
            subsystem = "db",
            component = "summaries",
            op = "finish",
            summary_id = %id,
            "Summary finished"
        );
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Summary> {
        let row = sqlx::query(&format!("SELECT {} FROM summ s WHERE s.id = $1", SUMMARY_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::SummaryNotFound(id))?;
        Ok(summary_from_row(&row))
    }

    async fn list_active(&self) -> Result<Vec<Summary>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM summ s WHERE s.active ORDER BY s.started_at DESC",
            SUMMARY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(summary_from_row).collect())
    }

    async fn update_name(&self, id: Uuid, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput(
                "Summary name cannot be empty".to_string(),
            ));
        }
        self.execute_for(
            id,
            sqlx::query("UPDATE summ SET name = $2 WHERE id = $1")
                .bind(id)
                .bind(name),
        )
        .await
    }

    async fn attach_to_note(&self, summary_id: Uuid, note_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("SELECT id FROM summ WHERE id = $1 FOR KEY SHARE")
            .bind(summary_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::SummaryNotFound(summary_id))?;
        sqlx::query("SELECT id FROM note WHERE id = $1 FOR KEY SHARE")
            .bind(note_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::NoteNotFound(note_id))?;

        sqlx::query(
            r#"
            INSERT INTO summ_to_note (summ_id, note_id) VALUES ($1, $2)
            ON CONFLICT (summ_id, note_id) DO NOTHING
            "#,
        )
        .bind(summary_id)
        .bind(note_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "summaries",
            op = "attach_to_note",
            summary_id = %summary_id,
            note_id = %note_id,
            "Summary attached to note"
        );
        Ok(())
    }

    async fn list_for_note(&self, note_id: Uuid) -> Result<Vec<Summary>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM summ s
            JOIN summ_to_note sn ON sn.summ_id = s.id
            WHERE sn.note_id = $1
            ORDER BY s.started_at DESC
            "#,
            SUMMARY_COLUMNS
        ))
        .bind(note_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(summary_from_row).collect())
    }
}
