//! Upload state store trait and SQLite implementation.

use crate::error::{StateError, StateResult};
use crate::models::{UploadPartRow, UploadSpecRow};
use async_trait::async_trait;
use barge_core::{CompletedPart, ObjectId, UploadId, UploadSpecification};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Authoritative ledger of upload specifications and per-part completions.
///
/// All operations are keyed by `(object_id, upload_id)`; an unknown key fails
/// with [`StateError::IdNotFound`]. Implementations must make
/// `is_completed` linearize against concurrent `finalize_upload_part` calls:
/// finalize must never observe a completed ledger while a part write for the
/// same session is still in flight.
#[async_trait]
pub trait UploadStateStore: Send + Sync {
    /// Persist a new specification, replacing any prior session for the same
    /// object. At most one upload id is active per object.
    async fn create(
        &self,
        spec: &UploadSpecification,
        declared_md5: Option<&str>,
    ) -> StateResult<()>;

    /// Remove a session and all its part records.
    async fn delete(&self, object_id: &ObjectId, upload_id: &UploadId) -> StateResult<()>;

    /// The active upload id for an object, if any.
    async fn get_upload_id(&self, object_id: &ObjectId) -> StateResult<UploadId>;

    /// Record a verified part completion. Concurrent calls for distinct part
    /// numbers of one session must not lose updates.
    async fn finalize_upload_part(
        &self,
        object_id: &ObjectId,
        upload_id: &UploadId,
        part_number: u32,
        md5: &str,
        etag: &str,
    ) -> StateResult<()>;

    /// True iff every part of the session has a recorded completion.
    async fn is_completed(&self, object_id: &ObjectId, upload_id: &UploadId) -> StateResult<bool>;

    /// Load the stored specification, parts ordered by part number.
    async fn load_specification(
        &self,
        object_id: &ObjectId,
        upload_id: &UploadId,
    ) -> StateResult<UploadSpecification>;

    /// Completion proofs for all completed parts, ordered by part number.
    async fn retrieve_completed_parts(
        &self,
        object_id: &ObjectId,
        upload_id: &UploadId,
    ) -> StateResult<Vec<CompletedPart>>;

    /// Demote one part back to pending by clearing its completion record.
    async fn delete_part(
        &self,
        object_id: &ObjectId,
        upload_id: &UploadId,
        part_number: u32,
    ) -> StateResult<()>;
}

/// SQLite-backed state store.
pub struct SqliteStateStore {
    pool: Pool<Sqlite>,
}

impl SqliteStateStore {
    /// Open (creating if missing) the state database at `path`.
    pub async fn new(path: impl AsRef<Path>) -> StateResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StateError::Corrupt(format!("cannot create state dir: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        // A single connection serializes writers, which is also what makes
        // the is_completed/finalize_upload_part ordering guarantee hold.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> StateResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS upload_specs (
                object_id TEXT NOT NULL,
                upload_id TEXT NOT NULL,
                object_key TEXT NOT NULL,
                declared_md5 TEXT,
                created_at TEXT NOT NULL,
                PRIMARY KEY (object_id, upload_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        // One active session per object.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_upload_specs_object
             ON upload_specs (object_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS upload_parts (
                object_id TEXT NOT NULL,
                upload_id TEXT NOT NULL,
                part_number INTEGER NOT NULL,
                part_offset INTEGER NOT NULL,
                part_size INTEGER NOT NULL,
                url TEXT,
                md5 TEXT,
                etag TEXT,
                PRIMARY KEY (object_id, upload_id, part_number)
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn session_exists(
        &self,
        object_id: &ObjectId,
        upload_id: &UploadId,
    ) -> StateResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM upload_specs WHERE object_id = ? AND upload_id = ?",
        )
        .bind(object_id.as_str())
        .bind(upload_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    fn id_not_found(object_id: &ObjectId) -> StateError {
        StateError::IdNotFound {
            object_id: object_id.to_string(),
        }
    }
}

#[async_trait]
impl UploadStateStore for SqliteStateStore {
    async fn create(
        &self,
        spec: &UploadSpecification,
        declared_md5: Option<&str>,
    ) -> StateResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM upload_specs WHERE object_id = ?")
            .bind(spec.object_id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM upload_parts WHERE object_id = ?")
            .bind(spec.object_id.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO upload_specs (object_id, upload_id, object_key, declared_md5, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(spec.object_id.as_str())
        .bind(spec.upload_id.as_str())
        .bind(&spec.object_key)
        .bind(declared_md5)
        .bind(time::OffsetDateTime::now_utc())
        .execute(&mut *tx)
        .await?;

        for part in &spec.parts {
            sqlx::query(
                "INSERT INTO upload_parts
                 (object_id, upload_id, part_number, part_offset, part_size, url, md5, etag)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(spec.object_id.as_str())
            .bind(spec.upload_id.as_str())
            .bind(part.part_number as i64)
            .bind(part.offset as i64)
            .bind(part.size as i64)
            .bind(part.url.as_deref())
            .bind(part.md5.as_deref())
            .bind(part.etag.as_deref())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            object_id = %spec.object_id,
            upload_id = %spec.upload_id,
            parts = spec.parts.len(),
            "upload specification stored"
        );
        Ok(())
    }

    async fn delete(&self, object_id: &ObjectId, upload_id: &UploadId) -> StateResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM upload_specs WHERE object_id = ? AND upload_id = ?")
            .bind(object_id.as_str())
            .bind(upload_id.as_str())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Self::id_not_found(object_id));
        }
        sqlx::query("DELETE FROM upload_parts WHERE object_id = ? AND upload_id = ?")
            .bind(object_id.as_str())
            .bind(upload_id.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!(object_id = %object_id, upload_id = %upload_id, "upload state deleted");
        Ok(())
    }

    async fn get_upload_id(&self, object_id: &ObjectId) -> StateResult<UploadId> {
        let upload_id: Option<String> =
            sqlx::query_scalar("SELECT upload_id FROM upload_specs WHERE object_id = ?")
                .bind(object_id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        upload_id
            .map(UploadId::new)
            .ok_or_else(|| Self::id_not_found(object_id))
    }

    async fn finalize_upload_part(
        &self,
        object_id: &ObjectId,
        upload_id: &UploadId,
        part_number: u32,
        md5: &str,
        etag: &str,
    ) -> StateResult<()> {
        let result = sqlx::query(
            "UPDATE upload_parts SET md5 = ?, etag = ?
             WHERE object_id = ? AND upload_id = ? AND part_number = ?",
        )
        .bind(md5)
        .bind(etag)
        .bind(object_id.as_str())
        .bind(upload_id.as_str())
        .bind(part_number as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            if self.session_exists(object_id, upload_id).await? {
                return Err(StateError::PartNotFound {
                    object_id: object_id.to_string(),
                    part_number,
                });
            }
            return Err(Self::id_not_found(object_id));
        }
        Ok(())
    }

    async fn is_completed(&self, object_id: &ObjectId, upload_id: &UploadId) -> StateResult<bool> {
        if !self.session_exists(object_id, upload_id).await? {
            return Err(Self::id_not_found(object_id));
        }
        let pending: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM upload_parts
             WHERE object_id = ? AND upload_id = ? AND (md5 IS NULL OR etag IS NULL)",
        )
        .bind(object_id.as_str())
        .bind(upload_id.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(pending == 0)
    }

    async fn load_specification(
        &self,
        object_id: &ObjectId,
        upload_id: &UploadId,
    ) -> StateResult<UploadSpecification> {
        let spec_row: Option<UploadSpecRow> = sqlx::query_as(
            "SELECT object_id, upload_id, object_key, declared_md5, created_at
             FROM upload_specs WHERE object_id = ? AND upload_id = ?",
        )
        .bind(object_id.as_str())
        .bind(upload_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        let spec_row = spec_row.ok_or_else(|| Self::id_not_found(object_id))?;

        let part_rows: Vec<UploadPartRow> = sqlx::query_as(
            "SELECT part_number, part_offset, part_size, url, md5, etag
             FROM upload_parts WHERE object_id = ? AND upload_id = ?
             ORDER BY part_number",
        )
        .bind(object_id.as_str())
        .bind(upload_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(UploadSpecification::new(
            spec_row.object_key,
            ObjectId::new(spec_row.object_id),
            UploadId::new(spec_row.upload_id),
            part_rows.into_iter().map(Into::into).collect(),
        ))
    }

    async fn retrieve_completed_parts(
        &self,
        object_id: &ObjectId,
        upload_id: &UploadId,
    ) -> StateResult<Vec<CompletedPart>> {
        if !self.session_exists(object_id, upload_id).await? {
            return Err(Self::id_not_found(object_id));
        }
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT part_number, etag FROM upload_parts
             WHERE object_id = ? AND upload_id = ? AND etag IS NOT NULL AND md5 IS NOT NULL
             ORDER BY part_number",
        )
        .bind(object_id.as_str())
        .bind(upload_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(number, etag)| CompletedPart::new(number as u32, etag))
            .collect())
    }

    async fn delete_part(
        &self,
        object_id: &ObjectId,
        upload_id: &UploadId,
        part_number: u32,
    ) -> StateResult<()> {
        let result = sqlx::query(
            "UPDATE upload_parts SET md5 = NULL, etag = NULL
             WHERE object_id = ? AND upload_id = ? AND part_number = ?",
        )
        .bind(object_id.as_str())
        .bind(upload_id.as_str())
        .bind(part_number as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            if self.session_exists(object_id, upload_id).await? {
                return Err(StateError::PartNotFound {
                    object_id: object_id.to_string(),
                    part_number,
                });
            }
            return Err(Self::id_not_found(object_id));
        }
        Ok(())
    }
}
