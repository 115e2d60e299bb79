//! Row models for the SQLite state store.

use barge_core::Part;

/// Row of the `upload_specs` table: one active session per object.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct UploadSpecRow {
    pub object_id: String,
    pub upload_id: String,
    pub object_key: String,
    pub declared_md5: Option<String>,
    pub created_at: time::OffsetDateTime,
}

/// Row of the `upload_parts` table: geometry plus recorded completion.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct UploadPartRow {
    pub part_number: i64,
    pub part_offset: i64,
    pub part_size: i64,
    pub url: Option<String>,
    pub md5: Option<String>,
    pub etag: Option<String>,
}

impl From<UploadPartRow> for Part {
    fn from(row: UploadPartRow) -> Self {
        Part {
            part_number: row.part_number as u32,
            offset: row.part_offset as u64,
            size: row.part_size as u64,
            url: row.url,
            md5: row.md5,
            etag: row.etag,
        }
    }
}
