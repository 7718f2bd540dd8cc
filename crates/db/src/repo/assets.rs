use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct AssetRow {
    pub blob_id: String,
    pub source_uri: String,
    pub bytes: Vec<u8>,
    pub created_ts: i64,
}

pub async fn exists(pool: &SqlitePool, blob_id: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM asset WHERE blob_id = ?")
        .bind(blob_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

pub async fn get(pool: &SqlitePool, blob_id: &str) -> Result<Option<AssetRow>, sqlx::Error> {
    let row: Option<(String, String, Vec<u8>, i64)> = sqlx::query_as(
        "SELECT blob_id, source_uri, bytes, created_ts FROM asset WHERE blob_id = ?",
    )
    .bind(blob_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| AssetRow {
        blob_id: r.0,
        source_uri: r.1,
        bytes: r.2,
        created_ts: r.3,
    }))
}

pub async fn upsert(
    pool: &SqlitePool,
    blob_id: &str,
    source_uri: &str,
    bytes: &[u8],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO asset (blob_id, source_uri, bytes, size_bytes, created_ts) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(blob_id) DO UPDATE SET \
         source_uri = excluded.source_uri, \
         bytes = excluded.bytes, \
         size_bytes = excluded.size_bytes",
    )
    .bind(blob_id)
    .bind(source_uri)
    .bind(bytes)
    .bind(bytes.len() as i64)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM asset")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}
