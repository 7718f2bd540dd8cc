use sqlx::{SqliteConnection, SqlitePool};

#[derive(Debug, Clone)]
pub struct ScrapeStateRow {
    pub catalog_key: String,
    pub level: String,
    pub language: String,
    pub fetched_ts: i64,
    pub payload_json: Option<String>,
}

pub async fn exists(
    pool: &SqlitePool,
    catalog_key: &str,
    level: &str,
    language: &str,
) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM scrape_state WHERE catalog_key = ? AND level = ? AND language = ?",
    )
    .bind(catalog_key)
    .bind(level)
    .bind(language)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

pub async fn get(
    pool: &SqlitePool,
    catalog_key: &str,
    level: &str,
    language: &str,
) -> Result<Option<ScrapeStateRow>, sqlx::Error> {
    let row: Option<(String, String, String, i64, Option<String>)> = sqlx::query_as(
        "SELECT catalog_key, level, language, fetched_ts, payload_json \
         FROM scrape_state WHERE catalog_key = ? AND level = ? AND language = ?",
    )
    .bind(catalog_key)
    .bind(level)
    .bind(language)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| ScrapeStateRow {
        catalog_key: r.0,
        level: r.1,
        language: r.2,
        fetched_ts: r.3,
        payload_json: r.4,
    }))
}

/// Record that `catalog_key` was scraped. Re-marking refreshes the timestamp.
pub async fn mark_fetched(
    conn: &mut SqliteConnection,
    catalog_key: &str,
    level: &str,
    language: &str,
    payload_json: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO scrape_state (catalog_key, level, language, fetched_ts, payload_json) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(catalog_key, level, language) DO UPDATE SET \
         fetched_ts = excluded.fetched_ts, \
         payload_json = COALESCE(excluded.payload_json, payload_json)",
    )
    .bind(catalog_key)
    .bind(level)
    .bind(language)
    .bind(chrono::Utc::now().timestamp())
    .bind(payload_json)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Drop the scrape marker so the next `ensure_fresh` fetches again.
/// Stored children are kept.
pub async fn forget(
    pool: &SqlitePool,
    catalog_key: &str,
    level: &str,
    language: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM scrape_state WHERE catalog_key = ? AND level = ? AND language = ?",
    )
    .bind(catalog_key)
    .bind(level)
    .bind(language)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Remove every marker for a key (all levels, all languages).
pub async fn delete_all_for_key(
    conn: &mut SqliteConnection,
    catalog_key: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM scrape_state WHERE catalog_key = ?")
        .bind(catalog_key)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
