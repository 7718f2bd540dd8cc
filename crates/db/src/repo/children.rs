use sqlx::{SqliteConnection, SqlitePool};

/// Tables holding catalog children. Both share one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildTable {
    Season,
    Episode,
}

impl ChildTable {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Season => "season",
            Self::Episode => "episode",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChildRow {
    pub catalog_key: String,
    pub language: String,
    pub parent_key: String,
    pub number: Option<String>,
    pub title: String,
    pub position: i64,
    pub payload_json: Option<String>,
}

/// A child to insert if its key is not yet known.
#[derive(Debug, Clone)]
pub struct NewChild<'a> {
    pub catalog_key: &'a str,
    pub number: Option<&'a str>,
    pub title: &'a str,
    pub payload_json: Option<String>,
}

pub async fn find_by_number(
    pool: &SqlitePool,
    table: ChildTable,
    parent_key: &str,
    language: &str,
    number: &str,
) -> Result<Option<String>, sqlx::Error> {
    let query = format!(
        "SELECT catalog_key FROM {} WHERE parent_key = ? AND language = ? AND number = ? \
         ORDER BY position LIMIT 1",
        table.as_str()
    );
    let row: Option<(String,)> = sqlx::query_as(&query)
        .bind(parent_key)
        .bind(language)
        .bind(number)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(key,)| key))
}

/// First child whose title contains `text`. `instr` keeps the match case-sensitive.
pub async fn find_by_title_substring(
    pool: &SqlitePool,
    table: ChildTable,
    parent_key: &str,
    language: &str,
    text: &str,
) -> Result<Option<String>, sqlx::Error> {
    let query = format!(
        "SELECT catalog_key FROM {} WHERE parent_key = ? AND language = ? AND instr(title, ?) > 0 \
         ORDER BY position LIMIT 1",
        table.as_str()
    );
    let row: Option<(String,)> = sqlx::query_as(&query)
        .bind(parent_key)
        .bind(language)
        .bind(text)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(key,)| key))
}

/// All children of a parent in ingest order.
pub async fn list(
    pool: &SqlitePool,
    table: ChildTable,
    parent_key: &str,
    language: &str,
) -> Result<Vec<ChildRow>, sqlx::Error> {
    let query = format!(
        "SELECT catalog_key, language, parent_key, number, title, position, payload_json \
         FROM {} WHERE parent_key = ? AND language = ? ORDER BY position",
        table.as_str()
    );
    let rows: Vec<(
        String,
        String,
        String,
        Option<String>,
        String,
        i64,
        Option<String>,
    )> = sqlx::query_as(&query)
        .bind(parent_key)
        .bind(language)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(row_to_child).collect())
}

/// Distinct child keys of a parent across all languages.
pub async fn child_keys(
    pool: &SqlitePool,
    table: ChildTable,
    parent_key: &str,
) -> Result<Vec<String>, sqlx::Error> {
    let query = format!(
        "SELECT DISTINCT catalog_key FROM {} WHERE parent_key = ? ORDER BY catalog_key",
        table.as_str()
    );
    let rows: Vec<(String,)> = sqlx::query_as(&query)
        .bind(parent_key)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(key,)| key).collect())
}

/// Append children whose key is not present yet. Existing rows are never
/// modified. Returns how many rows were inserted.
pub async fn insert_missing(
    conn: &mut SqliteConnection,
    table: ChildTable,
    parent_key: &str,
    language: &str,
    children: &[NewChild<'_>],
) -> Result<usize, sqlx::Error> {
    let next: (i64,) = sqlx::query_as(&format!(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM {} WHERE parent_key = ? AND language = ?",
        table.as_str()
    ))
    .bind(parent_key)
    .bind(language)
    .fetch_one(&mut *conn)
    .await?;

    let insert = format!(
        "INSERT INTO {} (catalog_key, language, parent_key, number, title, position, payload_json, created_ts) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(catalog_key, language) DO NOTHING",
        table.as_str()
    );
    let now = chrono::Utc::now().timestamp();
    let mut position = next.0;
    let mut inserted = 0;

    for child in children {
        let result = sqlx::query(&insert)
            .bind(child.catalog_key)
            .bind(language)
            .bind(parent_key)
            .bind(child.number)
            .bind(child.title)
            .bind(position)
            .bind(child.payload_json.as_deref())
            .bind(now)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() > 0 {
            position += 1;
            inserted += 1;
        }
    }

    Ok(inserted)
}

/// Remove a child row in every language.
pub async fn delete_by_key(
    conn: &mut SqliteConnection,
    table: ChildTable,
    catalog_key: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE catalog_key = ?",
        table.as_str()
    ))
    .bind(catalog_key)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

fn row_to_child(
    r: (
        String,
        String,
        String,
        Option<String>,
        String,
        i64,
        Option<String>,
    ),
) -> ChildRow {
    ChildRow {
        catalog_key: r.0,
        language: r.1,
        parent_key: r.2,
        number: r.3,
        title: r.4,
        position: r.5,
        payload_json: r.6,
    }
}
