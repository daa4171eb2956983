//! Relational queries against the `data_items` / `data_sources` tables.
//!
//! Follows the teacher's `storage/postgres/datasets.rs` idiom: named `const`-string
//! queries bound positionally, each wrapped in a `#[tracing::instrument]`'d free function
//! taking the pool by reference.

use crate::models::{EmbeddingStatus, Record};
use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::{FromRow, Row, SqlitePool};

const STORE_ITEM_QUERY: &str = r#"
    INSERT INTO data_items (id, namespace, source_id, content, metadata, created_at, updated_at, days_date, embedding_status)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT (id) DO UPDATE SET
        content = excluded.content,
        metadata = excluded.metadata,
        updated_at = excluded.updated_at,
        days_date = excluded.days_date,
        embedding_status = CASE
            WHEN data_items.content <> excluded.content THEN 'pending'
            ELSE data_items.embedding_status
        END
"#;

const GET_ITEM_QUERY: &str = r#"
    SELECT id, namespace, source_id, content, metadata, created_at, updated_at, days_date, embedding_status
    FROM data_items WHERE id = ?1
"#;

const PENDING_EMBEDDINGS_QUERY: &str = r#"
    SELECT id, namespace, source_id, content, metadata, created_at, updated_at, days_date, embedding_status
    FROM data_items
    WHERE namespace = ?1 AND embedding_status = 'pending'
    ORDER BY updated_at ASC
    LIMIT ?2
"#;

const UPDATE_EMBEDDING_STATUS_QUERY: &str = r#"
    UPDATE data_items SET embedding_status = ?1 WHERE id = ?2
"#;

const DELETE_ITEM_QUERY: &str = r#"
    DELETE FROM data_items WHERE id = ?1
"#;

const CLEAR_NAMESPACE_QUERY: &str = r#"
    DELETE FROM data_items WHERE namespace = ?1
"#;

const GET_ITEMS_BY_DATE_QUERY: &str = r#"
    SELECT id, namespace, source_id, content, metadata, created_at, updated_at, days_date, embedding_status
    FROM data_items
    WHERE namespace = ?1 AND days_date = ?2
    ORDER BY created_at ASC
"#;

const COUNT_PENDING_EMBEDDINGS_QUERY: &str = r#"
    SELECT COUNT(*) AS count FROM data_items WHERE namespace = ?1 AND embedding_status = 'pending'
"#;

const RESET_FAILED_EMBEDDINGS_QUERY: &str = r#"
    UPDATE data_items SET embedding_status = 'pending' WHERE namespace = ?1 AND embedding_status = 'failed'
"#;

const EXISTING_SOURCE_IDS_QUERY: &str = r#"
    SELECT source_id FROM data_items WHERE namespace = ?1
"#;

const FIND_BY_FINGERPRINT_QUERY: &str = r#"
    SELECT id, namespace, source_id, content, metadata, created_at, updated_at, days_date, embedding_status
    FROM data_items
    WHERE namespace = ?1 AND json_extract(metadata, '$.fingerprint') = ?2
    ORDER BY updated_at DESC
    LIMIT 1
"#;

struct RecordRow {
    id: String,
    namespace: String,
    source_id: String,
    content: String,
    metadata: String,
    created_at: String,
    updated_at: String,
    days_date: String,
    embedding_status: String,
}

impl FromRow<'_, sqlx::sqlite::SqliteRow> for RecordRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            namespace: row.try_get("namespace")?,
            source_id: row.try_get("source_id")?,
            content: row.try_get("content")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            days_date: row.try_get("days_date")?,
            embedding_status: row.try_get("embedding_status")?,
        })
    }
}

impl TryFrom<RecordRow> for Record {
    type Error = anyhow::Error;

    fn try_from(row: RecordRow) -> Result<Self> {
        Ok(Record {
            id: row.id,
            namespace: row.namespace,
            source_id: row.source_id,
            content: row.content,
            metadata: serde_json::from_str::<Value>(&row.metadata).context("corrupt metadata json")?,
            created_at: row.created_at.parse().context("corrupt created_at timestamp")?,
            updated_at: row.updated_at.parse().context("corrupt updated_at timestamp")?,
            days_date: row.days_date,
            embedding_status: EmbeddingStatus::parse(&row.embedding_status)
                .context("corrupt embedding_status")?,
        })
    }
}

#[tracing::instrument(name = "store.store_item", skip(pool, record), fields(record.id = %record.id))]
pub(crate) async fn store_item(pool: &SqlitePool, record: &Record) -> Result<()> {
    let metadata = serde_json::to_string(&record.metadata).context("failed to serialize metadata")?;
    sqlx::query(STORE_ITEM_QUERY)
        .bind(&record.id)
        .bind(&record.namespace)
        .bind(&record.source_id)
        .bind(&record.content)
        .bind(metadata)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .bind(&record.days_date)
        .bind(record.embedding_status.as_str())
        .execute(pool)
        .await
        .context("failed to store item")?;
    Ok(())
}

#[tracing::instrument(name = "store.get_item", skip(pool))]
pub(crate) async fn get_item(pool: &SqlitePool, id: &str) -> Result<Option<Record>> {
    let row = sqlx::query_as::<_, RecordRow>(GET_ITEM_QUERY)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch item")?;
    row.map(Record::try_from).transpose()
}

#[tracing::instrument(name = "store.pending_embeddings", skip(pool), fields(namespace = %namespace))]
pub(crate) async fn pending_embeddings(pool: &SqlitePool, namespace: &str, limit: i64) -> Result<Vec<Record>> {
    let rows = sqlx::query_as::<_, RecordRow>(PENDING_EMBEDDINGS_QUERY)
        .bind(namespace)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("failed to fetch pending embeddings")?;
    rows.into_iter().map(Record::try_from).collect()
}

#[tracing::instrument(name = "store.update_embedding_status", skip(pool))]
pub(crate) async fn update_embedding_status(
    pool: &SqlitePool,
    id: &str,
    status: EmbeddingStatus,
) -> Result<()> {
    sqlx::query(UPDATE_EMBEDDING_STATUS_QUERY)
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await
        .context("failed to update embedding status")?;
    Ok(())
}

#[tracing::instrument(name = "store.delete_item", skip(pool))]
pub(crate) async fn delete_item(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query(DELETE_ITEM_QUERY)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete item")?;
    Ok(())
}

#[tracing::instrument(name = "store.clear_namespace", skip(pool), fields(namespace = %namespace))]
pub(crate) async fn clear_namespace(pool: &SqlitePool, namespace: &str) -> Result<u64> {
    let result = sqlx::query(CLEAR_NAMESPACE_QUERY)
        .bind(namespace)
        .execute(pool)
        .await
        .context("failed to clear namespace")?;
    Ok(result.rows_affected())
}

#[tracing::instrument(name = "store.get_items_by_date", skip(pool), fields(namespace = %namespace, days_date = %days_date))]
pub(crate) async fn get_items_by_date(pool: &SqlitePool, namespace: &str, days_date: &str) -> Result<Vec<Record>> {
    let rows = sqlx::query_as::<_, RecordRow>(GET_ITEMS_BY_DATE_QUERY)
        .bind(namespace)
        .bind(days_date)
        .fetch_all(pool)
        .await
        .context("failed to fetch items by date")?;
    rows.into_iter().map(Record::try_from).collect()
}

#[tracing::instrument(name = "store.reset_failed_embeddings", skip(pool), fields(namespace = %namespace))]
pub(crate) async fn reset_failed_embeddings(pool: &SqlitePool, namespace: &str) -> Result<u64> {
    let result = sqlx::query(RESET_FAILED_EMBEDDINGS_QUERY)
        .bind(namespace)
        .execute(pool)
        .await
        .context("failed to reset failed embeddings")?;
    Ok(result.rows_affected())
}

#[tracing::instrument(name = "store.count_pending_embeddings", skip(pool), fields(namespace = %namespace))]
pub(crate) async fn count_pending_embeddings(pool: &SqlitePool, namespace: &str) -> Result<i64> {
    let row = sqlx::query(COUNT_PENDING_EMBEDDINGS_QUERY)
        .bind(namespace)
        .fetch_one(pool)
        .await
        .context("failed to count pending embeddings")?;
    Ok(row.try_get::<i64, _>("count")?)
}

#[tracing::instrument(name = "store.existing_source_ids", skip(pool), fields(namespace = %namespace))]
pub(crate) async fn existing_source_ids(pool: &SqlitePool, namespace: &str) -> Result<std::collections::HashSet<String>> {
    let rows = sqlx::query(EXISTING_SOURCE_IDS_QUERY)
        .bind(namespace)
        .fetch_all(pool)
        .await
        .context("failed to fetch existing source ids")?;
    rows.iter().map(|row| row.try_get::<String, _>("source_id").map_err(anyhow::Error::from)).collect()
}

#[tracing::instrument(name = "store.find_by_fingerprint", skip(pool), fields(namespace = %namespace))]
pub(crate) async fn find_by_fingerprint(pool: &SqlitePool, namespace: &str, fingerprint: &str) -> Result<Option<Record>> {
    let row = sqlx::query_as::<_, RecordRow>(FIND_BY_FINGERPRINT_QUERY)
        .bind(namespace)
        .bind(fingerprint)
        .fetch_optional(pool)
        .await
        .context("failed to query by fingerprint")?;
    row.map(Record::try_from).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use serde_json::json;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query(crate::store::SCHEMA).execute(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn store_and_get_item_roundtrips() {
        let pool = test_pool().await;
        let mut record = Record::new("lifelog", "abc", "hello world", json!({"k": "v"}), chrono::Utc::now());
        record.days_date = "2026-07-28".to_string();
        store_item(&pool, &record).await.unwrap();

        let fetched = get_item(&pool, &record.id).await.unwrap().unwrap();
        assert_eq!(fetched.content, "hello world");
        assert_eq!(fetched.days_date, "2026-07-28");
        assert_eq!(fetched.embedding_status, EmbeddingStatus::Pending);
    }

    #[tokio::test]
    async fn pending_embeddings_filters_by_namespace_and_status() {
        let pool = test_pool().await;
        let mut r1 = Record::new("lifelog", "1", "a", json!({}), chrono::Utc::now());
        r1.days_date = "2026-07-28".to_string();
        let mut r2 = Record::new("news", "2", "b", json!({}), chrono::Utc::now());
        r2.days_date = "2026-07-28".to_string();
        store_item(&pool, &r1).await.unwrap();
        store_item(&pool, &r2).await.unwrap();
        update_embedding_status(&pool, &r2.id, EmbeddingStatus::Completed).await.unwrap();

        let pending = pending_embeddings(&pool, "lifelog", 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, r1.id);
    }

    #[tokio::test]
    async fn re_storing_with_changed_content_resets_embedding_status_to_pending() {
        let pool = test_pool().await;
        let mut record = Record::new("lifelog", "abc", "hello world", json!({"k": "v"}), chrono::Utc::now());
        record.days_date = "2026-07-28".to_string();
        store_item(&pool, &record).await.unwrap();
        update_embedding_status(&pool, &record.id, EmbeddingStatus::Completed).await.unwrap();

        record.content = "hello world, edited".to_string();
        record.updated_at = chrono::Utc::now();
        store_item(&pool, &record).await.unwrap();

        let fetched = get_item(&pool, &record.id).await.unwrap().unwrap();
        assert_eq!(fetched.content, "hello world, edited");
        assert_eq!(fetched.embedding_status, EmbeddingStatus::Pending);
    }

    #[tokio::test]
    async fn re_storing_with_unchanged_content_keeps_embedding_status() {
        let pool = test_pool().await;
        let mut record = Record::new("lifelog", "abc", "hello world", json!({"k": "v"}), chrono::Utc::now());
        record.days_date = "2026-07-28".to_string();
        store_item(&pool, &record).await.unwrap();
        update_embedding_status(&pool, &record.id, EmbeddingStatus::Completed).await.unwrap();

        record.updated_at = chrono::Utc::now();
        store_item(&pool, &record).await.unwrap();

        let fetched = get_item(&pool, &record.id).await.unwrap().unwrap();
        assert_eq!(fetched.embedding_status, EmbeddingStatus::Completed);
    }

    #[tokio::test]
    async fn pending_embeddings_orders_by_updated_at_ascending() {
        let pool = test_pool().await;
        let mut r1 = Record::new("lifelog", "1", "a", json!({}), chrono::Utc::now());
        r1.days_date = "2026-07-28".to_string();
        r1.updated_at = chrono::Utc::now() + chrono::Duration::seconds(10);
        let mut r2 = Record::new("lifelog", "2", "b", json!({}), chrono::Utc::now());
        r2.days_date = "2026-07-28".to_string();
        r2.updated_at = chrono::Utc::now();
        store_item(&pool, &r1).await.unwrap();
        store_item(&pool, &r2).await.unwrap();

        let pending = pending_embeddings(&pool, "lifelog", 10).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, r2.id);
        assert_eq!(pending[1].id, r1.id);
    }

    #[tokio::test]
    async fn existing_source_ids_returns_only_matching_namespace() {
        let pool = test_pool().await;
        let mut r1 = Record::new("twitter", "111", "a", json!({}), chrono::Utc::now());
        r1.days_date = "2026-07-28".to_string();
        let mut r2 = Record::new("lifelog", "222", "b", json!({}), chrono::Utc::now());
        r2.days_date = "2026-07-28".to_string();
        store_item(&pool, &r1).await.unwrap();
        store_item(&pool, &r2).await.unwrap();

        let ids = existing_source_ids(&pool, "twitter").await.unwrap();
        assert!(ids.contains("111"));
        assert!(!ids.contains("222"));
    }

    #[tokio::test]
    async fn clear_namespace_only_removes_matching_rows() {
        let pool = test_pool().await;
        let mut r1 = Record::new("lifelog", "1", "a", json!({}), chrono::Utc::now());
        r1.days_date = "2026-07-28".to_string();
        let mut r2 = Record::new("news", "2", "b", json!({}), chrono::Utc::now());
        r2.days_date = "2026-07-28".to_string();
        store_item(&pool, &r1).await.unwrap();
        store_item(&pool, &r2).await.unwrap();

        let affected = clear_namespace(&pool, "lifelog").await.unwrap();
        assert_eq!(affected, 1);
        assert!(get_item(&pool, &r1.id).await.unwrap().is_none());
        assert!(get_item(&pool, &r2.id).await.unwrap().is_some());
    }
}
