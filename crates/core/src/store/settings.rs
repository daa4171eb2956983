//! Namespace-scoped key/value settings: sync cursors, last-run summaries, adapter state.

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

const GET_SETTING_QUERY: &str = r#"
    SELECT value FROM settings WHERE namespace = ?1 AND key = ?2
"#;

const SET_SETTING_QUERY: &str = r#"
    INSERT INTO settings (namespace, key, value)
    VALUES (?1, ?2, ?3)
    ON CONFLICT (namespace, key) DO UPDATE SET value = excluded.value
"#;

#[tracing::instrument(name = "store.get_setting", skip(pool), fields(namespace = %namespace, key = %key))]
pub(crate) async fn get_setting(pool: &SqlitePool, namespace: &str, key: &str) -> Result<Option<String>> {
    let row = sqlx::query(GET_SETTING_QUERY)
        .bind(namespace)
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("failed to fetch setting")?;
    Ok(row.map(|r| r.get::<String, _>("value")))
}

#[tracing::instrument(name = "store.set_setting", skip(pool, value), fields(namespace = %namespace, key = %key))]
pub(crate) async fn set_setting(pool: &SqlitePool, namespace: &str, key: &str, value: &str) -> Result<()> {
    sqlx::query(SET_SETTING_QUERY)
        .bind(namespace)
        .bind(key)
        .bind(value)
        .execute(pool)
        .await
        .context("failed to set setting")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query(crate::store::SCHEMA).execute(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let pool = test_pool().await;
        set_setting(&pool, "lifelog", "cursor", "abc123").await.unwrap();
        let value = get_setting(&pool, "lifelog", "cursor").await.unwrap();
        assert_eq!(value.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn overwriting_a_key_replaces_the_value() {
        let pool = test_pool().await;
        set_setting(&pool, "lifelog", "cursor", "first").await.unwrap();
        set_setting(&pool, "lifelog", "cursor", "second").await.unwrap();
        let value = get_setting(&pool, "lifelog", "cursor").await.unwrap();
        assert_eq!(value.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn missing_key_returns_none() {
        let pool = test_pool().await;
        let value = get_setting(&pool, "lifelog", "missing").await.unwrap();
        assert!(value.is_none());
    }
}
