use std::time::{Duration, Instant};

use async_trait::async_trait;
use hive_core::{HiveConfig, SqlValue, ViewerStatus};
use hive_query::ComposedQuery;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use tracing::{debug, warn};

use crate::{ListingStore, StoreError, ViewerDirectory};

const VIEWER_STATUS_SQL: &str = r#"
    SELECT to_jsonb(u) AS row
      FROM users u
     WHERE u.userid::text = $1
     LIMIT 1
"#;

/// Postgres-backed store. Every statement binds the composed values in order.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    slow_query_threshold: Option<Duration>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            slow_query_threshold: None,
        }
    }

    pub async fn connect(database_url: &str, config: &HiveConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.db_acquire_timeout)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool,
            slow_query_threshold: config.slow_query_threshold,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn log_if_slow(&self, label: &str, started: Instant) {
        let Some(threshold) = self.slow_query_threshold else {
            return;
        };
        let elapsed = started.elapsed();
        if elapsed >= threshold {
            warn!(query = label, elapsed_ms = elapsed.as_millis() as u64, "slow_query_detected");
        }
    }
}

fn bind_values<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    values: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for value in values {
        query = match value {
            SqlValue::Text(text) => query.bind(text.as_str()),
            SqlValue::Float(n) => query.bind(*n),
            SqlValue::Timestamp(t) => query.bind(*t),
        };
    }
    query
}

#[async_trait]
impl ListingStore for PgStore {
    async fn count(&self, table: &str, query: &ComposedQuery) -> Result<i64, StoreError> {
        let sql = query.count_statement(table);
        debug!(%sql, "count");
        let started = Instant::now();
        let row = bind_values(sqlx::query(&sql), &query.values)
            .fetch_one(&self.pool)
            .await;
        self.log_if_slow("listing_count", started);
        Ok(row?.try_get::<i64, _>("count")?)
    }

    async fn fetch_rows(
        &self,
        table: &str,
        query: &ComposedQuery,
    ) -> Result<Vec<Value>, StoreError> {
        let sql = query.select_statement(table);
        debug!(%sql, "select");
        let started = Instant::now();
        let rows = bind_values(sqlx::query(&sql), &query.values)
            .fetch_all(&self.pool)
            .await;
        self.log_if_slow("listing_select", started);

        let mut out = Vec::new();
        for row in rows? {
            out.push(row.try_get::<Value, _>("row")?);
        }
        Ok(out)
    }
}

#[async_trait]
impl ViewerDirectory for PgStore {
    async fn viewer_status(&self, viewer_id: &str) -> Result<Option<ViewerStatus>, StoreError> {
        let started = Instant::now();
        let row = sqlx::query(VIEWER_STATUS_SQL)
            .bind(viewer_id)
            .fetch_optional(&self.pool)
            .await;
        self.log_if_slow("viewer_status", started);

        let Some(row) = row? else {
            return Ok(None);
        };
        let raw: Value = row.try_get("row")?;
        serde_json::from_value(raw)
            .map(Some)
            .map_err(|source| StoreError::Decode { table: "users", source })
    }
}
