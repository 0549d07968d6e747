// Repository layer for the events table

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use telemetry_core::{EventType, RawRecord, RecordGetter};

use crate::models::*;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create database connection from URL
    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ============================================
    // Events
    // ============================================

    /// Insert a record. The read path never writes; this exists for tooling and tests.
    pub async fn insert_record(&self, input: CreateRecord) -> Result<RecordRow> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            INSERT INTO events (device_id, event_type, birth_date, death_date, data, nonce, alg, kid)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, device_id, event_type, birth_date, death_date, data, nonce, alg, kid
            "#,
        )
        .bind(&input.device_id)
        .bind(input.event_type.code())
        .bind(input.birth_date)
        .bind(input.death_date)
        .bind(&input.data)
        .bind(&input.nonce)
        .bind(&input.alg)
        .bind(&input.kid)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Most recent records of a device, newest first
    pub async fn list_records(&self, device_id: &str, limit: i64) -> Result<Vec<RecordRow>> {
        let rows = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT id, device_id, event_type, birth_date, death_date, data, nonce, alg, kid
            FROM events
            WHERE device_id = $1
            ORDER BY birth_date DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(device_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Most recent records of one event type, newest first
    pub async fn list_records_of_type(
        &self,
        device_id: &str,
        event_type: EventType,
        limit: i64,
    ) -> Result<Vec<RecordRow>> {
        let rows = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT id, device_id, event_type, birth_date, death_date, data, nonce, alg, kid
            FROM events
            WHERE device_id = $1 AND event_type = $2
            ORDER BY birth_date DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(device_id)
        .bind(event_type.code())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl RecordGetter for Database {
    async fn get_records(&self, device_id: &str, limit: usize) -> Result<Vec<RawRecord>> {
        let rows = self.list_records(device_id, sql_limit(limit)).await?;
        Ok(rows.into_iter().map(RawRecord::from).collect())
    }

    async fn get_records_of_type(
        &self,
        device_id: &str,
        limit: usize,
        event_type: EventType,
    ) -> Result<Vec<RawRecord>> {
        let rows = self
            .list_records_of_type(device_id, event_type, sql_limit(limit))
            .await?;
        Ok(rows.into_iter().map(RawRecord::from).collect())
    }
}
