//! PostgreSQL sample store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

use super::{DsidOrder, SampleFilter, SampleStore, StoreError, StoreResult};
use crate::models::{Feature, NewSample, Sample};

#[derive(Debug, FromRow)]
struct SampleRow {
    id: Uuid,
    dsid: i32,
    label: String,
    feature: Json<Feature>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SampleRow> for Sample {
    type Error = StoreError;

    fn try_from(row: SampleRow) -> Result<Self, Self::Error> {
        let dsid = u32::try_from(row.dsid).map_err(|_| StoreError::Decode {
            id: row.id.to_string(),
            reason: format!("negative dsid {}", row.dsid),
        })?;

        Ok(Sample {
            id: row.id.to_string(),
            feature: row.feature.0,
            label: row.label,
            dsid,
            created_at: row.created_at,
        })
    }
}

const COLUMNS: &str = "id, dsid, label, feature, created_at";

#[derive(Debug, Clone)]
pub struct PgSampleStore {
    pool: PgPool,
}

impl PgSampleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn dsid_param(filter: &SampleFilter) -> Option<i32> {
    filter.dsid.map(|d| d as i32)
}

#[async_trait]
impl SampleStore for PgSampleStore {
    async fn insert_one(&self, sample: NewSample) -> StoreResult<Sample> {
        let row = sqlx::query_as::<_, SampleRow>(&format!(
            r#"
            INSERT INTO labeled_samples (dsid, label, feature)
            VALUES ($1, $2, $3)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(sample.dsid as i32)
        .bind(&sample.label)
        .bind(Json(&sample.feature))
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn find(&self, filter: SampleFilter, limit: Option<usize>) -> StoreResult<Vec<Sample>> {
        // NULL limit means no limit in PostgreSQL
        let limit = limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX));

        let rows = sqlx::query_as::<_, SampleRow>(&format!(
            r#"
            SELECT {COLUMNS} FROM labeled_samples
            WHERE ($1::INT IS NULL OR dsid = $1)
            ORDER BY seq ASC
            LIMIT $2
            "#
        ))
        .bind(dsid_param(&filter))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Sample::try_from).collect()
    }

    async fn find_one(&self, filter: SampleFilter, order: DsidOrder) -> StoreResult<Option<Sample>> {
        let direction = match order {
            DsidOrder::Ascending => "ASC",
            DsidOrder::Descending => "DESC",
        };

        let row = sqlx::query_as::<_, SampleRow>(&format!(
            r#"
            SELECT {COLUMNS} FROM labeled_samples
            WHERE ($1::INT IS NULL OR dsid = $1)
            ORDER BY dsid {direction}, seq ASC
            LIMIT 1
            "#
        ))
        .bind(dsid_param(&filter))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Sample::try_from).transpose()
    }

    async fn delete_many(&self, filter: SampleFilter) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM labeled_samples WHERE ($1::INT IS NULL OR dsid = $1)")
            .bind(dsid_param(&filter))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
