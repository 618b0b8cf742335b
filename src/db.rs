//! Database module - PostgreSQL connection and schema

use sqlx::{postgres::PgPoolOptions, PgPool};

/// Create database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Apply the schema (idempotent)
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await?;

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Labeled samples, partitioned by dataset id
CREATE TABLE IF NOT EXISTS labeled_samples (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    dsid INT NOT NULL CHECK (dsid >= 0),
    label TEXT NOT NULL,
    feature JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    seq BIGSERIAL
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_samples_dsid ON labeled_samples(dsid, seq);
"#;
