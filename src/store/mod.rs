//! Sample store - the document collection holding labeled samples
//!
//! Handlers and the model manager only talk to [`SampleStore`]; the
//! PostgreSQL store is used in deployments, the in-memory one in tests and
//! when `STORE_BACKEND=memory`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::models::{Dsid, NewSample, Sample};

pub use memory::MemorySampleStore;
pub use postgres::PgSampleStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored sample {id} could not be decoded: {reason}")]
    Decode { id: String, reason: String },
}

/// Which samples an operation applies to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleFilter {
    pub dsid: Option<Dsid>,
}

impl SampleFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn dsid(dsid: Dsid) -> Self {
        Self { dsid: Some(dsid) }
    }

    pub fn matches(&self, sample: &Sample) -> bool {
        self.dsid.map_or(true, |d| d == sample.dsid)
    }
}

/// Sort order for `find_one`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DsidOrder {
    Ascending,
    Descending,
}

#[async_trait]
pub trait SampleStore: Send + Sync {
    /// Insert a sample and return it with its store-assigned id
    async fn insert_one(&self, sample: NewSample) -> StoreResult<Sample>;

    /// All matching samples in insertion order, optionally capped
    async fn find(&self, filter: SampleFilter, limit: Option<usize>) -> StoreResult<Vec<Sample>>;

    /// First matching sample after sorting on dsid
    async fn find_one(&self, filter: SampleFilter, order: DsidOrder) -> StoreResult<Option<Sample>>;

    /// Delete every matching sample, returning how many were removed
    async fn delete_many(&self, filter: SampleFilter) -> StoreResult<u64>;
}
