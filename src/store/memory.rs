//! In-process sample store

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{DsidOrder, SampleFilter, SampleStore, StoreResult};
use crate::models::{NewSample, Sample};

#[derive(Debug, Default)]
pub struct MemorySampleStore {
    samples: RwLock<Vec<Sample>>,
}

impl MemorySampleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SampleStore for MemorySampleStore {
    async fn insert_one(&self, sample: NewSample) -> StoreResult<Sample> {
        let stored = Sample {
            id: Uuid::new_v4().to_string(),
            feature: sample.feature,
            label: sample.label,
            dsid: sample.dsid,
            created_at: Utc::now(),
        };
        self.samples.write().push(stored.clone());
        Ok(stored)
    }

    async fn find(&self, filter: SampleFilter, limit: Option<usize>) -> StoreResult<Vec<Sample>> {
        let samples = self.samples.read();
        Ok(samples
            .iter()
            .filter(|s| filter.matches(s))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn find_one(&self, filter: SampleFilter, order: DsidOrder) -> StoreResult<Option<Sample>> {
        let samples = self.samples.read();
        let matching = samples.iter().filter(|s| filter.matches(s));
        // max_by_key keeps the last of equal keys, so walk backwards to keep the earliest insert
        let found = match order {
            DsidOrder::Ascending => matching.min_by_key(|s| s.dsid),
            DsidOrder::Descending => matching.rev().max_by_key(|s| s.dsid),
        };
        Ok(found.cloned())
    }

    async fn delete_many(&self, filter: SampleFilter) -> StoreResult<u64> {
        let mut samples = self.samples.write();
        let before = samples.len();
        samples.retain(|s| !filter.matches(s));
        Ok((before - samples.len()) as u64)
    }
}
