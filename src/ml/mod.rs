//! Model lifecycle - training, persistence and per-dataset model cache
//!
//! ```text
//!   train(dsid)                         predict(dsid, feature)
//!       │                                      │
//!       ▼                                      ▼
//!  SampleStore::find ──► TrainingSet     cache hit? ──yes──► classify
//!       │                    │                 │ no
//!       │              fit (blocking pool)     ▼
//!       │                    │           ModelRepository::load
//!       │                    ▼                 │
//!       │           ModelRepository::save      ▼
//!       │                    │           cache insert ──► classify
//!       └────────────► cache insert
//! ```
//!
//! Every cached model is keyed by the dsid it was trained on, so training
//! one dataset never changes predictions served for another.

pub mod centroid;
pub mod classifier;
pub mod knn;
pub mod manager;
pub mod repository;

pub use classifier::{Algorithm, FitParams};
pub use manager::{ModelManager, ModelStatus, TrainingSummary};
pub use repository::ModelRepository;

use crate::models::{Dsid, FeatureError};
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("DSID {dsid} has {found} datapoints")]
    InsufficientData { dsid: Dsid, found: usize },

    #[error("no trained model for DSID {dsid}")]
    ModelNotFound { dsid: Dsid },

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error("DSID {dsid}: sample {sample_id} has {found} values, expected {expected}")]
    InconsistentDimensions {
        dsid: Dsid,
        sample_id: String,
        expected: usize,
        found: usize,
    },

    #[error("model for DSID {dsid} expects {expected} values, got {got}")]
    DimensionMismatch { dsid: Dsid, expected: usize, got: usize },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("model file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("model encoding failed: {0}")]
    Codec(#[from] bincode::Error),

    #[error("model artifact for DSID {dsid} is unusable: {reason}")]
    Corrupt { dsid: Dsid, reason: String },

    #[error("training task failed: {0}")]
    Training(String),
}
