//! Model manager - per-dsid cache in front of the model repository

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;

use super::classifier::{Algorithm, FitParams, TrainedModel, TrainingSet};
use super::repository::ModelRepository;
use super::ModelError;
use crate::models::{Dsid, Feature};
use crate::store::{SampleFilter, SampleStore};

/// Metadata of a trained model, as reported to clients
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub dsid: Dsid,
    pub algorithm: Algorithm,
    pub accuracy: f64,
    pub samples: usize,
    pub dimension: usize,
    pub classes: Vec<String>,
    pub trained_at: DateTime<Utc>,
}

impl From<&TrainedModel> for ModelInfo {
    fn from(model: &TrainedModel) -> Self {
        Self {
            dsid: model.dsid,
            algorithm: model.algorithm(),
            accuracy: model.accuracy,
            samples: model.samples,
            dimension: model.dimension,
            classes: model.classes.clone(),
            trained_at: model.trained_at,
        }
    }
}

/// Result of a training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub summary: String,
    #[serde(flatten)]
    pub model: ModelInfo,
}

/// Where a dataset's model currently lives
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub dsid: Dsid,
    pub resident: bool,
    pub persisted: bool,
    pub artifact: String,
    pub model: Option<ModelInfo>,
}

type ModelCache = RwLock<HashMap<Dsid, Arc<TrainedModel>>>;

fn install(cache: &ModelCache, model: Arc<TrainedModel>) {
    let previous = cache.write().insert(model.dsid, Arc::clone(&model));
    if previous.is_some() {
        tracing::debug!("Replaced resident model for DSID {}", model.dsid);
    }
}

pub struct ModelManager {
    store: Arc<dyn SampleStore>,
    repository: ModelRepository,
    params: FitParams,
    default_algorithm: Algorithm,
    cache: Arc<ModelCache>,
    /// Serialises train and load for the same dsid
    locks: Mutex<HashMap<Dsid, Arc<AsyncMutex<()>>>>,
}

impl ModelManager {
    pub fn new(
        store: Arc<dyn SampleStore>,
        repository: ModelRepository,
        params: FitParams,
        default_algorithm: Algorithm,
    ) -> Self {
        Self {
            store,
            repository,
            params,
            default_algorithm,
            cache: Arc::new(RwLock::new(HashMap::new())),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn default_algorithm(&self) -> Algorithm {
        self.default_algorithm
    }

    fn dsid_lock(&self, dsid: Dsid) -> Arc<AsyncMutex<()>> {
        Arc::clone(self.locks.lock().entry(dsid).or_default())
    }

    /// Model currently held in memory for `dsid`
    pub fn resident(&self, dsid: Dsid) -> Option<Arc<TrainedModel>> {
        self.cache.read().get(&dsid).cloned()
    }

    pub fn resident_count(&self) -> usize {
        self.cache.read().len()
    }

    /// Fit a model from every stored sample of `dsid`, persist it and make
    /// it the resident model for that dsid.
    pub async fn train(
        &self,
        dsid: Dsid,
        algorithm: Option<Algorithm>,
    ) -> Result<TrainingSummary, ModelError> {
        let algorithm = algorithm.unwrap_or(self.default_algorithm);
        let guard = self.dsid_lock(dsid).lock_owned().await;

        let samples = self.store.find(SampleFilter::dsid(dsid), None).await?;
        if samples.len() < 2 {
            tracing::info!("DSID {} has {} datapoints, not training", dsid, samples.len());
            return Err(ModelError::InsufficientData { dsid, found: samples.len() });
        }

        let set = TrainingSet::from_samples(dsid, &samples)?;
        let params = self.params.clone();
        let model = tokio::task::spawn_blocking(move || TrainedModel::fit(dsid, algorithm, &set, &params))
            .await
            .map_err(|e| ModelError::Training(e.to_string()))??;

        // Save and install run detached, holding the dsid lock, so a dropped
        // request cannot leave a new artifact behind a stale resident model.
        let repository = self.repository.clone();
        let cache = Arc::clone(&self.cache);
        let persisted = tokio::spawn(async move {
            let _guard = guard;
            let path = repository.save(&model).await?;
            let model = Arc::new(model);
            install(&cache, Arc::clone(&model));
            Ok::<_, ModelError>((model, path))
        });
        let (model, path) = persisted
            .await
            .map_err(|e| ModelError::Training(e.to_string()))??;

        let summary = TrainingSummary {
            summary: model.summary(),
            model: ModelInfo::from(model.as_ref()),
        };

        tracing::info!(
            "Trained {} for DSID {} on {} samples (accuracy {:.3}), saved to {}",
            summary.model.algorithm,
            dsid,
            summary.model.samples,
            summary.model.accuracy,
            path.display()
        );
        Ok(summary)
    }

    /// Resident model for `dsid`, loading the persisted one on a miss
    async fn model_for(&self, dsid: Dsid) -> Result<Arc<TrainedModel>, ModelError> {
        if let Some(model) = self.resident(dsid) {
            return Ok(model);
        }

        let lock = self.dsid_lock(dsid);
        let _guard = lock.lock().await;
        // a concurrent train or load may have filled the slot while we waited
        if let Some(model) = self.resident(dsid) {
            return Ok(model);
        }

        tracing::info!("Loading model for DSID {} from disk", dsid);
        let model = self
            .repository
            .load(dsid)
            .await?
            .ok_or(ModelError::ModelNotFound { dsid })?;
        let model = Arc::new(model);
        install(&self.cache, Arc::clone(&model));
        Ok(model)
    }

    /// Predict the label of `feature` with the model trained for `dsid`
    pub async fn predict(&self, dsid: Dsid, feature: &Feature) -> Result<String, ModelError> {
        let values = feature.flatten()?;
        let model = self.model_for(dsid).await?;
        let label = model.predict(&values)?;
        tracing::debug!("DSID {} prediction: {}", dsid, label);
        Ok(label.to_string())
    }

    pub async fn status(&self, dsid: Dsid) -> Result<ModelStatus, ModelError> {
        let resident = self.resident(dsid);
        Ok(ModelStatus {
            dsid,
            resident: resident.is_some(),
            persisted: self.repository.exists(dsid).await?,
            artifact: self.artifact_path(dsid).display().to_string(),
            model: resident.as_deref().map(ModelInfo::from),
        })
    }

    pub fn artifact_path(&self, dsid: Dsid) -> PathBuf {
        self.repository.path_for(dsid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Landmark, NewSample};
    use crate::store::MemorySampleStore;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        store: Arc<MemorySampleStore>,
        manager: ModelManager,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemorySampleStore::new());
        let manager = ModelManager::new(
            store.clone(),
            ModelRepository::new(dir.path()),
            FitParams::default(),
            Algorithm::Knn,
        );
        Fixture { _dir: dir, store, manager }
    }

    async fn insert(store: &MemorySampleStore, dsid: Dsid, label: &str, values: &[f64]) {
        store
            .insert_one(NewSample {
                feature: Feature::Values(values.to_vec()),
                label: label.to_string(),
                dsid,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_train_then_predict_training_points() {
        let fx = fixture();
        insert(&fx.store, 1, "up", &[0.0, 1.0, 0.0]).await;
        insert(&fx.store, 1, "down", &[0.0, -1.0, 0.0]).await;
        insert(&fx.store, 1, "flat", &[0.0, 0.0, 1.0]).await;

        let summary = fx.manager.train(1, None).await.unwrap();
        assert_eq!(summary.model.samples, 3);
        assert_eq!(summary.model.algorithm, Algorithm::Knn);
        assert!(summary.summary.starts_with("KNN"));
        assert!(fx.manager.artifact_path(1).exists());

        for (label, values) in [("up", [0.0, 1.0, 0.0]), ("down", [0.0, -1.0, 0.0]), ("flat", [0.0, 0.0, 1.0])] {
            let got = fx.manager.predict(1, &Feature::Values(values.to_vec())).await.unwrap();
            assert_eq!(got, label);
        }
    }

    #[tokio::test]
    async fn test_insufficient_data_persists_nothing() {
        let fx = fixture();
        assert!(matches!(
            fx.manager.train(3, None).await,
            Err(ModelError::InsufficientData { dsid: 3, found: 0 })
        ));

        insert(&fx.store, 3, "only", &[1.0]).await;
        assert!(matches!(
            fx.manager.train(3, None).await,
            Err(ModelError::InsufficientData { dsid: 3, found: 1 })
        ));
        assert!(fx.manager.resident(3).is_none());
        assert!(!fx.manager.artifact_path(3).exists());
    }

    #[tokio::test]
    async fn test_predict_without_model() {
        let fx = fixture();
        let err = fx
            .manager
            .predict(8, &Feature::Values(vec![1.0, 2.0]))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::ModelNotFound { dsid: 8 }));
    }

    #[tokio::test]
    async fn test_cold_cache_loads_persisted_model() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemorySampleStore::new());
        insert(&store, 6, "a", &[1.0, 1.0]).await;
        insert(&store, 6, "b", &[9.0, 9.0]).await;

        let first = ModelManager::new(store.clone(), ModelRepository::new(dir.path()), FitParams::default(), Algorithm::Centroid);
        first.train(6, None).await.unwrap();
        let warm = first.predict(6, &Feature::Values(vec![8.0, 7.0])).await.unwrap();

        // fresh process: same models dir, empty cache
        let second = ModelManager::new(store, ModelRepository::new(dir.path()), FitParams::default(), Algorithm::Knn);
        assert!(second.resident(6).is_none());
        let cold = second.predict(6, &Feature::Values(vec![8.0, 7.0])).await.unwrap();
        assert_eq!(cold, warm);
        assert_eq!(second.resident(6).unwrap().algorithm(), Algorithm::Centroid);
    }

    #[tokio::test]
    async fn test_landmark_samples_align_with_predict_vectors() {
        let fx = fixture();
        let open = vec![
            Landmark { x: 0.1, y: 0.2, z: Some(0.3) },
            Landmark { x: 0.4, y: 0.5, z: Some(0.6) },
        ];
        let fist = vec![
            Landmark { x: 0.9, y: 0.9, z: Some(0.1) },
            Landmark { x: 0.8, y: 0.7, z: Some(0.2) },
        ];
        for (label, points) in [("open", &open), ("fist", &fist)] {
            fx.store
                .insert_one(NewSample {
                    feature: Feature::Landmarks(points.clone()),
                    label: label.to_string(),
                    dsid: 2,
                })
                .await
                .unwrap();
        }
        fx.manager.train(2, None).await.unwrap();

        // same landmarks submitted as a flat vector
        let flat = Feature::Values(vec![0.9, 0.9, 0.1, 0.8, 0.7, 0.2]);
        assert_eq!(fx.manager.predict(2, &flat).await.unwrap(), "fist");
        assert_eq!(fx.manager.predict(2, &Feature::Landmarks(open)).await.unwrap(), "open");
    }

    #[tokio::test]
    async fn test_wrong_dimension_fails_fast() {
        let fx = fixture();
        insert(&fx.store, 1, "a", &[0.0, 0.0]).await;
        insert(&fx.store, 1, "b", &[1.0, 1.0]).await;
        fx.manager.train(1, None).await.unwrap();

        let err = fx.manager.predict(1, &Feature::Values(vec![1.0])).await.unwrap_err();
        assert!(matches!(err, ModelError::DimensionMismatch { expected: 2, got: 1, .. }));
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_previous_model() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemorySampleStore::new());
        // models "dir" is a regular file, so every save fails
        let blocker = dir.path().join("models");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let manager = ModelManager::new(store.clone(), ModelRepository::new(&blocker), FitParams::default(), Algorithm::Knn);

        insert(&store, 4, "a", &[0.0]).await;
        insert(&store, 4, "b", &[1.0]).await;
        assert!(matches!(manager.train(4, None).await, Err(ModelError::Io(_))));
        assert!(manager.resident(4).is_none());
    }

    #[tokio::test]
    async fn test_retrain_replaces_resident_model() {
        let fx = fixture();
        insert(&fx.store, 5, "a", &[0.0]).await;
        insert(&fx.store, 5, "b", &[10.0]).await;
        fx.manager.train(5, None).await.unwrap();
        assert_eq!(fx.manager.predict(5, &Feature::Values(vec![9.0])).await.unwrap(), "b");

        insert(&fx.store, 5, "c", &[9.0]).await;
        let summary = fx.manager.train(5, Some(Algorithm::Centroid)).await.unwrap();
        assert_eq!(summary.model.samples, 3);
        assert_eq!(fx.manager.predict(5, &Feature::Values(vec![9.0])).await.unwrap(), "c");
        assert_eq!(fx.manager.resident(5).unwrap().algorithm(), Algorithm::Centroid);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_trains_do_not_cross_datasets() {
        let fx = fixture();
        let manager = Arc::new(fx.manager);

        // dsid d: label "d{d}-low" near 0, "d{d}-high" near 100
        for dsid in 0..8u32 {
            insert(&fx.store, dsid, &format!("d{}-low", dsid), &[0.0, dsid as f64]).await;
            insert(&fx.store, dsid, &format!("d{}-high", dsid), &[100.0, dsid as f64]).await;
        }

        let handles: Vec<_> = (0..8u32)
            .map(|dsid| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.train(dsid, None).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for dsid in 0..8u32 {
            let low = manager.predict(dsid, &Feature::Values(vec![1.0, 0.0])).await.unwrap();
            let high = manager.predict(dsid, &Feature::Values(vec![99.0, 0.0])).await.unwrap();
            assert_eq!(low, format!("d{}-low", dsid));
            assert_eq!(high, format!("d{}-high", dsid));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abandoned_train_still_installs_saved_model() {
        let fx = fixture();
        let manager = Arc::new(fx.manager);
        insert(&fx.store, 9, "a", &[0.0]).await;
        insert(&fx.store, 9, "b", &[10.0]).await;
        manager.train(9, None).await.unwrap();
        let path = manager.artifact_path(9);
        let before = std::fs::read(&path).unwrap();

        insert(&fx.store, 9, "c", &[9.0]).await;
        let request = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.train(9, None).await })
        };
        // drop the request as soon as the new artifact is on disk
        while std::fs::read(&path).unwrap() == before {
            tokio::task::yield_now().await;
        }
        request.abort();

        // the save task releases the dsid lock only after installing
        drop(manager.dsid_lock(9).lock().await);
        assert_eq!(manager.resident(9).unwrap().samples, 3);
        assert_eq!(manager.predict(9, &Feature::Values(vec![9.0])).await.unwrap(), "c");

        let leftovers = std::fs::read_dir(fx._dir.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_status_reports_residency() {
        let fx = fixture();
        let status = fx.manager.status(7).await.unwrap();
        assert!(!status.resident && !status.persisted && status.model.is_none());

        insert(&fx.store, 7, "a", &[0.0]).await;
        insert(&fx.store, 7, "b", &[1.0]).await;
        fx.manager.train(7, None).await.unwrap();

        let status = fx.manager.status(7).await.unwrap();
        assert!(status.resident && status.persisted);
        assert_eq!(status.model.unwrap().classes, vec!["a".to_string(), "b".to_string()]);
    }
}
