//! Classifier contract and the strategies behind it

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::centroid::NearestCentroid;
use super::knn::KNearestNeighbors;
use super::ModelError;
use crate::models::{Dsid, Sample};

/// Numeric view of one dataset: one row per sample, labels encoded as
/// indices into `classes` (sorted, deduplicated).
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub features: Array2<f64>,
    pub targets: Vec<usize>,
    pub classes: Vec<String>,
}

impl TrainingSet {
    pub fn from_samples(dsid: Dsid, samples: &[Sample]) -> Result<Self, ModelError> {
        let Some(first) = samples.first() else {
            return Err(ModelError::InsufficientData { dsid, found: 0 });
        };
        let dimension = first.feature.flatten()?.len();

        let mut values = Vec::with_capacity(samples.len() * dimension);
        for sample in samples {
            let row = sample.feature.flatten()?;
            if row.len() != dimension {
                return Err(ModelError::InconsistentDimensions {
                    dsid,
                    sample_id: sample.id.clone(),
                    expected: dimension,
                    found: row.len(),
                });
            }
            values.extend(row);
        }

        let classes: Vec<String> = samples
            .iter()
            .map(|s| s.label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: HashMap<&str, usize> = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        let targets = samples.iter().map(|s| index[s.label.as_str()]).collect();

        let features = Array2::from_shape_vec((samples.len(), dimension), values)
            .map_err(|e| ModelError::Training(e.to_string()))?;

        Ok(Self { features, targets, classes })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn dimension(&self) -> usize {
        self.features.ncols()
    }
}

/// Hyper-parameters shared by all strategies
#[derive(Debug, Clone)]
pub struct FitParams {
    pub knn_neighbors: usize,
}

impl Default for FitParams {
    fn default() -> Self {
        Self { knn_neighbors: 1 }
    }
}

/// A trainable classifier. Predictions are class indices of the
/// training set it was fitted on.
pub trait Classifier: Sized {
    fn fit(set: &TrainingSet, params: &FitParams) -> Result<Self, ModelError>;

    fn predict(&self, feature: ArrayView1<'_, f64>) -> usize;

    /// Fraction of the training set classified correctly
    fn accuracy(&self, set: &TrainingSet) -> f64 {
        if set.len() == 0 {
            return 0.0;
        }
        let correct = set
            .features
            .outer_iter()
            .zip(&set.targets)
            .filter(|(row, target)| self.predict(row.view()) == **target)
            .count();
        correct as f64 / set.len() as f64
    }
}

/// Training strategy requested by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Knn,
    Centroid,
    /// Fit every concrete strategy and keep the most accurate one
    Auto,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Algorithm::Knn => "knn",
            Algorithm::Centroid => "centroid",
            Algorithm::Auto => "auto",
        };
        f.write_str(name)
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "knn" => Ok(Algorithm::Knn),
            "centroid" => Ok(Algorithm::Centroid),
            "auto" => Ok(Algorithm::Auto),
            other => Err(format!("unknown algorithm '{}', expected knn, centroid or auto", other)),
        }
    }
}

impl Algorithm {
    /// Fit this strategy, returning the classifier and its training accuracy
    pub fn fit(self, set: &TrainingSet, params: &FitParams) -> Result<(FittedClassifier, f64), ModelError> {
        match self {
            Algorithm::Knn => {
                let model = KNearestNeighbors::fit(set, params)?;
                let accuracy = model.accuracy(set);
                Ok((FittedClassifier::Knn(model), accuracy))
            }
            Algorithm::Centroid => {
                let model = NearestCentroid::fit(set, params)?;
                let accuracy = model.accuracy(set);
                Ok((FittedClassifier::Centroid(model), accuracy))
            }
            Algorithm::Auto => {
                let (knn, knn_acc) = Algorithm::Knn.fit(set, params)?;
                let (centroid, centroid_acc) = Algorithm::Centroid.fit(set, params)?;
                tracing::debug!(knn_acc, centroid_acc, "auto selection candidates");
                if centroid_acc > knn_acc {
                    Ok((centroid, centroid_acc))
                } else {
                    Ok((knn, knn_acc))
                }
            }
        }
    }
}

/// A fitted classifier of any strategy; this is what gets persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FittedClassifier {
    Knn(KNearestNeighbors),
    Centroid(NearestCentroid),
}

impl FittedClassifier {
    pub fn predict(&self, feature: ArrayView1<'_, f64>) -> usize {
        match self {
            FittedClassifier::Knn(m) => m.predict(feature),
            FittedClassifier::Centroid(m) => m.predict(feature),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            FittedClassifier::Knn(_) => Algorithm::Knn,
            FittedClassifier::Centroid(_) => Algorithm::Centroid,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            FittedClassifier::Knn(m) => format!("KNN (k={}) classifier", m.k()),
            FittedClassifier::Centroid(_) => "Nearest centroid classifier".to_string(),
        }
    }
}

/// A classifier bound to the dataset it was trained on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub dsid: Dsid,
    pub classifier: FittedClassifier,
    pub classes: Vec<String>,
    pub dimension: usize,
    pub accuracy: f64,
    pub samples: usize,
    pub trained_at: DateTime<Utc>,
}

impl TrainedModel {
    pub fn fit(
        dsid: Dsid,
        algorithm: Algorithm,
        set: &TrainingSet,
        params: &FitParams,
    ) -> Result<Self, ModelError> {
        let (classifier, accuracy) = algorithm.fit(set, params)?;
        Ok(Self {
            dsid,
            classifier,
            classes: set.classes.clone(),
            dimension: set.dimension(),
            accuracy,
            samples: set.len(),
            trained_at: Utc::now(),
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.classifier.algorithm()
    }

    /// Predict the label for a flat feature vector
    pub fn predict(&self, feature: &[f64]) -> Result<&str, ModelError> {
        if feature.len() != self.dimension {
            return Err(ModelError::DimensionMismatch {
                dsid: self.dsid,
                expected: self.dimension,
                got: feature.len(),
            });
        }
        let class = self.classifier.predict(ArrayView1::from(feature));
        Ok(&self.classes[class])
    }

    pub fn summary(&self) -> String {
        format!("{} with accuracy {}", self.classifier.display_name(), self.accuracy)
    }
}
