//! Nearest class centroid classifier

use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use super::classifier::{Classifier, FitParams, TrainingSet};
use super::ModelError;

/// One mean vector per class; row `i` belongs to class `i`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearestCentroid {
    centroids: Array2<f64>,
}

impl Classifier for NearestCentroid {
    fn fit(set: &TrainingSet, _params: &FitParams) -> Result<Self, ModelError> {
        let mut centroids = Array2::<f64>::zeros((set.classes.len(), set.dimension()));

        for (class, mut centroid) in centroids.outer_iter_mut().enumerate() {
            let members: Vec<usize> = set
                .targets
                .iter()
                .enumerate()
                .filter(|(_, t)| **t == class)
                .map(|(i, _)| i)
                .collect();
            let mean = set
                .features
                .select(Axis(0), &members)
                .mean_axis(Axis(0))
                .ok_or_else(|| {
                    ModelError::Training(format!("class '{}' has no samples", set.classes[class]))
                })?;
            centroid.assign(&mean);
        }

        Ok(Self { centroids })
    }

    fn predict(&self, feature: ArrayView1<'_, f64>) -> usize {
        self.centroids
            .outer_iter()
            .map(|c| {
                c.iter()
                    .zip(feature.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>()
            })
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map_or(0, |(class, _)| class)
    }
}
