//! k-nearest-neighbours classifier (euclidean distance)

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::classifier::{Classifier, FitParams, TrainingSet};
use super::ModelError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNearestNeighbors {
    k: usize,
    n_classes: usize,
    points: Array2<f64>,
    targets: Vec<usize>,
}

impl KNearestNeighbors {
    pub fn k(&self) -> usize {
        self.k
    }
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl Classifier for KNearestNeighbors {
    fn fit(set: &TrainingSet, params: &FitParams) -> Result<Self, ModelError> {
        if set.len() == 0 {
            return Err(ModelError::Training("knn needs at least one sample".to_string()));
        }
        Ok(Self {
            k: params.knn_neighbors.clamp(1, set.len()),
            n_classes: set.classes.len(),
            points: set.features.clone(),
            targets: set.targets.clone(),
        })
    }

    /// Majority vote among the `k` nearest points. A tied vote goes to the
    /// class of the nearest point among the tied classes; equal distances
    /// keep training order.
    fn predict(&self, feature: ArrayView1<'_, f64>) -> usize {
        let mut neighbours: Vec<(f64, usize)> = self
            .points
            .outer_iter()
            .enumerate()
            .map(|(i, row)| (squared_distance(row, feature), i))
            .collect();
        neighbours.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        neighbours.truncate(self.k);

        let mut votes = vec![0usize; self.n_classes];
        for (_, i) in &neighbours {
            votes[self.targets[*i]] += 1;
        }
        let best = votes.iter().copied().max().unwrap_or(0);

        neighbours
            .iter()
            .map(|(_, i)| self.targets[*i])
            .find(|class| votes[*class] == best)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn set() -> TrainingSet {
        TrainingSet {
            features: array![[0.0, 0.0], [0.0, 1.0], [10.0, 10.0], [10.0, 11.0], [0.5, 0.5]],
            targets: vec![0, 0, 1, 1, 1],
            classes: vec!["a".into(), "b".into()],
        }
    }

    #[test]
    fn test_one_neighbour_memorises_training_set() {
        let set = set();
        let knn = KNearestNeighbors::fit(&set, &FitParams::default()).unwrap();
        assert_eq!(knn.accuracy(&set), 1.0);
        assert_eq!(knn.predict(array![0.4, 0.6].view()), 1);
        assert_eq!(knn.predict(array![0.0, 0.9].view()), 0);
    }

    #[test]
    fn test_majority_vote() {
        let knn = KNearestNeighbors::fit(&set(), &FitParams { knn_neighbors: 3 }).unwrap();
        // nearest three: [0,0](a), [0.5,0.5](b), [0,1](a)
        assert_eq!(knn.predict(array![0.1, 0.2].view()), 0);
    }

    #[test]
    fn test_tie_goes_to_nearest() {
        let knn = KNearestNeighbors::fit(&set(), &FitParams { knn_neighbors: 2 }).unwrap();
        // [0.5,0.5](b) is nearest, [0,1](a) second: one vote each
        assert_eq!(knn.predict(array![0.6, 0.6].view()), 1);
    }

    #[test]
    fn test_k_clamped_to_training_size() {
        let knn = KNearestNeighbors::fit(&set(), &FitParams { knn_neighbors: 99 }).unwrap();
        assert_eq!(knn.k(), 5);
        // every point votes: three b against two a
        assert_eq!(knn.predict(array![0.0, 0.0].view()), 1);
    }
}
