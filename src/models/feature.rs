//! Feature payloads and their flat numeric form
//!
//! A sample's feature is either a plain vector of numbers (accelerometer
//! windows) or a sequence of hand landmarks. Classifiers only ever see the
//! flat form, so train-time and predict-time payloads go through the same
//! `flatten` path. Landmarks flatten in submission order as `x, y` followed
//! by `z` for 3-D points.

use serde::{Deserialize, Serialize};

/// A single hand landmark. `z` is absent for 2-D points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Landmark {
    pub fn dims(&self) -> usize {
        if self.z.is_some() { 3 } else { 2 }
    }
}

/// Feature payload as submitted by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Feature {
    Values(Vec<f64>),
    Landmarks(Vec<Landmark>),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeatureError {
    #[error("feature must not be empty")]
    Empty,

    #[error("feature contains a non-finite value at position {0}")]
    NonFinite(usize),

    #[error("landmark {index} is {found}-D but the first landmark is {expected}-D")]
    MixedDimensions { index: usize, expected: usize, found: usize },

    #[error("landmark dimensionality must be 2 or 3, got {0}")]
    UnsupportedDimensions(usize),

    #[error("{len} values cannot be split into {dims}-D landmarks")]
    Ragged { len: usize, dims: usize },
}

impl Feature {
    /// Flat numeric vector in the order classifiers consume it
    pub fn flatten(&self) -> Result<Vec<f64>, FeatureError> {
        let values = match self {
            Feature::Values(values) => values.clone(),
            Feature::Landmarks(points) => flatten(points)?,
        };
        if values.is_empty() {
            return Err(FeatureError::Empty);
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(FeatureError::NonFinite(pos));
        }
        Ok(values)
    }

    /// `[min, max]` of the flattened values
    pub fn summary(&self) -> Result<[f64; 2], FeatureError> {
        let values = self.flatten()?;
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        Ok([min, max])
    }
}

/// Flatten landmarks into `x, y[, z]` per point. All points must share
/// the dimensionality of the first one.
pub fn flatten(points: &[Landmark]) -> Result<Vec<f64>, FeatureError> {
    let Some(first) = points.first() else {
        return Err(FeatureError::Empty);
    };
    let dims = first.dims();

    let mut out = Vec::with_capacity(points.len() * dims);
    for (index, point) in points.iter().enumerate() {
        if point.dims() != dims {
            return Err(FeatureError::MixedDimensions {
                index,
                expected: dims,
                found: point.dims(),
            });
        }
        out.push(point.x);
        out.push(point.y);
        if let Some(z) = point.z {
            out.push(z);
        }
    }
    Ok(out)
}

/// Inverse of [`flatten`] for a known dimensionality.
#[cfg(test)]
pub fn unflatten(values: &[f64], dims: usize) -> Result<Vec<Landmark>, FeatureError> {
    if dims != 2 && dims != 3 {
        return Err(FeatureError::UnsupportedDimensions(dims));
    }
    if values.is_empty() {
        return Err(FeatureError::Empty);
    }
    if values.len() % dims != 0 {
        return Err(FeatureError::Ragged { len: values.len(), dims });
    }

    Ok(values
        .chunks_exact(dims)
        .map(|c| Landmark {
            x: c[0],
            y: c[1],
            z: c.get(2).copied(),
        })
        .collect())
}
