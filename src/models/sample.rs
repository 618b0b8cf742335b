//! Labeled sample model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::feature::Feature;
use crate::error::{AppError, AppResult};

/// Dataset identifier
pub type Dsid = u32;

/// A stored labeled observation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    pub feature: Feature,
    pub label: String,
    pub dsid: Dsid,
    pub created_at: DateTime<Utc>,
}

/// A sample ready to be inserted (validated, no id yet)
#[derive(Debug, Clone)]
pub struct NewSample {
    pub feature: Feature,
    pub label: String,
    pub dsid: Dsid,
}

/// Insert request body
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSample {
    #[validate(custom(function = "validate_feature"))]
    pub feature: Feature,
    #[validate(length(min = 1, max = 256))]
    pub label: String,
    pub dsid: i64,
}

impl CreateSample {
    pub fn into_new_sample(self, max_dsid: Dsid) -> AppResult<NewSample> {
        self.validate()?;
        let dsid = validate_dsid(self.dsid, max_dsid)?;
        Ok(NewSample {
            feature: self.feature,
            label: self.label,
            dsid,
        })
    }
}

/// Insert response: the stored sample with its feature reduced to `[min, max]`
#[derive(Debug, Serialize)]
pub struct SampleSummary {
    pub id: String,
    pub feature: [f64; 2],
    pub label: String,
    pub dsid: Dsid,
}

impl SampleSummary {
    pub fn from_sample(sample: Sample) -> AppResult<Self> {
        Ok(Self {
            feature: sample.feature.summary()?,
            id: sample.id,
            label: sample.label,
            dsid: sample.dsid,
        })
    }
}

/// Listing wrapper, never a bare top-level array
#[derive(Debug, Serialize)]
pub struct SampleCollection {
    pub datapoints: Vec<Sample>,
}

/// Predict request body
#[derive(Debug, Deserialize, Validate)]
pub struct PredictRequest {
    #[validate(custom(function = "validate_feature"))]
    pub feature: Feature,
    pub dsid: i64,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction: String,
}

/// Check a raw dataset id against the configured maximum
pub fn validate_dsid(dsid: i64, max_dsid: Dsid) -> AppResult<Dsid> {
    match Dsid::try_from(dsid) {
        Ok(d) if d <= max_dsid => Ok(d),
        _ => Err(AppError::InvalidInput(format!(
            "dsid must be between 0 and {}, got {}",
            max_dsid, dsid
        ))),
    }
}

fn validate_feature(feature: &Feature) -> Result<(), ValidationError> {
    feature.flatten().map(|_| ()).map_err(|e| {
        let mut err = ValidationError::new("feature");
        err.message = Some(e.to_string().into());
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dsid_bounds() {
        assert_eq!(validate_dsid(0, 50).unwrap(), 0);
        assert_eq!(validate_dsid(50, 50).unwrap(), 50);
        assert!(matches!(validate_dsid(51, 50), Err(AppError::InvalidInput(_))));
        assert!(matches!(validate_dsid(-1, 50), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_create_sample_validation() {
        let ok: CreateSample = serde_json::from_str(
            r#"{"feature": [{"x": 0.1, "y": 0.2}, {"x": 0.4, "y": 0.5}], "label": "open", "dsid": 2}"#,
        )
        .unwrap();
        let sample = ok.into_new_sample(50).unwrap();
        assert_eq!(sample.dsid, 2);
        assert_eq!(sample.label, "open");

        let empty_label: CreateSample =
            serde_json::from_str(r#"{"feature": [1.0], "label": "", "dsid": 2}"#).unwrap();
        assert!(matches!(empty_label.into_new_sample(50), Err(AppError::InvalidInput(_))));

        let mixed: CreateSample = serde_json::from_str(
            r#"{"feature": [{"x": 0.1, "y": 0.2, "z": 1.0}, {"x": 0.4, "y": 0.5}], "label": "a", "dsid": 2}"#,
        )
        .unwrap();
        assert!(matches!(mixed.into_new_sample(50), Err(AppError::InvalidInput(_))));
    }
}
