//! Error handling

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::ml::ModelError;
use crate::models::FeatureError;
use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Request errors
    #[error("{0}")]
    InvalidInput(String),

    // Lifecycle errors
    #[error("DSID {dsid} has {found} datapoints, at least 2 are needed to train")]
    InsufficientData { dsid: u32, found: usize },

    #[error("No trained model for DSID {dsid}")]
    ModelNotFound { dsid: u32 },

    // Resource errors
    #[error("{0}")]
    NotFound(String),

    // Database / filesystem errors
    #[error("storage failure: {0}")]
    StorageFailure(String),

    // Generic errors
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::InsufficientData { .. }
            | AppError::ModelNotFound { .. }
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StorageFailure(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn dsid(&self) -> Option<u32> {
        match self {
            AppError::InsufficientData { dsid, .. } | AppError::ModelNotFound { dsid } => {
                Some(*dsid)
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let error_message = match &self {
            AppError::StorageFailure(msg) => {
                tracing::error!("Storage failure: {}", msg);
                "Storage error occurred".to_string()
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({
            "error": error_message,
            "status": status.as_u16()
        });
        if let Some(dsid) = self.dsid() {
            body["dsid"] = json!(dsid);
        }

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::StorageFailure(err.to_string())
    }
}

impl From<FeatureError> for AppError {
    fn from(err: FeatureError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InsufficientData { dsid, found } => {
                AppError::InsufficientData { dsid, found }
            }
            ModelError::ModelNotFound { dsid } => AppError::ModelNotFound { dsid },
            ModelError::Feature(e) => e.into(),
            ModelError::DimensionMismatch { .. } | ModelError::InconsistentDimensions { .. } => {
                AppError::InvalidInput(err.to_string())
            }
            ModelError::Store(e) => e.into(),
            ModelError::Io(_) | ModelError::Codec(_) | ModelError::Corrupt { .. } => {
                AppError::StorageFailure(err.to_string())
            }
            ModelError::Training(msg) => AppError::InternalError(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}
