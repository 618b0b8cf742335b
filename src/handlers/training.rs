//! Training and prediction handlers

use axum::{extract::{State, Query}, Json};
use serde::Deserialize;
use validator::Validate;

use crate::{AppState, AppResult, AppError};
use crate::extract::{JsonBody, PathParam};
use crate::ml::{Algorithm, ModelStatus, TrainingSummary};
use crate::models::{validate_dsid, PredictRequest, PredictResponse};

#[derive(Debug, Deserialize)]
pub struct TrainQuery {
    pub algorithm: Option<String>,
}

async fn run_training(
    state: &AppState,
    dsid: i64,
    algorithm: Option<Algorithm>,
) -> AppResult<Json<TrainingSummary>> {
    let dsid = validate_dsid(dsid, state.config.max_dsid)?;
    let summary = state.models.train(dsid, algorithm).await?;
    Ok(Json(summary))
}

/// Train a model for a dataset (`?algorithm=knn|centroid|auto`)
pub async fn train(
    State(state): State<AppState>,
    PathParam(dsid): PathParam<i64>,
    Query(query): Query<TrainQuery>,
) -> AppResult<Json<TrainingSummary>> {
    let algorithm = query
        .algorithm
        .map(|a| a.parse::<Algorithm>())
        .transpose()
        .map_err(AppError::InvalidInput)?;
    run_training(&state, dsid, algorithm).await
}

/// Nearest-neighbour training route
pub async fn train_knn(
    State(state): State<AppState>,
    PathParam(dsid): PathParam<i64>,
) -> AppResult<Json<TrainingSummary>> {
    run_training(&state, dsid, Some(Algorithm::Knn)).await
}

/// Let the server pick the most accurate strategy
pub async fn train_auto(
    State(state): State<AppState>,
    PathParam(dsid): PathParam<i64>,
) -> AppResult<Json<TrainingSummary>> {
    run_training(&state, dsid, Some(Algorithm::Auto)).await
}

/// Predict a label with the model trained for the request's dsid
pub async fn predict(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<PredictRequest>,
) -> AppResult<Json<PredictResponse>> {
    req.validate()?;
    let dsid = validate_dsid(req.dsid, state.config.max_dsid)?;
    let prediction = state.models.predict(dsid, &req.feature).await?;
    Ok(Json(PredictResponse { prediction }))
}

/// Whether a dataset's model is resident and/or persisted
pub async fn status(
    State(state): State<AppState>,
    PathParam(dsid): PathParam<i64>,
) -> AppResult<Json<ModelStatus>> {
    let dsid = validate_dsid(dsid, state.config.max_dsid)?;
    Ok(Json(state.models.status(dsid).await?))
}
