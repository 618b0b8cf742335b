//! Labeled sample handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::{AppState, AppResult, AppError};
use crate::extract::{JsonBody, PathParam};
use crate::models::{validate_dsid, CreateSample, SampleCollection, SampleSummary};
use crate::store::SampleFilter;

/// Insert a labeled sample, answering with its feature reduced to `[min, max]`
pub async fn create(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateSample>,
) -> AppResult<(StatusCode, Json<SampleSummary>)> {
    let sample = req.into_new_sample(state.config.max_dsid)?;
    let stored = state.store.insert_one(sample).await?;

    tracing::debug!("Stored sample {} for DSID {} ({})", stored.id, stored.dsid, stored.label);

    Ok((StatusCode::CREATED, Json(SampleSummary::from_sample(stored)?)))
}

/// List samples of a dataset, capped at the configured limit
pub async fn list(
    State(state): State<AppState>,
    PathParam(dsid): PathParam<i64>,
) -> AppResult<Json<SampleCollection>> {
    let dsid = validate_dsid(dsid, state.config.max_dsid)?;
    let datapoints = state
        .store
        .find(SampleFilter::dsid(dsid), Some(state.config.list_limit))
        .await?;
    Ok(Json(SampleCollection { datapoints }))
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub num_deleted_results: u64,
}

/// Delete every sample of a dataset. Persisted models are left untouched.
pub async fn delete_dataset(
    State(state): State<AppState>,
    PathParam(dsid): PathParam<i64>,
) -> AppResult<Json<DeleteResponse>> {
    let dsid = validate_dsid(dsid, state.config.max_dsid)?;
    let deleted = state.store.delete_many(SampleFilter::dsid(dsid)).await?;

    if deleted == 0 {
        return Err(AppError::NotFound(format!("DSID {} not found", dsid)));
    }

    tracing::info!("Deleted {} samples of DSID {}", deleted, dsid);
    Ok(Json(DeleteResponse { num_deleted_results: deleted }))
}
