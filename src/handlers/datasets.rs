//! Dataset handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::{AppState, AppResult, AppError};
use crate::models::Dsid;
use crate::store::{DsidOrder, SampleFilter};

#[derive(Debug, Serialize)]
pub struct MaxDsidResponse {
    pub dsid: Dsid,
}

/// Largest dsid that currently holds samples
pub async fn max_dsid(State(state): State<AppState>) -> AppResult<Json<MaxDsidResponse>> {
    let sample = state
        .store
        .find_one(SampleFilter::all(), DsidOrder::Descending)
        .await?
        .ok_or_else(|| AppError::NotFound("No datasets currently created.".to_string()))?;

    Ok(Json(MaxDsidResponse { dsid: sample.dsid }))
}
