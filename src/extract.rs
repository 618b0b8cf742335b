//! Request extractors that reject with `AppError`
//!
//! axum's own `Json` and `Path` answer malformed input with plain-text
//! 400/415/422 responses. These wrappers route the rejection through
//! `AppError::InvalidInput` so clients always get the JSON error body.

use axum::extract::{FromRequest, FromRequestParts};

use crate::AppError;

/// JSON request body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// URL path parameters
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct PathParam<T>(pub T);
