//! Axum route handlers for portfolio content.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::content::sections::{filter_by_model, group_sections, SectionImages};
use crate::errors::AppError;
use crate::models::content::{ImageRow, ProjectRow, VideoRow};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ModelQuery {
    pub model: Option<String>,
}

/// GET /api/v1/images
///
/// All images in store order, optionally restricted to one `model`.
pub async fn handle_list_images(
    State(state): State<AppState>,
    Query(params): Query<ModelQuery>,
) -> Result<Json<Vec<ImageRow>>, AppError> {
    let images = state.store.images().await?;
    let images: Vec<ImageRow> = match params.model.as_deref() {
        Some(model) => filter_by_model(&images, model).into_iter().cloned().collect(),
        None => images,
    };
    Ok(Json(images))
}

/// GET /api/v1/images/sections
pub async fn handle_image_sections(
    State(state): State<AppState>,
) -> Result<Json<Vec<SectionImages>>, AppError> {
    let images = state.store.images().await?;
    Ok(Json(group_sections(&state.sections, &images)))
}

/// GET /api/v1/projects
pub async fn handle_list_projects(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProjectRow>>, AppError> {
    Ok(Json(state.store.projects().await?))
}

/// GET /api/v1/video
pub async fn handle_get_video(State(state): State<AppState>) -> Result<Json<VideoRow>, AppError> {
    state
        .store
        .video()
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No video has been published".to_string()))
}
