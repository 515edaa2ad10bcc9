//! Axum route handlers for the masonry layout API.

use axum::{
    extract::{Query, State},
    Json,
};
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::content::sections::filter_by_model;
use crate::errors::AppError;
use crate::masonry::engine::{compute_layout, Dimensions, LayoutResult, MasonryConfig};
use crate::masonry::item::LayoutRecord;
use crate::masonry::probe::measure_all;
use crate::masonry::session::{LayoutSession, PassOutcome};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LayoutItemInput {
    pub id: String,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct LayoutRequest {
    pub width: f64,
    pub items: Vec<LayoutItemInput>,
}

#[derive(Debug, Deserialize)]
pub struct ImageLayoutQuery {
    pub width: f64,
    pub model: Option<String>,
}

/// A zero-width container is not an error: the caller should measure again later.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LayoutResponse {
    Placed {
        layout: LayoutResult,
        /// Items left out of this pass because their size is unknown.
        unmeasured: Vec<String>,
    },
    Deferred {
        retry_after_ms: u64,
    },
}

impl LayoutResponse {
    fn deferred(config: &MasonryConfig) -> Self {
        LayoutResponse::Deferred {
            retry_after_ms: config.retry_delay(1).as_millis() as u64,
        }
    }
}

/// Widest container the API lays out, in CSS pixels.
pub const MAX_CONTAINER_WIDTH: f64 = 100_000.0;

fn validate_width(width: f64) -> Result<f64, AppError> {
    if !width.is_finite() || width < 0.0 {
        return Err(AppError::Validation(format!(
            "width must be a non-negative number, got {width}"
        )));
    }
    if width > MAX_CONTAINER_WIDTH {
        return Err(AppError::Validation(format!(
            "width must be at most {MAX_CONTAINER_WIDTH}, got {width}"
        )));
    }
    Ok(width)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/layout
///
/// Lays out caller-supplied items. Items without both dimensions are skipped.
pub async fn handle_layout(
    State(state): State<AppState>,
    Json(request): Json<LayoutRequest>,
) -> Result<Json<LayoutResponse>, AppError> {
    let width = validate_width(request.width)?;
    if request.items.iter().any(|item| item.id.trim().is_empty()) {
        return Err(AppError::Validation("item id cannot be empty".to_string()));
    }

    let inputs: Vec<(&str, Option<Dimensions>)> = request
        .items
        .iter()
        .map(|item| {
            let dimensions = match (item.width, item.height) {
                (Some(w), Some(h)) => Some(Dimensions::new(w, h)),
                _ => None,
            };
            (item.id.as_str(), dimensions)
        })
        .collect();

    let Some(layout) = compute_layout(width, inputs.iter().copied(), &state.masonry) else {
        return Ok(Json(LayoutResponse::deferred(&state.masonry)));
    };
    let placed: HashSet<usize> = layout.placements.iter().map(|p| p.index).collect();
    let unmeasured = inputs
        .iter()
        .enumerate()
        .filter(|(index, _)| !placed.contains(index))
        .map(|(_, (id, _))| id.to_string())
        .collect();

    Ok(Json(LayoutResponse::Placed { layout, unmeasured }))
}

/// GET /api/v1/images/layout?width=&model=
///
/// Loads images from the store, probes their sizes, and lays them out for `width`.
pub async fn handle_image_layout(
    State(state): State<AppState>,
    Query(params): Query<ImageLayoutQuery>,
) -> Result<Json<LayoutResponse>, AppError> {
    let width = validate_width(params.width)?;
    if width == 0.0 {
        return Ok(Json(LayoutResponse::deferred(&state.masonry)));
    }

    let images = state.store.images().await?;
    let records: Vec<LayoutRecord> = match params.model.as_deref() {
        Some(model) => filter_by_model(&images, model)
            .into_iter()
            .map(|img| img.to_layout_record())
            .collect(),
        None => images.iter().map(|img| img.to_layout_record()).collect(),
    };

    let mut session = LayoutSession::new(state.masonry.clone());
    session.replace_items(records.clone());
    let generation = session.generation();
    for (id, dimensions) in measure_all(state.probe.clone(), &records).await {
        session.record_measurement(generation, &id, dimensions);
    }
    session.resize(width);

    match session.flush() {
        PassOutcome::Placed { result, .. } => {
            let unmeasured = session.items().unmeasured_ids();
            debug!(
                placed = result.placements.len(),
                unmeasured = unmeasured.len(),
                "image layout computed"
            );
            Ok(Json(LayoutResponse::Placed {
                layout: result,
                unmeasured,
            }))
        }
        _ => Ok(Json(LayoutResponse::deferred(&state.masonry))),
    }
}
