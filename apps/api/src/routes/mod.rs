pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::content::handlers as content;
use crate::masonry::handlers as masonry;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Content API
        .route("/api/v1/images", get(content::handle_list_images))
        .route(
            "/api/v1/images/sections",
            get(content::handle_image_sections),
        )
        .route("/api/v1/projects", get(content::handle_list_projects))
        .route("/api/v1/video", get(content::handle_get_video))
        // Layout API
        .route("/api/v1/layout", post(masonry::handle_layout))
        .route("/api/v1/images/layout", get(masonry::handle_image_layout))
        .with_state(state)
}
