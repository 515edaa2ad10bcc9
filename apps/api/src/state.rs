use std::sync::Arc;

use crate::content::sections::PersonaSection;
use crate::content::store::ContentStore;
use crate::masonry::{DimensionProbe, MasonryConfig};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Table store for images, projects and the hero video.
    pub store: Arc<dyn ContentStore>,
    /// Resolves image references to intrinsic dimensions. Cached in production.
    pub probe: Arc<dyn DimensionProbe>,
    pub masonry: MasonryConfig,
    /// Sections of the image page, in display order.
    pub sections: Arc<Vec<PersonaSection>>,
}
