// Masonry image layout: greedy shortest-column placement for the image gallery.
// The pass itself is pure (`engine`); `session` and `driver` decide when it runs.

pub mod driver;
pub mod engine;
pub mod gallery;
pub mod handlers;
pub mod item;
pub mod probe;
pub mod session;

// Re-export the public API consumed by other modules (state, config, models).
pub use engine::{Dimensions, MasonryConfig};
pub use item::LayoutRecord;
pub use probe::{CachedProbe, DimensionProbe, HttpDimensionProbe};
