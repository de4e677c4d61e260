//! Hit-testing support: memoized span geometry, a spatial grid over it and
//! the point detector that combines both.
//!
//! All rectangles stored here are in document coordinates (viewport plus
//! scroll offset), so scrolling never invalidates the grid.

pub mod cache;
pub mod interaction;
pub mod spatial;

pub use cache::{measure, CachedGeometry, GeometryCache};
pub use interaction::{Hit, HitPath, InteractionDetector};
pub use spatial::SpatialIndex;
