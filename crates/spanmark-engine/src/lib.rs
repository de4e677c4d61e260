pub mod anchoring;
pub mod config;
pub mod error;
pub mod geometry;
pub mod monitor;
pub mod overlap;
pub mod search;
pub mod session;
pub mod timing;
pub mod tree;

// Re-export key types for easier usage
pub use anchoring::{
    AcceptAll, BatchRestoreReport, IdFilter, Layer, LayerAttempt, RestoreData, RestoreResult, Restorer,
    SerializedSpan, Serializer, SpanId, VolatileIdFilter,
};
pub use config::EngineConfig;
pub use error::{ComparisonError, ConfigError, RestoreFailure, SerializeError, TreeError};
pub use geometry::{CachedGeometry, GeometryCache, InteractionDetector, SpatialIndex};
pub use monitor::{ChangeType, ContentMonitor, DriftEvent};
pub use overlap::{check_overlaps, classify, OverlapRecord, OverlapReport, OverlapType};
pub use search::{filter_candidates, find_matches, MatchCandidate};
pub use session::{Renderer, Session, SpanCapabilities, SpanInstance, Style};
pub use timing::{Clock, ManualClock, SystemClock};
pub use tree::{Boundary, Document, ElementPath, NodeId, NodeSpec, Rect, Span, TreeAdapter};
