//! Span anchoring: serialize a live span into layered restore data and
//! relocate it later through the restoration cascade.

pub mod filter;
pub mod model;
pub mod restore;
pub mod serializer;
pub mod similarity;

pub use filter::{AcceptAll, IdFilter, VolatileIdFilter};
pub use model::{
    AnchorPair, ElementSignature, EndAnchor, EndPath, MultiAnchorData, PathPair, RestoreData,
    RuntimeStatus, SerializedSpan, SpanId, StructuralFingerprint, TextContext,
};
pub use restore::{BatchRestoreReport, Layer, LayerAttempt, RestoreResult, Restorer};
pub use serializer::Serializer;
