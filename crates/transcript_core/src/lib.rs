//! Transcript core: pure caption types, message shapes and lifecycle rules.
mod delta;
mod dedupe;
pub mod hosts;
mod lifecycle;
mod message;

pub use dedupe::DistinctLines;
pub use delta::CaptionDelta;
pub use lifecycle::{advance, ExtractorPhase, LifecycleError, LifecycleEvent};
pub use message::{Message, TranscriptResponse};
