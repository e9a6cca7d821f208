//! Caption extractors and the shared delta feed they hand out.
mod dom;
mod feed;

pub use dom::{CaptionSelectors, DomCaptionExtractor};
pub use feed::{DeltaFeed, DeltaStream};
pub(crate) use feed::LatestDelta;

use transcript_core::CaptionDelta;

/// Owns the attachment to one caption region of a live document.
///
/// Instances are single-use: `on_init` once, observe, `on_destroy`. A fresh
/// instance comes from the resolver for every binding.
pub trait TranscriptExtractor {
    /// Site identifier this extractor was registered under.
    fn id(&self) -> &str;

    /// Creates the latest-value holder from the current caption content.
    fn on_init(&mut self) -> &mut dyn TranscriptExtractor;

    /// Releases the change-subscription and any pending mount wait.
    /// Idempotent, and safe before `on_init`.
    fn on_destroy(&mut self);

    /// The delta feed. Repeated calls return the same shared feed.
    fn observable(&mut self) -> DeltaFeed;

    /// Copy of the last known delta, or an empty one.
    fn captions(&self) -> CaptionDelta;

    fn is_watching(&self) -> bool;
}
