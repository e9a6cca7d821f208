use thiserror::Error;

/// Where an extractor instance is in its single-use lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractorPhase {
    /// Constructed, nothing created yet.
    #[default]
    Unattached,
    /// Latest-value holder exists; not observing the document yet.
    Initialized,
    /// Caption region located and a change-subscription is attached.
    Watching,
    /// Terminal. The instance must not be reused.
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Init,
    Attached,
    Destroy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("cannot apply {event:?} while {phase:?}")]
    InvalidTransition {
        phase: ExtractorPhase,
        event: LifecycleEvent,
    },
}

/// Pure transition function for the extractor lifecycle.
///
/// `Destroy` is accepted from every phase so teardown stays idempotent.
/// `Init` may be repeated before attaching; it recreates the holder.
pub fn advance(
    phase: ExtractorPhase,
    event: LifecycleEvent,
) -> Result<ExtractorPhase, LifecycleError> {
    use ExtractorPhase::*;
    use LifecycleEvent::*;

    match (phase, event) {
        (_, Destroy) => Ok(Destroyed),
        (Unattached | Initialized, Init) => Ok(Initialized),
        (Initialized, Attached) => Ok(Watching),
        (phase, event) => Err(LifecycleError::InvalidTransition { phase, event }),
    }
}
