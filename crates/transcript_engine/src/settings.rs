use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, Utc};

pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(50);
pub const DEFAULT_MOUNT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_DELTA_CAPACITY: usize = 256;

/// Timestamp source for produced deltas.
pub type Clock = Rc<dyn Fn() -> DateTime<Utc>>;

/// How a batch of change records becomes a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionMode {
    /// Re-query every caption segment under the container.
    #[default]
    Snapshot,
    /// Use the text nodes added by the last record of the batch; batches
    /// without added text produce nothing.
    AddedText,
}

/// How accepted transcript requests are answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    /// Re-send everything observed since acceptance after each new delta.
    #[default]
    Stream,
    /// Answer once with the current snapshot.
    Snapshot,
}

#[derive(Clone)]
pub struct ExtractorSettings {
    pub mount_timeout: Duration,
    pub mode: ExtractionMode,
    /// Deltas buffered per subscriber before it starts lagging.
    pub delta_capacity: usize,
    pub clock: Clock,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            mount_timeout: DEFAULT_MOUNT_TIMEOUT,
            mode: ExtractionMode::default(),
            delta_capacity: DEFAULT_DELTA_CAPACITY,
            clock: Rc::new(Utc::now),
        }
    }
}

impl fmt::Debug for ExtractorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorSettings")
            .field("mount_timeout", &self.mount_timeout)
            .field("mode", &self.mode)
            .field("delta_capacity", &self.delta_capacity)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub debounce_window: Duration,
    pub response_mode: ResponseMode,
    pub extractor: ExtractorSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            response_mode: ResponseMode::default(),
            extractor: ExtractorSettings::default(),
        }
    }
}
