use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of the visible caption lines.
///
/// Equality compares `lines` only; two snapshots taken at different times
/// with the same text are the same caption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionDelta {
    pub time: DateTime<Utc>,
    pub lines: Vec<String>,
}

impl CaptionDelta {
    pub fn new(time: DateTime<Utc>, lines: Vec<String>) -> Self {
        Self { time, lines }
    }

    /// Empty snapshot, used before the caption region exists.
    pub fn empty(time: DateTime<Utc>) -> Self {
        Self {
            time,
            lines: Vec::new(),
        }
    }

    /// Builds a snapshot from raw text fragments, trimming each one and
    /// dropping the ones that end up empty.
    pub fn from_texts<I, S>(time: DateTime<Utc>, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines = texts
            .into_iter()
            .map(|text| text.as_ref().trim().to_string())
            .filter(|text| !text.is_empty())
            .collect();
        Self { time, lines }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl PartialEq for CaptionDelta {
    fn eq(&self, other: &Self) -> bool {
        self.lines == other.lines
    }
}

impl Eq for CaptionDelta {}
