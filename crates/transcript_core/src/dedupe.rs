use crate::CaptionDelta;

/// Collapses consecutive snapshots with identical lines.
///
/// The first snapshot of a run is kept, so its timestamp is the one the
/// consumer sees.
#[derive(Debug, Default, Clone)]
pub struct DistinctLines {
    last: Option<Vec<String>>,
}

impl DistinctLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when `delta` differs from the previously admitted one.
    pub fn admit(&mut self, delta: &CaptionDelta) -> bool {
        if self.last.as_ref() == Some(&delta.lines) {
            return false;
        }
        self.last = Some(delta.lines.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::DistinctLines;
    use crate::CaptionDelta;

    fn delta(secs: i64, lines: &[&str]) -> CaptionDelta {
        CaptionDelta::from_texts(Utc.timestamp_opt(secs, 0).unwrap(), lines)
    }

    #[test]
    fn repeated_lines_are_collapsed() {
        let mut filter = DistinctLines::new();
        assert!(filter.admit(&delta(1, &["a"])));
        assert!(!filter.admit(&delta(2, &["a"])));
        assert!(filter.admit(&delta(3, &["b"])));
        assert!(filter.admit(&delta(4, &["a"])));
    }
}
