//! Trigger-road analyzer interface.

use hitreduce_core::{Hit, RawEvent};

/// Which hodoscope hits a trigger analyzer should consider when trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerMode {
    /// Only hits synthesized from the trigger system.
    TriggerHitsOnly,
    /// Only digitized hodoscope hits.
    HitsOnly,
    /// Both digitized and trigger hits.
    Both,
}

impl TriggerMode {
    /// Mode used by the pipeline: both sources when trigger hits were merged.
    #[must_use]
    pub fn for_merge(merge_hodo: bool) -> Self {
        if merge_hodo {
            Self::Both
        } else {
            Self::TriggerHitsOnly
        }
    }

    /// True if digitized hodoscope hits are considered.
    #[must_use]
    pub fn uses_hits(self) -> bool {
        matches!(self, Self::HitsOnly | Self::Both)
    }

    /// True if trigger-system hits are considered.
    #[must_use]
    pub fn uses_trigger_hits(self) -> bool {
        matches!(self, Self::TriggerHitsOnly | Self::Both)
    }
}

/// Matches an event against trigger roads and rewrites its hodoscope hits.
///
/// Implementations may add or remove entries of `hodo_hits`; the pipeline
/// sorts the bucket afterwards. Analyzers are shared read-only between
/// pipelines, so any internal caches must be synchronized.
pub trait TriggerAnalyzer: Send + Sync {
    /// Trims the hodoscope bucket of one event.
    fn trim_event(&self, event: &RawEvent, hodo_hits: &mut Vec<Hit>, mode: TriggerMode);

    /// Analyzer name for logging.
    fn name(&self) -> &'static str {
        "trigger-analyzer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_for_merge() {
        assert_eq!(TriggerMode::for_merge(true), TriggerMode::Both);
        assert_eq!(TriggerMode::for_merge(false), TriggerMode::TriggerHitsOnly);
    }

    #[test]
    fn test_mode_sources() {
        assert!(TriggerMode::Both.uses_hits());
        assert!(TriggerMode::Both.uses_trigger_hits());
        assert!(!TriggerMode::TriggerHitsOnly.uses_hits());
        assert!(!TriggerMode::HitsOnly.uses_trigger_hits());
    }
}
