//! Raw event container.

use crate::hit::{Hit, PlaneGroup, MAX_PLANE_ID};
use crate::ordering::sort_canonical;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Trigger bits 0..=4 are NIM triggers.
pub const NIM_TRIGGER_MASK: u32 = 0b0000_0001_1111;
/// Trigger bits 5..=9 are matrix (trigger-road) triggers.
pub const MATRIX_TRIGGER_MASK: u32 = 0b11_1110_0000;

/// All hits recorded for one physics event.
///
/// The container owns the hit storage. Reduction replaces [`RawEvent::hits`]
/// wholesale and then calls [`RawEvent::reindex`] to rebuild the per-plane
/// lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvent {
    /// Run number.
    #[serde(default)]
    pub run_id: u32,
    /// Spill number within the run.
    #[serde(default)]
    pub spill_id: u32,
    /// Event number within the spill.
    #[serde(default)]
    pub event_id: u32,
    /// Fired trigger bits.
    #[serde(default)]
    pub trigger_bits: u32,
    /// All digitized hits.
    #[serde(default)]
    pub hits: Vec<Hit>,
    /// Hodoscope hits reconstructed from the trigger system.
    #[serde(default)]
    pub trigger_hits: Vec<Hit>,
    #[serde(skip)]
    plane_ranges: Vec<Range<usize>>,
}

impl RawEvent {
    /// Creates an event from its hit lists and builds the per-plane index.
    #[must_use]
    pub fn new(hits: Vec<Hit>, trigger_hits: Vec<Hit>) -> Self {
        let mut event = Self {
            hits,
            trigger_hits,
            ..Self::default()
        };
        event.reindex();
        event
    }

    /// Sets run, spill and event numbers.
    #[must_use]
    pub fn with_ids(mut self, run_id: u32, spill_id: u32, event_id: u32) -> Self {
        self.run_id = run_id;
        self.spill_id = spill_id;
        self.event_id = event_id;
        self
    }

    /// Sets the fired trigger bits.
    #[must_use]
    pub fn with_trigger_bits(mut self, trigger_bits: u32) -> Self {
        self.trigger_bits = trigger_bits;
        self
    }

    /// Replaces the hit storage and rebuilds the index.
    pub fn replace_hits(&mut self, hits: Vec<Hit>) {
        self.hits = hits;
        self.reindex();
    }

    /// Sorts hits canonically and rebuilds the per-plane ranges.
    pub fn reindex(&mut self) {
        sort_canonical(&mut self.hits);

        self.plane_ranges.clear();
        self.plane_ranges.resize(usize::from(MAX_PLANE_ID) + 1, 0..0);

        let mut start = 0;
        while start < self.hits.len() {
            let plane = self.hits[start].detector_id;
            let len = self.hits[start..]
                .iter()
                .take_while(|hit| hit.detector_id == plane)
                .count();
            if let Some(range) = self.plane_ranges.get_mut(usize::from(plane)) {
                *range = start..start + len;
            }
            start += len;
        }
    }

    /// Hits on one plane. Empty if the event has not been indexed.
    #[must_use]
    pub fn hits_in_plane(&self, plane: u16) -> &[Hit] {
        self.plane_ranges
            .get(usize::from(plane))
            .and_then(|range| self.hits.get(range.clone()))
            .unwrap_or(&[])
    }

    /// Number of hits on one plane.
    #[must_use]
    pub fn plane_hit_count(&self, plane: u16) -> usize {
        self.hits_in_plane(plane).len()
    }

    /// Number of drift-chamber hits.
    #[must_use]
    pub fn chamber_hit_count(&self) -> usize {
        self.count_group(PlaneGroup::Chamber)
    }

    /// Number of hodoscope hits.
    #[must_use]
    pub fn hodo_hit_count(&self) -> usize {
        self.count_group(PlaneGroup::Hodoscope)
    }

    /// Number of proportional-tube hits.
    #[must_use]
    pub fn prop_hit_count(&self) -> usize {
        self.count_group(PlaneGroup::PropTube)
    }

    fn count_group(&self, group: PlaneGroup) -> usize {
        self.hits.iter().filter(|hit| hit.group() == group).count()
    }

    /// True when only NIM triggers fired.
    #[must_use]
    pub fn is_nim_only(&self) -> bool {
        self.trigger_bits & NIM_TRIGGER_MASK != 0 && self.trigger_bits & MATRIX_TRIGGER_MASK == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reindex_builds_plane_ranges() {
        let event = RawEvent::new(
            vec![
                Hit::new(26, 3, 0.0),
                Hit::new(2, 10, 0.0),
                Hit::new(2, 4, 0.0),
                Hit::new(14, 1, 0.0),
            ],
            Vec::new(),
        );

        assert_eq!(event.hits[0].element_id, 4);
        assert_eq!(event.plane_hit_count(2), 2);
        assert_eq!(event.plane_hit_count(14), 1);
        assert_eq!(event.plane_hit_count(26), 1);
        assert_eq!(event.plane_hit_count(7), 0);
        assert_eq!(event.chamber_hit_count(), 3);
        assert_eq!(event.hodo_hit_count(), 1);
        assert_eq!(event.prop_hit_count(), 0);
    }

    #[test]
    fn test_replace_hits_reindexes() {
        let mut event = RawEvent::new(vec![Hit::new(1, 1, 0.0)], Vec::new());
        event.replace_hits(vec![Hit::new(9, 2, 0.0), Hit::new(9, 1, 0.0)]);
        assert_eq!(event.plane_hit_count(1), 0);
        assert_eq!(event.hits_in_plane(9)[0].element_id, 1);
    }

    #[test]
    fn test_unindexed_event_has_no_plane_view() {
        let event = RawEvent {
            hits: vec![Hit::new(3, 3, 0.0)],
            ..RawEvent::default()
        };
        assert!(event.hits_in_plane(3).is_empty());
        assert_eq!(event.chamber_hit_count(), 1);
    }

    #[test]
    fn test_nim_only() {
        let event = RawEvent::default().with_trigger_bits(0b1);
        assert!(event.is_nim_only());
        let event = RawEvent::default().with_trigger_bits(0b10_0001);
        assert!(!event.is_nim_only());
        assert!(!RawEvent::default().is_nim_only());
    }
}
