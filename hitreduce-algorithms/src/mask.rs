//! Hodoscope masking lookup table.
//!
//! Maps each hodoscope paddle to the chamber element intervals it
//! geometrically covers, and each chamber element back to the paddles that
//! cover it. The table is built once from the geometry and is read-only
//! afterwards, so it can be shared between pipelines behind an `Arc`.

use hitreduce_core::geometry::{ElementInterval, GeometryOracle};
use hitreduce_core::hit::{unique_id, Hit, LAST_CHAMBER_PLANE, LAST_HODO_PLANE};
use std::collections::HashMap;

/// Paddle-to-chamber coverage lookup and its inverse.
#[derive(Clone, Debug, Default)]
pub struct HodoscopeMaskTable {
    forward: HashMap<u32, Vec<ElementInterval>>,
    inverse: HashMap<u32, Vec<u32>>,
}

impl HodoscopeMaskTable {
    /// Builds the table from every hodoscope paddle's coverage.
    #[must_use]
    pub fn build(geometry: &dyn GeometryOracle) -> Self {
        let mut forward = HashMap::new();
        for hodo_plane in (LAST_CHAMBER_PLANE + 1)..=LAST_HODO_PLANE {
            for paddle in 1..=geometry.element_count(hodo_plane) {
                let intervals = geometry.paddle_coverage(hodo_plane, paddle);
                if !intervals.is_empty() {
                    forward.insert(unique_id(hodo_plane, paddle), intervals);
                }
            }
        }

        let table = Self::from_forward(forward);
        if table.is_empty() {
            log::warn!("hodoscope mask table is empty: every chamber hit will be masked");
        } else {
            log::debug!(
                "hodoscope mask table: {} paddles, {} chamber elements",
                table.paddle_count(),
                table.element_count()
            );
        }
        table
    }

    /// Builds the table from an explicit paddle-to-interval mapping.
    #[must_use]
    pub fn from_forward(forward: HashMap<u32, Vec<ElementInterval>>) -> Self {
        let mut inverse: HashMap<u32, Vec<u32>> = HashMap::new();
        for (&paddle_uid, intervals) in &forward {
            for interval in intervals {
                for chamber_uid in interval.unique_ids() {
                    inverse.entry(chamber_uid).or_default().push(paddle_uid);
                }
            }
        }
        for paddles in inverse.values_mut() {
            paddles.sort_unstable();
            paddles.dedup();
        }

        Self { forward, inverse }
    }

    /// Chamber intervals covered by a paddle.
    #[must_use]
    pub fn intervals_for(&self, paddle_uid: u32) -> &[ElementInterval] {
        self.forward.get(&paddle_uid).map_or(&[], Vec::as_slice)
    }

    /// Paddles covering a chamber element, sorted by unique id.
    #[must_use]
    pub fn paddles_for(&self, chamber_uid: u32) -> &[u32] {
        self.inverse.get(&chamber_uid).map_or(&[], Vec::as_slice)
    }

    /// Iterates over `(paddle unique id, intervals)` pairs.
    pub fn paddles(&self) -> impl Iterator<Item = (u32, &[ElementInterval])> {
        self.forward.iter().map(|(&uid, v)| (uid, v.as_slice()))
    }

    /// Iterates over `(chamber unique id, paddle unique ids)` pairs.
    pub fn elements(&self) -> impl Iterator<Item = (u32, &[u32])> {
        self.inverse.iter().map(|(&uid, v)| (uid, v.as_slice()))
    }

    /// Number of paddles with coverage.
    #[must_use]
    pub fn paddle_count(&self) -> usize {
        self.forward.len()
    }

    /// Number of covered chamber elements.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.inverse.len()
    }

    /// True if no paddle covers anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// True if some paddle covering `hit` fired.
    ///
    /// `sorted_hodo_hits` must be in canonical order.
    #[must_use]
    pub fn is_confirmed(&self, hit: &Hit, sorted_hodo_hits: &[Hit]) -> bool {
        self.paddles_for(hit.unique_id()).iter().any(|&paddle_uid| {
            sorted_hodo_hits
                .binary_search_by(|h| h.unique_id().cmp(&paddle_uid))
                .is_ok()
        })
    }

    /// Removes chamber hits not confirmed by any covering paddle hit.
    ///
    /// Hits above the hodoscope planes (proportional tubes) are never masked.
    /// Returns the number of hits removed.
    pub fn apply(&self, chamber_hits: &mut Vec<Hit>, sorted_hodo_hits: &[Hit]) -> usize {
        let before = chamber_hits.len();
        chamber_hits.retain(|hit| {
            hit.detector_id > LAST_HODO_PLANE || self.is_confirmed(hit, sorted_hodo_hits)
        });
        before - chamber_hits.len()
    }
}
