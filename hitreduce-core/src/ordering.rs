//! Canonical ordering helpers over hit sequences.
//!
//! Every stage after admission relies on hits being sorted by
//! [`Hit::canonical_cmp`]: chamber planes first, then hodoscopes, then
//! proportional tubes, with elements ascending inside each plane.

use crate::hit::{Hit, LAST_CHAMBER_PLANE};
use std::cmp::Ordering;

/// Stable sort by the canonical (plane, element, time) order.
pub fn sort_canonical(hits: &mut [Hit]) {
    hits.sort_by(Hit::canonical_cmp);
}

/// Returns true if `hits` is non-decreasing under the canonical order.
#[must_use]
pub fn is_canonically_sorted(hits: &[Hit]) -> bool {
    hits.windows(2)
        .all(|pair| pair[0].canonical_cmp(&pair[1]) != Ordering::Greater)
}

/// Stable merge of two canonically sorted sequences.
///
/// On ties, elements of `left` come before elements of `right`.
#[must_use]
pub fn merge_sorted(left: Vec<Hit>, right: Vec<Hit>) -> Vec<Hit> {
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut right = right.into_iter().peekable();

    for hit in left {
        while let Some(next) = right.next_if(|r| r.canonical_cmp(&hit) == Ordering::Less) {
            merged.push(next);
        }
        merged.push(hit);
    }
    merged.extend(right);
    merged
}

/// Collapses consecutive hits on the same channel, keeping the first of each run.
///
/// Returns the number of hits removed.
pub fn dedup_channels(hits: &mut Vec<Hit>) -> usize {
    let before = hits.len();
    hits.dedup_by(|current, kept| kept.same_channel(current));
    before - hits.len()
}

/// Length of the leading run of chamber-plane hits in a sorted sequence.
#[must_use]
pub fn chamber_prefix_len(hits: &[Hit]) -> usize {
    hits.iter()
        .position(|hit| hit.detector_id > LAST_CHAMBER_PLANE)
        .unwrap_or(hits.len())
}

/// Keeps the hits whose `keep` marker is set, preserving order.
///
/// `keep` may be shorter than `hits`; hits past its end are retained.
pub fn retain_marked(hits: &mut Vec<Hit>, keep: &[bool]) -> usize {
    let before = hits.len();
    let mut index = 0;
    hits.retain(|_| {
        let kept = keep.get(index).copied().unwrap_or(true);
        index += 1;
        kept
    });
    before - hits.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_sorted_interleaves() {
        let chambers = vec![Hit::new(2, 5, 0.0), Hit::new(20, 1, 0.0), Hit::new(44, 3, 0.0)];
        let hodos = vec![Hit::new(25, 4, 0.0), Hit::new(33, 9, 0.0)];

        let merged = merge_sorted(chambers, hodos);
        let planes: Vec<u16> = merged.iter().map(|h| h.detector_id).collect();
        assert_eq!(planes, vec![2, 20, 25, 33, 44]);
        assert!(is_canonically_sorted(&merged));
    }

    #[test]
    fn test_merge_sorted_keeps_left_first_on_ties() {
        let left = vec![Hit::new(5, 5, 10.0).with_pos(1.0)];
        let right = vec![Hit::new(5, 5, 10.0).with_pos(2.0)];
        let merged = merge_sorted(left, right);
        assert_eq!(merged[0].pos, 1.0);
        assert_eq!(merged[1].pos, 2.0);
    }

    #[test]
    fn test_dedup_channels_keeps_latest_time() {
        let mut hits = vec![
            Hit::new(3, 7, 200.0),
            Hit::new(3, 7, 900.0),
            Hit::new(3, 8, 100.0),
        ];
        sort_canonical(&mut hits);
        let removed = dedup_channels(&mut hits);
        assert_eq!(removed, 1);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].tdc_time, 900.0);
    }

    #[test]
    fn test_chamber_prefix_len() {
        let hits = vec![Hit::new(1, 1, 0.0), Hit::new(24, 1, 0.0), Hit::new(25, 1, 0.0)];
        assert_eq!(chamber_prefix_len(&hits), 2);
        assert_eq!(chamber_prefix_len(&[]), 0);
    }

    #[test]
    fn test_retain_marked() {
        let mut hits = vec![Hit::new(1, 1, 0.0), Hit::new(1, 2, 0.0), Hit::new(1, 3, 0.0)];
        let removed = retain_marked(&mut hits, &[true, false]);
        assert_eq!(removed, 1);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].element_id, 3);
    }
}
