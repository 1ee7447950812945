//! Collapse of same-plane clusters of adjacent chamber hits.
//!
//! A cluster is a maximal run of consecutive chamber hits on one plane
//! whose element ids step by at most one. Clusters are classified by size:
//!
//! - **2 hits**: a wide pair where both drift distances are large is one
//!   track seen by two cells, so the hit with the larger drift distance is
//!   dropped. A narrow-in-time pair on the D3p planes is an unresolved double
//!   hit and both are dropped.
//! - **3+ hits**: closely timed hits are electronic noise and are all
//!   dropped; otherwise the cluster is a delta ray and only its two ends
//!   survive.

use hitreduce_core::hit::Hit;
use hitreduce_core::ordering::{chamber_prefix_len, retain_marked};

/// Cluster collapse thresholds.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterConfig {
    /// Fraction of the half cell width above which a drift is "wide".
    pub pitch_fraction: f64,
    /// Ratio of the narrow threshold to the wide threshold.
    pub narrow_ratio: f64,
    /// Two-hit clusters closer in time than this are double hits.
    pub double_hit_window: f64,
    /// Planes on which double hits are dropped.
    pub double_hit_planes: (u16, u16),
    /// Clusters of 3+ hits with a smaller mean time step are noise.
    pub noise_dt_mean: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            pitch_fraction: 0.9,
            narrow_ratio: 4.0 / 9.0,
            double_hit_window: 8.0,
            double_hit_planes: (13, 18),
            noise_dt_mean: 10.0,
        }
    }
}

/// Cluster collapse stage.
#[derive(Clone, Debug, Default)]
pub struct ClusterCollapser {
    config: ClusterConfig,
}

impl ClusterCollapser {
    /// Create with custom configuration.
    #[must_use]
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// Get current configuration.
    #[must_use]
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Collapses clusters in the chamber prefix of a canonically sorted list.
    ///
    /// Returns the number of hits removed. Hits after the first non-chamber
    /// hit are untouched.
    ///
    /// A second pass removes nothing only if no two hits share a channel.
    /// Collapse duplicate channels first (see
    /// [`dedup_channels`](hitreduce_core::ordering::dedup_channels)), as the
    /// pipeline does when after-pulse removal is enabled.
    pub fn collapse(&self, hits: &mut Vec<Hit>) -> usize {
        let keep = self.mark(hits);
        retain_marked(hits, &keep)
    }

    /// Computes keep markers for the chamber prefix without modifying `hits`.
    #[must_use]
    pub fn mark(&self, hits: &[Hit]) -> Vec<bool> {
        let prefix = chamber_prefix_len(hits);
        let mut keep = vec![true; prefix];

        let mut start = 0;
        for i in 1..=prefix {
            let closes = i == prefix || {
                let prev = &hits[i - 1];
                let next = &hits[i];
                next.detector_id != prev.detector_id
                    || i32::from(next.element_id) - i32::from(prev.element_id) > 1
            };
            if closes {
                self.process_cluster(&hits[start..i], &mut keep[start..i]);
                start = i;
            }
        }

        keep
    }

    #[allow(clippy::cast_precision_loss)]
    fn process_cluster(&self, cluster: &[Hit], keep: &mut [bool]) {
        match cluster.len() {
            0 | 1 => {}
            2 => {
                let (front, back) = (&cluster[0], &cluster[1]);
                let wide = self.config.pitch_fraction * 0.5 * (back.pos - front.pos).abs();
                let narrow = wide * self.config.narrow_ratio;

                if (front.drift_distance > wide && back.drift_distance > narrow)
                    || (front.drift_distance > narrow && back.drift_distance > wide)
                {
                    if front.drift_distance > back.drift_distance {
                        keep[0] = false;
                    } else {
                        keep[1] = false;
                    }
                } else if (front.tdc_time - back.tdc_time).abs() < self.config.double_hit_window
                    && self.is_double_hit_plane(front.detector_id)
                {
                    keep[0] = false;
                    keep[1] = false;
                }
            }
            n => {
                let dt_sum: f64 = cluster
                    .windows(2)
                    .map(|pair| (pair[1].tdc_time - pair[0].tdc_time).abs())
                    .sum();
                let dt_mean = dt_sum / (n - 1) as f64;

                if dt_mean < self.config.noise_dt_mean {
                    keep.fill(false);
                } else {
                    keep[1..n - 1].fill(false);
                }
            }
        }
    }

    fn is_double_hit_plane(&self, plane: u16) -> bool {
        let (lo, hi) = self.config.double_hit_planes;
        (lo..=hi).contains(&plane)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hitreduce_core::ordering::dedup_channels;

    fn hit(plane: u16, element: u16, pos: f64, drift: f64, time: f64) -> Hit {
        Hit::new(plane, element, time).with_pos(pos).with_drift(drift)
    }

    #[test]
    fn test_singletons_untouched() {
        let mut hits = vec![
            hit(3, 5, 0.0, 0.3, 100.0),
            hit(3, 9, 2.5, 0.3, 100.0),
            hit(4, 5, 0.0, 0.3, 100.0),
        ];
        assert_eq!(ClusterCollapser::default().collapse(&mut hits), 0);
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_pair_drops_larger_drift() {
        // pitch 1.8 gives wide = 0.81 and narrow = 0.36
        let mut hits = vec![hit(14, 10, 0.0, 0.5, 100.0), hit(14, 11, 1.8, 1.2, 150.0)];
        assert_eq!(ClusterCollapser::default().collapse(&mut hits), 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].element_id, 10);
    }

    #[test]
    fn test_pair_double_hit_on_d3p() {
        let mut hits = vec![hit(15, 10, 0.0, 0.1, 100.0), hit(15, 11, 2.0, 0.1, 104.0)];
        assert_eq!(ClusterCollapser::default().collapse(&mut hits), 2);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_pair_double_hit_outside_d3p_kept() {
        let mut hits = vec![hit(20, 10, 0.0, 0.1, 100.0), hit(20, 11, 2.0, 0.1, 104.0)];
        assert_eq!(ClusterCollapser::default().collapse(&mut hits), 0);
    }

    #[test]
    fn test_noise_cluster_removed() {
        let mut hits = vec![
            hit(3, 5, 0.0, 0.1, 100.0),
            hit(3, 6, 0.6, 0.1, 103.0),
            hit(3, 7, 1.2, 0.1, 107.0),
        ];
        assert_eq!(ClusterCollapser::default().collapse(&mut hits), 3);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_delta_ray_keeps_ends() {
        let mut hits = vec![
            hit(9, 20, 0.0, 0.1, 100.0),
            hit(9, 21, 2.0, 0.1, 140.0),
            hit(9, 22, 4.0, 0.1, 180.0),
            hit(9, 23, 6.0, 0.1, 220.0),
        ];
        assert_eq!(ClusterCollapser::default().collapse(&mut hits), 2);
        let elements: Vec<u16> = hits.iter().map(|h| h.element_id).collect();
        assert_eq!(elements, vec![20, 23]);
    }

    #[test]
    fn test_stops_at_hodoscopes() {
        let mut hits = vec![
            hit(3, 5, 0.0, 0.1, 100.0),
            hit(3, 6, 0.6, 0.1, 101.0),
            hit(3, 7, 1.2, 0.1, 102.0),
            hit(25, 1, 0.0, 0.0, 100.0),
            hit(25, 2, 7.0, 0.0, 100.0),
            hit(25, 3, 14.0, 0.0, 100.0),
        ];
        assert_eq!(ClusterCollapser::default().collapse(&mut hits), 3);
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(Hit::is_hodoscope));
    }

    #[test]
    fn test_repeat_pass_needs_unique_channels() {
        let duplicated = vec![
            hit(15, 20, 0.0, 0.1, 300.0),
            hit(15, 20, 0.0, 0.1, 200.0),
            hit(15, 21, 2.0, 0.1, 304.0),
        ];
        let collapser = ClusterCollapser::default();

        // The repeated channel forms a three-hit cluster that loses its middle.
        let mut hits = duplicated.clone();
        assert_eq!(collapser.collapse(&mut hits), 1);
        assert_eq!(collapser.collapse(&mut hits), 2);

        let mut hits = duplicated;
        dedup_channels(&mut hits);
        assert_eq!(collapser.collapse(&mut hits), 2);
        assert_eq!(collapser.collapse(&mut hits), 0);
    }

    #[test]
    fn test_plane_change_splits_clusters() {
        let hits = vec![
            hit(3, 5, 0.0, 0.1, 100.0),
            hit(4, 6, 0.6, 0.1, 101.0),
            hit(4, 8, 1.2, 0.1, 102.0),
        ];
        let keep = ClusterCollapser::default().mark(&hits);
        assert_eq!(keep, vec![true, true, true]);
    }
}
