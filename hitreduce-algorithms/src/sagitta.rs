//! Sagitta veto: three-station geometric consistency check.
//!
//! A track bent by the spectrometer magnet deviates from the straight line
//! joining its D3 hit to the vertex. For each D3/D2 pair of the same view the
//! veto builds two vertex hypotheses (target and beam dump), predicts where
//! the track crosses each D1 plane, and confirms every D1 hit falling inside
//! the union of the two acceptance windows. Chamber hits that take part in no
//! confirmed triple are removed.

use hitreduce_core::geometry::{GeometryOracle, PlaneType};
use hitreduce_core::hit::{Hit, Station};
use hitreduce_core::ordering::retain_marked;

/// Sagitta veto constants.
#[derive(Clone, Debug, PartialEq)]
pub struct SagittaConfig {
    /// Longitudinal position of the target.
    pub z_target: f64,
    /// Longitudinal position of the beam dump.
    pub z_dump: f64,
    /// Largest accepted |dx/dz| between D2 and D3.
    pub tx_max: f64,
    /// D1 sagitta to D2 sagitta ratio for target tracks.
    pub target_center: f64,
    /// Window half-width as a fraction of the D2 sagitta, target hypothesis.
    pub target_window: f64,
    /// D1 sagitta to D2 sagitta ratio for dump tracks.
    pub dump_center: f64,
    /// Window half-width as a fraction of the D2 sagitta, dump hypothesis.
    pub dump_window: f64,
    /// Smallest window half-width (drift chamber resolution).
    pub min_window: f64,
}

impl Default for SagittaConfig {
    fn default() -> Self {
        Self {
            z_target: -129.54,
            z_dump: 40.0,
            tx_max: 0.15,
            target_center: 1.85,
            target_window: 0.25,
            dump_center: 1.5,
            dump_window: 0.3,
            min_window: 0.07,
        }
    }
}

/// Index boundaries of the D1, D2 and D3 runs in a sorted chamber prefix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StationBounds {
    /// End of the D1 run (start of D2).
    pub d1_end: usize,
    /// End of the D2 run (start of D3).
    pub d2_end: usize,
    /// End of the D3 run.
    pub d3_end: usize,
}

impl StationBounds {
    /// Counts station membership over the chamber prefix.
    #[must_use]
    pub fn of(hits: &[Hit]) -> Self {
        let (mut n1, mut n2, mut n3) = (0, 0, 0);
        for hit in hits {
            match hit.station() {
                Some(Station::D1) => n1 += 1,
                Some(Station::D2) => n2 += 1,
                Some(Station::D3) => n3 += 1,
                None => break,
            }
        }
        Self {
            d1_end: n1,
            d2_end: n1 + n2,
            d3_end: n1 + n2 + n3,
        }
    }
}

/// Cached per-hit geometry used inside the triple loop.
struct Projection {
    pos: f64,
    z: f64,
    view: PlaneType,
}

/// Sagitta veto stage.
#[derive(Clone, Debug, Default)]
pub struct SagittaVeto {
    config: SagittaConfig,
}

impl SagittaVeto {
    /// Create with custom configuration.
    #[must_use]
    pub fn new(config: SagittaConfig) -> Self {
        Self { config }
    }

    /// Get current configuration.
    #[must_use]
    pub fn config(&self) -> &SagittaConfig {
        &self.config
    }

    /// Removes unconfirmed chamber hits from a canonically sorted list.
    ///
    /// Returns the number of hits removed. Hits beyond the D1-D3 range are
    /// retained unchanged.
    pub fn apply(&self, hits: &mut Vec<Hit>, geometry: &dyn GeometryOracle) -> usize {
        let confirmed = self.confirm(hits, geometry);
        retain_marked(hits, &confirmed)
    }

    /// Confirmation markers for the D1-D3 range of `hits`.
    #[must_use]
    pub fn confirm(&self, hits: &[Hit], geometry: &dyn GeometryOracle) -> Vec<bool> {
        let bounds = StationBounds::of(hits);
        let mut confirmed = vec![false; bounds.d3_end];

        let proj: Vec<Projection> = hits[..bounds.d3_end]
            .iter()
            .map(|hit| Projection {
                pos: hit.pos,
                z: geometry.plane_position(hit.detector_id),
                view: geometry.plane_type(hit.detector_id),
            })
            .collect();

        let cfg = &self.config;
        for i in bounds.d2_end..bounds.d3_end {
            let p3 = &proj[i];
            let slope_target = p3.pos / (p3.z - cfg.z_target);
            let slope_dump = p3.pos / (p3.z - cfg.z_dump);

            for j in bounds.d1_end..bounds.d2_end {
                let p2 = &proj[j];
                if p2.view != p3.view {
                    continue;
                }

                let tx = ((p3.pos - p2.pos) / (p2.z - p3.z)).abs();
                if tx.is_nan() || tx > cfg.tx_max {
                    continue;
                }

                let s2_target = p2.pos - slope_target * (p2.z - cfg.z_target);
                let s2_dump = p2.pos - slope_dump * (p2.z - cfg.z_dump);
                let win_target = (s2_target * cfg.target_window).abs().max(cfg.min_window);
                let win_dump = (s2_dump * cfg.dump_window).abs().max(cfg.min_window);

                for k in 0..bounds.d1_end {
                    let p1 = &proj[k];
                    if p1.view != p3.view {
                        continue;
                    }
                    if confirmed[i] && confirmed[j] && confirmed[k] {
                        continue;
                    }

                    let exp_target =
                        cfg.target_center * s2_target + slope_target * (p1.z - cfg.z_target);
                    let exp_dump = cfg.dump_center * s2_dump + slope_dump * (p1.z - cfg.z_dump);

                    let p_min = (exp_target - win_target).min(exp_dump - win_dump);
                    let p_max = (exp_target + win_target).max(exp_dump + win_dump);

                    if p1.pos > p_min && p1.pos < p_max {
                        confirmed[i] = true;
                        confirmed[j] = true;
                        confirmed[k] = true;
                    }
                }
            }
        }

        confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hitreduce_core::geometry::{GeometryTable, PlaneSpec};

    fn geometry() -> GeometryTable {
        GeometryTable::new()
            .with_plane(PlaneSpec::new(3, PlaneType::X, 600.0, 200, 0.635))
            .and_then(|g| g.with_plane(PlaneSpec::new(1, PlaneType::U, 598.0, 200, 0.635)))
            .and_then(|g| g.with_plane(PlaneSpec::new(9, PlaneType::X, 1340.0, 128, 2.0)))
            .and_then(|g| g.with_plane(PlaneSpec::new(15, PlaneType::X, 1900.0, 134, 2.0)))
            .unwrap()
    }

    fn on_target_line(plane: u16, slope: f64, geometry: &GeometryTable) -> Hit {
        let z = geometry.plane_position(plane);
        Hit::new(plane, 1, 0.0).with_pos(slope * (z - SagittaConfig::default().z_target))
    }

    #[test]
    fn test_station_bounds() {
        let hits = vec![
            Hit::new(1, 1, 0.0),
            Hit::new(3, 1, 0.0),
            Hit::new(9, 1, 0.0),
            Hit::new(15, 1, 0.0),
            Hit::new(20, 1, 0.0),
            Hit::new(26, 1, 0.0),
            Hit::new(3, 1, 0.0),
        ];
        let bounds = StationBounds::of(&hits);
        assert_eq!(bounds.d1_end, 2);
        assert_eq!(bounds.d2_end, 3);
        assert_eq!(bounds.d3_end, 5);
    }

    #[test]
    fn test_straight_target_track_confirmed() {
        let geometry = geometry();
        let mut hits = vec![
            on_target_line(3, 0.01, &geometry),
            on_target_line(9, 0.01, &geometry),
            on_target_line(15, 0.01, &geometry),
        ];
        let veto = SagittaVeto::default();
        assert_eq!(veto.apply(&mut hits, &geometry), 0);
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_stray_d1_hit_removed() {
        let geometry = geometry();
        let mut hits = vec![
            on_target_line(3, 0.01, &geometry),
            on_target_line(9, 0.01, &geometry),
            on_target_line(15, 0.01, &geometry),
        ];
        hits.insert(1, Hit::new(3, 150, 0.0).with_pos(-40.0));

        let veto = SagittaVeto::default();
        assert_eq!(veto.apply(&mut hits, &geometry), 1);
        assert!(hits.iter().all(|h| h.pos > -40.0));
    }

    #[test]
    fn test_view_mismatch_not_confirmed() {
        let geometry = geometry();
        // D1 hit on a U plane cannot confirm an X pair.
        let mut hits = vec![
            on_target_line(1, 0.01, &geometry),
            on_target_line(9, 0.01, &geometry),
            on_target_line(15, 0.01, &geometry),
        ];
        let veto = SagittaVeto::default();
        assert_eq!(veto.apply(&mut hits, &geometry), 3);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_steep_pair_rejected() {
        let geometry = geometry();
        let mut hits = vec![
            on_target_line(3, 0.01, &geometry),
            Hit::new(9, 1, 0.0).with_pos(-100.0),
            Hit::new(15, 1, 0.0).with_pos(100.0),
        ];
        let veto = SagittaVeto::default();
        assert_eq!(veto.apply(&mut hits, &geometry), 3);
    }

    #[test]
    fn test_non_chamber_hits_retained() {
        let geometry = geometry();
        let mut hits = vec![Hit::new(3, 1, 0.0), Hit::new(27, 1, 0.0), Hit::new(45, 1, 0.0)];
        let veto = SagittaVeto::default();
        assert_eq!(veto.apply(&mut hits, &geometry), 1);
        assert_eq!(hits.len(), 2);
    }
}
