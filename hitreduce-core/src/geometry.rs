//! Detector geometry queries.
//!
//! Reduction stages only read geometry through [`GeometryOracle`]. The
//! concrete [`GeometryTable`] is built in code or loaded from a JSON
//! description and is immutable once handed to a pipeline, so a single
//! instance can be shared (`Arc`) by every worker.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use crate::error::{Error, Result};
use crate::hit::{
    unique_id, Station, LAST_CHAMBER_PLANE, LAST_HODO_PLANE, MAX_ELEMENT_ID, MAX_PLANE_ID,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Measurement view of a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaneType {
    /// Wires/paddles measure x.
    X,
    /// Stereo view rotated one way.
    U,
    /// Stereo view rotated the other way.
    V,
    /// Wires/paddles measure y.
    Y,
    /// Plane not described by the geometry.
    Other,
}

impl PlaneType {
    /// Numeric view code: X=1, U=2, V=3, Y=4, other=0.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::X => 1,
            Self::U => 2,
            Self::V => 3,
            Self::Y => 4,
            Self::Other => 0,
        }
    }
}

/// Inclusive range of elements on one chamber plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementInterval {
    /// Chamber plane the interval lives on.
    pub chamber_plane: u16,
    /// First covered element.
    pub lo: u16,
    /// Last covered element.
    pub hi: u16,
}

impl ElementInterval {
    /// Creates an interval.
    #[must_use]
    pub fn new(chamber_plane: u16, lo: u16, hi: u16) -> Self {
        Self {
            chamber_plane,
            lo,
            hi,
        }
    }

    /// True if the interval covers the given chamber channel.
    #[must_use]
    pub fn contains(&self, plane: u16, element: u16) -> bool {
        plane == self.chamber_plane && (self.lo..=self.hi).contains(&element)
    }

    /// Unique ids of every covered chamber element.
    pub fn unique_ids(&self) -> impl Iterator<Item = u32> + '_ {
        (self.lo..=self.hi).map(|element| unique_id(self.chamber_plane, element))
    }
}

/// Read-only query surface over static detector geometry.
///
/// Plane ids outside the described detector are a caller contract
/// violation; implementations must document what they return for them.
pub trait GeometryOracle: Send + Sync {
    /// Measurement view of a plane.
    fn plane_type(&self, plane: u16) -> PlaneType;

    /// Calibrated transverse position of an element.
    fn measurement(&self, plane: u16, element: u16) -> f64;

    /// Drift distance for a TDC time on a plane.
    fn drift_distance(&self, plane: u16, tdc_time: f64) -> f64;

    /// Longitudinal (z) position of a plane.
    fn plane_position(&self, plane: u16) -> f64;

    /// Number of elements on a plane.
    fn element_count(&self, plane: u16) -> u16;

    /// Chamber elements geometrically covered by one hodoscope paddle.
    fn paddle_coverage(&self, hodo_plane: u16, paddle: u16) -> Vec<ElementInterval>;
}

/// Static description of one plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneSpec {
    /// Plane id.
    pub id: u16,
    /// Detector name, e.g. `D1X`.
    #[serde(default)]
    pub name: String,
    /// Measurement view.
    #[serde(rename = "type")]
    pub plane_type: PlaneType,
    /// Longitudinal position.
    pub z: f64,
    /// Number of elements.
    pub n_elements: u16,
    /// Element pitch.
    pub spacing: f64,
    /// Transverse offset of the plane centre.
    #[serde(default)]
    pub offset: f64,
    /// TDC time corresponding to zero drift distance.
    #[serde(default)]
    pub t0: f64,
    /// Drift distance per TDC unit.
    #[serde(default)]
    pub drift_velocity: f64,
    /// Largest reachable drift distance.
    #[serde(default)]
    pub max_drift: f64,
}

impl PlaneSpec {
    /// Creates a plane with no offset and no r-t calibration.
    #[must_use]
    pub fn new(id: u16, plane_type: PlaneType, z: f64, n_elements: u16, spacing: f64) -> Self {
        Self {
            id,
            name: String::new(),
            plane_type,
            z,
            n_elements,
            spacing,
            offset: 0.0,
            t0: 0.0,
            drift_velocity: 0.0,
            max_drift: 0.0,
        }
    }

    /// Sets the detector name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the transverse offset.
    #[must_use]
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Sets a linear r-t relation.
    #[must_use]
    pub fn with_rt(mut self, t0: f64, drift_velocity: f64, max_drift: f64) -> Self {
        self.t0 = t0;
        self.drift_velocity = drift_velocity;
        self.max_drift = max_drift;
        self
    }

    /// Element position: centred on the plane, one pitch per element.
    #[must_use]
    pub fn element_position(&self, element: u16) -> f64 {
        let centre = (f64::from(self.n_elements) + 1.0) / 2.0;
        self.offset + self.spacing * (f64::from(element) - centre)
    }

    /// Linear r-t conversion clamped to `[0, max_drift]`.
    #[must_use]
    pub fn drift_for(&self, tdc_time: f64) -> f64 {
        ((self.t0 - tdc_time) * self.drift_velocity).clamp(0.0, self.max_drift.max(0.0))
    }

    fn validate(&self) -> Result<()> {
        if self.id == 0 || self.id > MAX_PLANE_ID {
            return Err(Error::InvalidPlane(self.id));
        }
        if self.spacing <= 0.0 || !self.spacing.is_finite() {
            return Err(Error::Geometry(format!(
                "plane {} has non-positive spacing {}",
                self.id, self.spacing
            )));
        }
        if self.n_elements > MAX_ELEMENT_ID {
            return Err(Error::Geometry(format!(
                "plane {} has {} elements, at most {MAX_ELEMENT_ID} are supported",
                self.id, self.n_elements
            )));
        }
        Ok(())
    }
}

/// Geometry held in memory, indexed by plane id.
///
/// Unknown planes report [`PlaneType::Other`], zero position, zero
/// measurement and drift, no elements and no paddle coverage.
#[derive(Debug, Clone, Default)]
pub struct GeometryTable {
    planes: Vec<Option<PlaneSpec>>,
    coverage: HashMap<u32, Vec<ElementInterval>>,
}

// Intermediate structs for the JSON schema
#[derive(Deserialize)]
struct JsonGeometry {
    planes: Vec<PlaneSpec>,
    #[serde(default)]
    hodo_coverage: Vec<JsonCoverage>,
    #[serde(default)]
    derive_coverage: bool,
}

#[derive(Deserialize)]
struct JsonCoverage {
    hodo_plane: u16,
    paddle: u16,
    chamber_plane: u16,
    lo: u16,
    hi: u16,
}

/// Chamber stations read out behind each X hodoscope plane.
const HODO_STATIONS: [(u16, Station); 6] = [
    (25, Station::D1),
    (26, Station::D1),
    (31, Station::D2),
    (32, Station::D2),
    (33, Station::D3),
    (34, Station::D3),
];

impl GeometryTable {
    /// Creates an empty geometry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            planes: vec![None; usize::from(MAX_PLANE_ID) + 1],
            coverage: HashMap::new(),
        }
    }

    /// Adds or replaces a plane description.
    ///
    /// # Errors
    /// Returns an error if the plane id is out of range or the pitch is not positive.
    pub fn add_plane(&mut self, plane: PlaneSpec) -> Result<()> {
        plane.validate()?;
        let slot = usize::from(plane.id);
        if self.planes.len() <= slot {
            self.planes.resize(usize::from(MAX_PLANE_ID) + 1, None);
        }
        self.planes[slot] = Some(plane);
        Ok(())
    }

    /// Builder-style [`GeometryTable::add_plane`].
    ///
    /// # Errors
    /// See [`GeometryTable::add_plane`].
    pub fn with_plane(mut self, plane: PlaneSpec) -> Result<Self> {
        self.add_plane(plane)?;
        Ok(self)
    }

    /// Records that a hodoscope paddle covers a chamber element range.
    ///
    /// # Errors
    /// Returns an error if `hodo_plane` is not a hodoscope plane, the interval
    /// is not on a chamber plane, or `lo > hi`.
    pub fn add_coverage(
        &mut self,
        hodo_plane: u16,
        paddle: u16,
        interval: ElementInterval,
    ) -> Result<()> {
        if hodo_plane <= LAST_CHAMBER_PLANE || hodo_plane > LAST_HODO_PLANE {
            return Err(Error::Geometry(format!(
                "coverage source {hodo_plane} is not a hodoscope plane"
            )));
        }
        if interval.chamber_plane == 0 || interval.chamber_plane > LAST_CHAMBER_PLANE {
            return Err(Error::Geometry(format!(
                "coverage target {} is not a chamber plane",
                interval.chamber_plane
            )));
        }
        if interval.lo > interval.hi {
            return Err(Error::Geometry(format!(
                "coverage interval {}..={} on plane {} is inverted",
                interval.lo, interval.hi, interval.chamber_plane
            )));
        }
        if paddle > MAX_ELEMENT_ID || interval.hi > MAX_ELEMENT_ID {
            return Err(Error::Geometry(format!(
                "coverage of paddle {paddle} on plane {hodo_plane} exceeds element {MAX_ELEMENT_ID}"
            )));
        }
        self.coverage
            .entry(unique_id(hodo_plane, paddle))
            .or_default()
            .push(interval);
        Ok(())
    }

    /// Returns the description of a plane, if known.
    #[must_use]
    pub fn plane(&self, plane: u16) -> Option<&PlaneSpec> {
        self.planes.get(usize::from(plane)).and_then(Option::as_ref)
    }

    /// Iterates over all described planes in id order.
    pub fn planes(&self) -> impl Iterator<Item = &PlaneSpec> {
        self.planes.iter().flatten()
    }

    /// Number of paddles with recorded coverage.
    #[must_use]
    pub fn coverage_len(&self) -> usize {
        self.coverage.len()
    }

    /// Fills paddle coverage from element positions.
    ///
    /// Each X-hodoscope paddle in front of a chamber station covers, on every
    /// plane of that station, the elements whose measured position falls
    /// within the paddle width widened by one chamber pitch. Stereo angles
    /// are ignored. Existing coverage is replaced.
    pub fn derive_coverage(&mut self) {
        self.coverage.clear();
        let mut derived = Vec::new();

        for (hodo_plane, station) in HODO_STATIONS {
            let Some(hodo) = self.plane(hodo_plane) else {
                continue;
            };
            for paddle in 1..=hodo.n_elements {
                let centre = hodo.element_position(paddle);
                let half_width = hodo.spacing / 2.0;

                for chamber_plane in station.planes() {
                    let Some(chamber) = self.plane(chamber_plane) else {
                        continue;
                    };
                    let lo_edge = centre - half_width - chamber.spacing;
                    let hi_edge = centre + half_width + chamber.spacing;
                    let covered: Vec<u16> = (1..=chamber.n_elements)
                        .filter(|&e| {
                            let pos = chamber.element_position(e);
                            pos >= lo_edge && pos <= hi_edge
                        })
                        .collect();
                    if let (Some(&lo), Some(&hi)) = (covered.first(), covered.last()) {
                        derived.push((hodo_plane, paddle, ElementInterval::new(chamber_plane, lo, hi)));
                    }
                }
            }
        }

        for (hodo_plane, paddle, interval) in derived {
            self.coverage
                .entry(unique_id(hodo_plane, paddle))
                .or_default()
                .push(interval);
        }
    }

    /// Load geometry from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let json: JsonGeometry = serde_json::from_reader(reader)?;
        Self::from_json_geometry(json)
    }

    /// Load geometry from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or fails validation.
    pub fn from_json(json: &str) -> Result<Self> {
        let json: JsonGeometry = serde_json::from_str(json)?;
        Self::from_json_geometry(json)
    }

    fn from_json_geometry(json: JsonGeometry) -> Result<Self> {
        let mut table = Self::new();
        for plane in json.planes {
            if table.plane(plane.id).is_some() {
                return Err(Error::Geometry(format!("duplicate plane id {}", plane.id)));
            }
            table.add_plane(plane)?;
        }

        if json.derive_coverage {
            table.derive_coverage();
        }
        for c in json.hodo_coverage {
            table.add_coverage(
                c.hodo_plane,
                c.paddle,
                ElementInterval::new(c.chamber_plane, c.lo, c.hi),
            )?;
        }

        log::debug!(
            "loaded geometry: {} planes, {} paddles with coverage",
            table.planes().count(),
            table.coverage_len()
        );
        Ok(table)
    }

    /// Nominal three-station spectrometer layout with derived coverage.
    ///
    /// Chamber stations D1 (1-6), D2 (7-12) and D3 (13-24) are ordered
    /// U, U', X, X', V, V' per six planes; hodoscopes and proportional
    /// tubes follow. Intended for tests and demonstration runs.
    #[must_use]
    pub fn nominal() -> Self {
        const VIEWS: [PlaneType; 6] = [
            PlaneType::U,
            PlaneType::U,
            PlaneType::X,
            PlaneType::X,
            PlaneType::V,
            PlaneType::V,
        ];
        // (first plane, z of first plane, elements, pitch)
        const CHAMBERS: [(u16, f64, u16, f64); 4] = [
            (1, 617.0, 201, 0.635),
            (7, 1345.0, 128, 2.021),
            (13, 1888.0, 134, 2.0),
            (19, 1921.0, 134, 2.0),
        ];
        // (plane, type, z, elements, pitch)
        const HODOS: [(u16, PlaneType, f64, u16, f64); 16] = [
            (25, PlaneType::X, 667.0, 23, 7.0),
            (26, PlaneType::X, 667.5, 23, 7.0),
            (27, PlaneType::Y, 654.0, 20, 7.0),
            (28, PlaneType::Y, 654.5, 20, 7.0),
            (29, PlaneType::Y, 1404.0, 19, 13.0),
            (30, PlaneType::Y, 1404.5, 19, 13.0),
            (31, PlaneType::X, 1421.0, 16, 13.0),
            (32, PlaneType::X, 1421.5, 16, 13.0),
            (33, PlaneType::X, 1958.0, 16, 14.5),
            (34, PlaneType::X, 1958.5, 16, 14.5),
            (35, PlaneType::Y, 2130.0, 16, 23.0),
            (36, PlaneType::Y, 2130.5, 16, 23.0),
            (37, PlaneType::Y, 2146.0, 16, 23.0),
            (38, PlaneType::Y, 2146.5, 16, 23.0),
            (39, PlaneType::X, 2234.0, 16, 19.5),
            (40, PlaneType::X, 2234.5, 16, 19.5),
        ];

        let mut table = Self::new();
        let mut insert = |spec: PlaneSpec| {
            let slot = usize::from(spec.id);
            table.planes[slot] = Some(spec);
        };

        for (first, z0, n_elements, spacing) in CHAMBERS {
            for (k, view) in VIEWS.iter().enumerate() {
                let id = first + k as u16;
                insert(
                    PlaneSpec::new(id, *view, z0 + 1.3 * k as f64, n_elements, spacing)
                        .with_rt(1300.0, 0.005, spacing / 2.0),
                );
            }
        }
        for (id, view, z, n_elements, spacing) in HODOS {
            insert(PlaneSpec::new(id, view, z, n_elements, spacing));
        }
        for k in 0..8u16 {
            let view = if (k / 2) % 2 == 0 { PlaneType::Y } else { PlaneType::X };
            insert(PlaneSpec::new(41 + k, view, 2100.0 + 40.0 * f64::from(k), 72, 5.08));
        }

        table.derive_coverage();
        table
    }
}

impl GeometryOracle for GeometryTable {
    fn plane_type(&self, plane: u16) -> PlaneType {
        self.plane(plane).map_or(PlaneType::Other, |p| p.plane_type)
    }

    fn measurement(&self, plane: u16, element: u16) -> f64 {
        self.plane(plane)
            .map_or(0.0, |p| p.element_position(element))
    }

    fn drift_distance(&self, plane: u16, tdc_time: f64) -> f64 {
        self.plane(plane).map_or(0.0, |p| p.drift_for(tdc_time))
    }

    fn plane_position(&self, plane: u16) -> f64 {
        self.plane(plane).map_or(0.0, |p| p.z)
    }

    fn element_count(&self, plane: u16) -> u16 {
        self.plane(plane).map_or(0, |p| p.n_elements)
    }

    fn paddle_coverage(&self, hodo_plane: u16, paddle: u16) -> Vec<ElementInterval> {
        self.coverage
            .get(&unique_id(hodo_plane, paddle))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_element_position_is_centred() {
        let plane = PlaneSpec::new(3, PlaneType::X, 600.0, 5, 2.0);
        assert_relative_eq!(plane.element_position(3), 0.0);
        assert_relative_eq!(plane.element_position(1), -4.0);
        assert_relative_eq!(plane.element_position(5), 4.0);
    }

    #[test]
    fn test_drift_is_clamped() {
        let plane = PlaneSpec::new(3, PlaneType::X, 600.0, 5, 2.0).with_rt(1000.0, 0.01, 1.0);
        assert_relative_eq!(plane.drift_for(950.0), 0.5);
        assert_relative_eq!(plane.drift_for(1200.0), 0.0);
        assert_relative_eq!(plane.drift_for(0.0), 1.0);
    }

    #[test]
    fn test_unknown_plane_defaults() {
        let table = GeometryTable::new();
        assert_eq!(table.plane_type(7), PlaneType::Other);
        assert_eq!(table.element_count(7), 0);
        assert!(table.paddle_coverage(25, 1).is_empty());
    }

    #[test]
    fn test_add_plane_rejects_bad_input() {
        let mut table = GeometryTable::new();
        assert!(table.add_plane(PlaneSpec::new(0, PlaneType::X, 0.0, 1, 1.0)).is_err());
        assert!(table.add_plane(PlaneSpec::new(49, PlaneType::X, 0.0, 1, 1.0)).is_err());
        assert!(table.add_plane(PlaneSpec::new(4, PlaneType::X, 0.0, 1, 0.0)).is_err());
        assert!(matches!(
            table.add_plane(PlaneSpec::new(4, PlaneType::X, 0.0, 1000, 1.0)),
            Err(Error::Geometry(_))
        ));
        assert!(table.add_plane(PlaneSpec::new(4, PlaneType::X, 0.0, 999, 1.0)).is_ok());
    }

    #[test]
    fn test_add_coverage_validation() {
        let mut table = GeometryTable::new();
        assert!(table.add_coverage(25, 1, ElementInterval::new(3, 1, 10)).is_ok());
        assert!(table.add_coverage(3, 1, ElementInterval::new(3, 1, 10)).is_err());
        assert!(table.add_coverage(25, 1, ElementInterval::new(30, 1, 10)).is_err());
        assert!(table.add_coverage(25, 1, ElementInterval::new(3, 10, 1)).is_err());
        assert!(table.add_coverage(25, 1, ElementInterval::new(3, 990, 1000)).is_err());
        assert!(table.add_coverage(25, 1000, ElementInterval::new(3, 1, 10)).is_err());
        assert_eq!(table.paddle_coverage(25, 1).len(), 1);
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "planes": [
                {"id": 3, "name": "D1X", "type": "x", "z": 620.0, "n_elements": 160, "spacing": 0.635},
                {"id": 25, "name": "H1B", "type": "x", "z": 667.0, "n_elements": 23, "spacing": 7.0}
            ],
            "hodo_coverage": [
                {"hodo_plane": 25, "paddle": 4, "chamber_plane": 3, "lo": 20, "hi": 35}
            ]
        }"#;
        let table = GeometryTable::from_json(json).unwrap();
        assert_eq!(table.plane_type(3), PlaneType::X);
        assert_eq!(table.plane(3).unwrap().name, "D1X");
        assert_eq!(table.element_count(25), 23);
        assert_eq!(
            table.paddle_coverage(25, 4),
            vec![ElementInterval::new(3, 20, 35)]
        );
    }

    #[test]
    fn test_from_json_rejects_duplicates() {
        let json = r#"{"planes": [
            {"id": 3, "type": "x", "z": 1.0, "n_elements": 1, "spacing": 1.0},
            {"id": 3, "type": "u", "z": 2.0, "n_elements": 1, "spacing": 1.0}
        ]}"#;
        assert!(matches!(
            GeometryTable::from_json(json),
            Err(Error::Geometry(_))
        ));
    }

    #[test]
    fn test_from_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"planes": [{{"id": 9, "type": "v", "z": 1350.0, "n_elements": 128, "spacing": 2.0}}]}}"#
        )
        .unwrap();
        let table = GeometryTable::from_file(file.path()).unwrap();
        assert_eq!(table.plane_type(9), PlaneType::V);
        assert_relative_eq!(table.plane_position(9), 1350.0);
    }

    #[test]
    fn test_nominal_layout() {
        let table = GeometryTable::nominal();
        assert_eq!(table.planes().count(), usize::from(MAX_PLANE_ID));
        assert_eq!(table.plane_type(3), PlaneType::X);
        assert_eq!(table.plane_type(3).code(), 1);
        assert_eq!(table.plane_type(1), PlaneType::U);
        assert_eq!(table.plane_type(27), PlaneType::Y);
        assert!(table.plane_position(7) > table.plane_position(1));
        assert!(table.plane_position(13) > table.plane_position(7));
    }

    #[test]
    fn test_derived_coverage_overlaps_paddle() {
        let table = GeometryTable::nominal();
        let paddle = 12;
        let centre = table.measurement(25, paddle);
        let intervals = table.paddle_coverage(25, paddle);
        assert_eq!(intervals.len(), 6);
        for interval in intervals {
            assert!(Station::D1.planes().contains(&interval.chamber_plane));
            let lo = table.measurement(interval.chamber_plane, interval.lo);
            let hi = table.measurement(interval.chamber_plane, interval.hi);
            assert!(lo <= centre && centre <= hi);
        }
        assert!(table.paddle_coverage(39, 1).is_empty());
    }
}
