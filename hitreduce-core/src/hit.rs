//! Hit types and detector plane classification.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Number of drift-chamber planes (ids 1..=24).
pub const N_CHAMBER_PLANES: u16 = 24;
/// Number of hodoscope planes (ids 25..=40).
pub const N_HODO_PLANES: u16 = 16;
/// Number of proportional-tube planes (ids 41..=48).
pub const N_PROP_PLANES: u16 = 8;
/// Highest valid plane identifier.
pub const MAX_PLANE_ID: u16 = N_CHAMBER_PLANES + N_HODO_PLANES + N_PROP_PLANES;

/// Last chamber plane id.
pub const LAST_CHAMBER_PLANE: u16 = N_CHAMBER_PLANES;
/// Last hodoscope plane id.
pub const LAST_HODO_PLANE: u16 = N_CHAMBER_PLANES + N_HODO_PLANES;

/// Multiplier used to build [`Hit::unique_id`] from plane and element ids.
pub const UNIQUE_ID_STRIDE: u32 = 1000;

/// Largest element id that keeps [`unique_id`] collision-free.
#[allow(clippy::cast_possible_truncation)]
pub const MAX_ELEMENT_ID: u16 = (UNIQUE_ID_STRIDE - 1) as u16;

/// Detector technology a plane belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneGroup {
    /// Drift chamber, planes 1..=24.
    Chamber,
    /// Scintillator hodoscope, planes 25..=40.
    Hodoscope,
    /// Proportional tube, planes above 40.
    PropTube,
}

impl PlaneGroup {
    /// Classifies a plane id.
    #[inline]
    #[must_use]
    pub fn of(plane: u16) -> Self {
        if plane <= LAST_CHAMBER_PLANE {
            Self::Chamber
        } else if plane <= LAST_HODO_PLANE {
            Self::Hodoscope
        } else {
            Self::PropTube
        }
    }
}

/// Chamber station group.
///
/// D1 holds planes 1..=6, D2 planes 7..=12 and D3 planes 13..=24.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Station {
    /// Planes 1..=6.
    D1,
    /// Planes 7..=12.
    D2,
    /// Planes 13..=24.
    D3,
}

impl Station {
    /// Returns the station of a chamber plane, or `None` for non-chamber planes.
    #[inline]
    #[must_use]
    pub fn of(plane: u16) -> Option<Self> {
        match plane {
            0..=6 => Some(Self::D1),
            7..=12 => Some(Self::D2),
            13..=LAST_CHAMBER_PLANE => Some(Self::D3),
            _ => None,
        }
    }

    /// Chamber planes belonging to this station.
    #[must_use]
    pub fn planes(self) -> std::ops::RangeInclusive<u16> {
        match self {
            Self::D1 => 1..=6,
            Self::D2 => 7..=12,
            Self::D3 => 13..=LAST_CHAMBER_PLANE,
        }
    }
}

/// A single digitized detector hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Detector plane identifier.
    pub detector_id: u16,
    /// Element (wire or paddle) identifier within the plane.
    pub element_id: u16,
    /// TDC time measurement.
    pub tdc_time: f64,
    /// Reconstructed drift distance.
    #[serde(default)]
    pub drift_distance: f64,
    /// Calibrated transverse position of the element.
    #[serde(default)]
    pub pos: f64,
    /// Whether the TDC time falls inside the plane's in-time window.
    #[serde(default = "default_in_time")]
    pub in_time: bool,
}

fn default_in_time() -> bool {
    true
}

impl Hit {
    /// Creates an in-time hit with zero position and drift distance.
    #[must_use]
    pub fn new(detector_id: u16, element_id: u16, tdc_time: f64) -> Self {
        Self {
            detector_id,
            element_id,
            tdc_time,
            drift_distance: 0.0,
            pos: 0.0,
            in_time: true,
        }
    }

    /// Creates a channel-only probe hit from a unique id.
    ///
    /// Only the plane and element are meaningful; used for lookups by channel.
    #[must_use]
    pub fn from_unique_id(unique_id: u32) -> Self {
        let (plane, element) = split_unique_id(unique_id);
        Self::new(plane, element, 0.0)
    }

    /// Sets the calibrated position.
    #[must_use]
    pub fn with_pos(mut self, pos: f64) -> Self {
        self.pos = pos;
        self
    }

    /// Sets the drift distance.
    #[must_use]
    pub fn with_drift(mut self, drift_distance: f64) -> Self {
        self.drift_distance = drift_distance;
        self
    }

    /// Sets the in-time flag.
    #[must_use]
    pub fn with_in_time(mut self, in_time: bool) -> Self {
        self.in_time = in_time;
        self
    }

    /// Composite channel key, `detector_id * 1000 + element_id`.
    #[inline]
    #[must_use]
    pub fn unique_id(&self) -> u32 {
        unique_id(self.detector_id, self.element_id)
    }

    /// Plane group of this hit.
    #[inline]
    #[must_use]
    pub fn group(&self) -> PlaneGroup {
        PlaneGroup::of(self.detector_id)
    }

    /// Chamber station, if this is a chamber hit.
    #[inline]
    #[must_use]
    pub fn station(&self) -> Option<Station> {
        Station::of(self.detector_id)
    }

    /// True for drift-chamber hits.
    #[inline]
    #[must_use]
    pub fn is_chamber(&self) -> bool {
        self.group() == PlaneGroup::Chamber
    }

    /// True for hodoscope hits.
    #[inline]
    #[must_use]
    pub fn is_hodoscope(&self) -> bool {
        self.group() == PlaneGroup::Hodoscope
    }

    /// True for proportional-tube hits.
    #[inline]
    #[must_use]
    pub fn is_prop_tube(&self) -> bool {
        self.group() == PlaneGroup::PropTube
    }

    /// True when both hits are on the same plane and element.
    ///
    /// This is the equality used when collapsing after-pulses.
    #[inline]
    #[must_use]
    pub fn same_channel(&self, other: &Self) -> bool {
        self.detector_id == other.detector_id && self.element_id == other.element_id
    }

    /// Canonical ordering: plane ascending, element ascending, then later
    /// TDC time first.
    #[must_use]
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.detector_id
            .cmp(&other.detector_id)
            .then_with(|| self.element_id.cmp(&other.element_id))
            .then_with(|| other.tdc_time.total_cmp(&self.tdc_time))
    }
}

/// Builds a unique channel id from plane and element ids.
///
/// Ids are distinct only while `element_id <= MAX_ELEMENT_ID`; geometry
/// validation rejects planes with more elements.
#[inline]
#[must_use]
pub fn unique_id(detector_id: u16, element_id: u16) -> u32 {
    u32::from(detector_id) * UNIQUE_ID_STRIDE + u32::from(element_id)
}

/// Splits a unique channel id back into `(detector_id, element_id)`.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn split_unique_id(unique_id: u32) -> (u16, u16) {
    (
        (unique_id / UNIQUE_ID_STRIDE) as u16,
        (unique_id % UNIQUE_ID_STRIDE) as u16,
    )
}
