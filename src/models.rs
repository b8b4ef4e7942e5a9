//! Core data structures for decoded survey records.
//!
//! Defines the import dimension, observation and group kinds, and the draft
//! records handed from the decoders to the persistence layer.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type GroupId = i64;
pub type PointId = i64;
pub type ObservationId = i64;

/// Network dimension a GSI file is imported for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum DimensionType {
    Height,
    Plan,
    PlanAndHeight,
    Spatial,
}

impl DimensionType {
    /// Whether observations of the given type are kept in this dimension
    pub fn accepts(&self, observation_type: ObservationType) -> bool {
        use DimensionType::*;
        use ObservationType::*;

        match observation_type {
            Leveling => matches!(self, Height | PlanAndHeight),
            Direction => !matches!(self, Height),
            HorizontalDistance => matches!(self, Plan | PlanAndHeight),
            SlopeDistance | ZenithAngle => matches!(self, Spatial),
            GnssBaseline1D | GnssBaseline2D | GnssBaseline3D => false,
        }
    }
}

/// Number of coordinate components a point group carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PointDimension {
    One,
    Two,
    Three,
}

impl PointDimension {
    pub fn as_u8(&self) -> u8 {
        match self {
            PointDimension::One => 1,
            PointDimension::Two => 2,
            PointDimension::Three => 3,
        }
    }

    pub fn all() -> [PointDimension; 3] {
        [PointDimension::One, PointDimension::Two, PointDimension::Three]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObservationType {
    Leveling,
    Direction,
    HorizontalDistance,
    SlopeDistance,
    ZenithAngle,
    GnssBaseline1D,
    GnssBaseline2D,
    GnssBaseline3D,
}

impl ObservationType {
    /// Terrestrial types in the order their groups are committed
    pub const TERRESTRIAL: [ObservationType; 5] = [
        ObservationType::Leveling,
        ObservationType::Direction,
        ObservationType::HorizontalDistance,
        ObservationType::SlopeDistance,
        ObservationType::ZenithAngle,
    ];

    pub fn is_gnss(&self) -> bool {
        matches!(
            self,
            ObservationType::GnssBaseline1D
                | ObservationType::GnssBaseline2D
                | ObservationType::GnssBaseline3D
        )
    }
}

/// Kind of a persisted group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupKind {
    Points(PointDimension),
    Observations(ObservationType),
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKind::Points(dimension) => write!(f, "{}D points", dimension.as_u8()),
            GroupKind::Observations(kind) => {
                let label = match kind {
                    ObservationType::Leveling => "leveling",
                    ObservationType::Direction => "directions",
                    ObservationType::HorizontalDistance => "horizontal distances",
                    ObservationType::SlopeDistance => "slope distances",
                    ObservationType::ZenithAngle => "zenith angles",
                    ObservationType::GnssBaseline1D => "GNSS baselines 1D",
                    ObservationType::GnssBaseline2D => "GNSS baselines 2D",
                    ObservationType::GnssBaseline3D => "GNSS baselines 3D",
                };
                f.write_str(label)
            }
        }
    }
}

/// One terrestrial observation in progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationDraft {
    pub start_point: String,
    pub end_point: String,
    pub instrument_height: f64,
    pub reflector_height: f64,
    pub value_apriori: f64,
    pub distance_apriori: Option<f64>,
    pub enabled: bool,
}

impl ObservationDraft {
    pub fn new(
        start_point: impl Into<String>,
        end_point: impl Into<String>,
        instrument_height: f64,
        reflector_height: f64,
        value_apriori: f64,
    ) -> Self {
        Self {
            start_point: start_point.into(),
            end_point: end_point.into(),
            instrument_height,
            reflector_height,
            value_apriori,
            distance_apriori: None,
            enabled: true,
        }
    }

    /// Attach an a-priori distance; non-positive or missing values are ignored
    pub fn with_distance(mut self, distance: Option<f64>) -> Self {
        self.distance_apriori = distance.filter(|d| *d > 0.0);
        self
    }
}

/// A point with optional a-priori coordinates
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointDraft {
    pub name: String,
    pub code: String,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub sigma_x: Option<f64>,
    pub sigma_y: Option<f64>,
    pub sigma_z: Option<f64>,
}

impl PointDraft {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            ..Default::default()
        }
    }

    pub fn with_coordinates(mut self, x: Option<f64>, y: Option<f64>, z: Option<f64>) -> Self {
        self.x = x;
        self.y = y;
        self.z = z;
        self
    }

    pub fn with_height(mut self, z: f64) -> Self {
        self.z = Some(z);
        self
    }

    /// Fill components that are still missing from `other`.
    ///
    /// Components already present are never overwritten. Returns true if
    /// anything changed.
    pub fn fill_missing(&mut self, other: &PointDraft) -> bool {
        let mut changed = false;
        for (slot, value) in [
            (&mut self.x, other.x),
            (&mut self.y, other.y),
            (&mut self.z, other.z),
            (&mut self.sigma_x, other.sigma_x),
            (&mut self.sigma_y, other.sigma_y),
            (&mut self.sigma_z, other.sigma_z),
        ] {
            if slot.is_none() && value.is_some() {
                *slot = value;
                changed = true;
            }
        }
        if self.code.is_empty() && !other.code.is_empty() {
            self.code = other.code.clone();
            changed = true;
        }
        changed
    }
}

/// A GNSS baseline between two points, components in meters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GnssObservationDraft {
    pub start_point: String,
    pub end_point: String,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub enabled: bool,
}

/// A record waiting to be written into a group
#[derive(Debug, Clone, PartialEq)]
pub enum Draft {
    Point(PointDraft),
    Terrestrial(ObservationDraft),
    Gnss(GnssObservationDraft),
}

/// A named, closed group of drafts of one kind
#[derive(Debug, Clone, PartialEq)]
pub struct DraftGroup {
    pub kind: GroupKind,
    pub name: String,
    pub drafts: Vec<Draft>,
}

impl DraftGroup {
    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    /// Terrestrial observations in this group
    pub fn observations(&self) -> impl Iterator<Item = &ObservationDraft> {
        self.drafts.iter().filter_map(|draft| match draft {
            Draft::Terrestrial(observation) => Some(observation),
            _ => None,
        })
    }

    /// Points in this group
    pub fn points(&self) -> impl Iterator<Item = &PointDraft> {
        self.drafts.iter().filter_map(|draft| match draft {
            Draft::Point(point) => Some(point),
            _ => None,
        })
    }
}

/// A group as committed to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedGroup {
    pub kind: GroupKind,
    pub id: GroupId,
    pub name: String,
}
