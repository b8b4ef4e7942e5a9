//! Output assembly: per-type accumulation, group naming and commit.
//!
//! Decoders push drafts into a [`GroupAssembler`] and close groups at station
//! or loop boundaries. At end of input the assembler closes whatever is left
//! in a fixed order (leveling, directions, horizontal distances, slope
//! distances, zenith angles, then points by dimension) and
//! [`commit_groups`] writes the closed groups to an
//! [`ObservationStore`](crate::store::ObservationStore).

pub mod commit;
pub mod points;

pub use commit::commit_groups;
pub use points::{PointOffer, PointRegistry};

use crate::constants::DEFAULT_GROUP_STEM;
use crate::models::{
    Draft, DraftGroup, GroupKind, ObservationDraft, ObservationType, PointDimension,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[cfg(test)]
pub mod tests;

/// Tracks whether every direction of the open set shares one station
#[derive(Debug, Default, Clone)]
struct DirectionSet {
    station: Option<String>,
    single_station: bool,
}

impl DirectionSet {
    fn observe(&mut self, station: &str) {
        match &self.station {
            None => {
                self.station = Some(station.to_string());
                self.single_station = true;
            }
            Some(current) if current != station => self.single_station = false,
            Some(_) => {}
        }
    }

    fn shared_station(&self) -> Option<&str> {
        self.station.as_deref().filter(|_| self.single_station)
    }
}

#[derive(Debug)]
pub struct GroupAssembler {
    stem: String,
    pending: HashMap<ObservationType, Vec<ObservationDraft>>,
    direction_set: DirectionSet,
    points: PointRegistry,
    closed: Vec<DraftGroup>,
}

impl GroupAssembler {
    /// `source_name` is the file name the group names are derived from
    pub fn new(source_name: &str, reserved_points: HashSet<String>) -> Self {
        Self {
            stem: file_stem(source_name),
            pending: HashMap::new(),
            direction_set: DirectionSet::default(),
            points: PointRegistry::new(reserved_points),
            closed: Vec::new(),
        }
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Display name: prefix + stem + suffix
    pub fn item_name(&self, prefix: Option<&str>, suffix: Option<&str>) -> String {
        format!(
            "{}{}{}",
            prefix.unwrap_or_default(),
            self.stem,
            suffix.unwrap_or_default()
        )
    }

    pub fn push(&mut self, kind: ObservationType, draft: ObservationDraft) {
        if kind == ObservationType::Direction {
            self.direction_set.observe(&draft.start_point);
        }
        self.pending.entry(kind).or_default().push(draft);
    }

    pub fn pending(&self, kind: ObservationType) -> &[ObservationDraft] {
        self.pending.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Close the open group of `kind` under `name`. Empty groups are dropped.
    pub fn close(&mut self, kind: ObservationType, name: String) {
        if kind == ObservationType::Direction {
            self.direction_set = DirectionSet::default();
        }
        let Some(drafts) = self.pending.remove(&kind).filter(|d| !d.is_empty()) else {
            return;
        };
        debug!("Closing {} group '{}' with {} records", kind_label(kind), name, drafts.len());
        self.closed.push(DraftGroup {
            kind: GroupKind::Observations(kind),
            name,
            drafts: drafts.into_iter().map(Draft::Terrestrial).collect(),
        });
    }

    /// Close the open direction set, named after its station when it has
    /// only one
    pub fn close_direction_set(&mut self) {
        let name = match self.direction_set.shared_station() {
            Some(station) => self.item_name(None, Some(&format!(" ({})", station))),
            None => self.item_name(None, None),
        };
        self.close(ObservationType::Direction, name);
    }

    pub fn points(&self) -> &PointRegistry {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut PointRegistry {
        &mut self.points
    }

    /// Close all point groups
    pub fn close_points(&mut self, name: String) {
        for dimension in PointDimension::all() {
            let points = self.points.take(dimension);
            if points.is_empty() {
                continue;
            }
            self.closed.push(DraftGroup {
                kind: GroupKind::Points(dimension),
                name: name.clone(),
                drafts: points.into_iter().map(Draft::Point).collect(),
            });
        }
    }

    pub fn closed_groups(&self) -> &[DraftGroup] {
        &self.closed
    }

    /// Close every remaining accumulator under the plain stem and return all
    /// groups in closing order
    pub fn finish(mut self) -> Vec<DraftGroup> {
        for kind in ObservationType::TERRESTRIAL {
            if kind == ObservationType::Direction {
                self.close_direction_set();
            } else {
                let name = self.item_name(None, None);
                self.close(kind, name);
            }
        }
        let name = self.item_name(None, None);
        self.close_points(name);
        self.closed
    }
}

/// File name without its last extension. A leading dot is part of the stem.
pub fn file_stem(file_name: &str) -> String {
    let stem = match file_name.rfind('.') {
        Some(index) if index > 0 => &file_name[..index],
        _ => file_name,
    };
    if stem.trim().is_empty() {
        DEFAULT_GROUP_STEM.to_string()
    } else {
        stem.to_string()
    }
}

fn kind_label(kind: ObservationType) -> String {
    GroupKind::Observations(kind).to_string()
}
