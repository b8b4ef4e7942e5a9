//! In-memory observation store.

use super::ObservationStore;
use crate::error::{ImportError, Result};
use crate::models::{
    GnssObservationDraft, GroupId, GroupKind, ObservationDraft, ObservationId, PointDraft,
    PointId,
};
use std::collections::HashSet;
use tracing::debug;

/// A group with its saved rows
#[derive(Debug, Clone)]
pub struct StoredGroup {
    pub id: GroupId,
    pub kind: GroupKind,
    pub name: String,
    pub points: Vec<(PointId, PointDraft)>,
    pub observations: Vec<(ObservationId, ObservationDraft)>,
    pub gnss_observations: Vec<(ObservationId, GnssObservationDraft)>,
}

impl StoredGroup {
    pub fn len(&self) -> usize {
        self.points.len() + self.observations.len() + self.gnss_observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Store keeping everything in process memory.
///
/// Point names are unique across the store, like in a project database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    groups: Vec<StoredGroup>,
    point_names: HashSet<String>,
    next_group_id: GroupId,
    next_row_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed point names that already exist in the destination project
    pub fn with_reserved_points<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.point_names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn groups(&self) -> &[StoredGroup] {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> Option<&StoredGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Remove a group and its rows, e.g. after a failed import
    pub fn delete_group(&mut self, id: GroupId) -> Option<StoredGroup> {
        let index = self.groups.iter().position(|g| g.id == id)?;
        let group = self.groups.remove(index);
        for (_, point) in &group.points {
            self.point_names.remove(&point.name);
        }
        debug!("Deleted group {} ({})", group.name, group.id);
        Some(group)
    }

    fn group_mut(&mut self, id: GroupId) -> Result<&mut StoredGroup> {
        self.groups
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| ImportError::persistence(format!("unknown group id {}", id)))
    }

    fn next_row(&mut self) -> i64 {
        self.next_row_id += 1;
        self.next_row_id
    }
}

impl ObservationStore for MemoryStore {
    fn reserved_point_names(&self) -> Result<HashSet<String>> {
        Ok(self.point_names.clone())
    }

    fn create_group(&mut self, kind: GroupKind, name: &str) -> Result<GroupId> {
        if name.trim().is_empty() {
            return Err(ImportError::persistence("group name must not be empty"));
        }
        self.next_group_id += 1;
        let id = self.next_group_id;
        self.groups.push(StoredGroup {
            id,
            kind,
            name: name.to_string(),
            points: Vec::new(),
            observations: Vec::new(),
            gnss_observations: Vec::new(),
        });
        Ok(id)
    }

    fn save_point(&mut self, group: GroupId, point: &PointDraft) -> Result<PointId> {
        if self.point_names.contains(&point.name) {
            return Err(ImportError::persistence(format!(
                "point '{}' already exists",
                point.name
            )));
        }
        let row = self.next_row();
        let target = self.group_mut(group)?;
        if !matches!(target.kind, GroupKind::Points(_)) {
            return Err(ImportError::persistence(format!(
                "group {} does not hold points",
                group
            )));
        }
        target.points.push((row, point.clone()));
        self.point_names.insert(point.name.clone());
        Ok(row)
    }

    fn save_terrestrial_observation(
        &mut self,
        group: GroupId,
        observation: &ObservationDraft,
    ) -> Result<ObservationId> {
        let row = self.next_row();
        let target = self.group_mut(group)?;
        match target.kind {
            GroupKind::Observations(kind) if !kind.is_gnss() => {
                target.observations.push((row, observation.clone()));
                Ok(row)
            }
            _ => Err(ImportError::persistence(format!(
                "group {} does not hold terrestrial observations",
                group
            ))),
        }
    }

    fn save_gnss_observation(
        &mut self,
        group: GroupId,
        observation: &GnssObservationDraft,
    ) -> Result<ObservationId> {
        let row = self.next_row();
        let target = self.group_mut(group)?;
        match target.kind {
            GroupKind::Observations(kind) if kind.is_gnss() => {
                target.gnss_observations.push((row, observation.clone()));
                Ok(row)
            }
            _ => Err(ImportError::persistence(format!(
                "group {} does not hold GNSS baselines",
                group
            ))),
        }
    }
}
