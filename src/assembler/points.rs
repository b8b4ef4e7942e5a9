//! Point deduplication with coordinate in-fill.

use crate::models::{PointDimension, PointDraft};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Result of offering a point to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointOffer {
    /// New point queued for its dimension group
    Added,
    /// Pending point completed with missing components
    Filled,
    /// Pending point already complete for the offered components
    Unchanged,
    /// Name exists in the destination and is never emitted
    Reserved,
}

/// Pending points of one import, one list per dimension
#[derive(Debug, Default)]
pub struct PointRegistry {
    reserved: HashSet<String>,
    index: HashMap<String, (PointDimension, usize)>,
    one: Vec<PointDraft>,
    two: Vec<PointDraft>,
    three: Vec<PointDraft>,
}

impl PointRegistry {
    /// `reserved` is the destination snapshot taken at the start of a run
    pub fn new(reserved: HashSet<String>) -> Self {
        Self {
            reserved,
            ..Default::default()
        }
    }

    /// Reserved in the destination or already pending
    pub fn is_known(&self, name: &str) -> bool {
        self.reserved.contains(name) || self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&PointDraft> {
        let (dimension, position) = self.index.get(name)?;
        self.list(*dimension).get(*position)
    }

    pub fn dimension_of(&self, name: &str) -> Option<PointDimension> {
        self.index.get(name).map(|(dimension, _)| *dimension)
    }

    /// Queue a point, or fill missing components of the pending one
    pub fn offer(&mut self, dimension: PointDimension, point: PointDraft) -> PointOffer {
        if self.reserved.contains(&point.name) {
            return PointOffer::Reserved;
        }

        if let Some(&(pending_dimension, position)) = self.index.get(&point.name) {
            let pending = &mut self.list_mut(pending_dimension)[position];
            return if pending.fill_missing(&point) {
                debug!("Completed coordinates of point {}", point.name);
                PointOffer::Filled
            } else {
                PointOffer::Unchanged
            };
        }

        let list = self.list_mut(dimension);
        list.push(point);
        let position = list.len() - 1;
        let name = list[position].name.clone();
        self.index.insert(name, (dimension, position));
        PointOffer::Added
    }

    pub fn points(&self, dimension: PointDimension) -> &[PointDraft] {
        self.list(dimension)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Hand over the pending points of one dimension.
    ///
    /// Their names stay known for the rest of the run.
    pub fn take(&mut self, dimension: PointDimension) -> Vec<PointDraft> {
        let points = std::mem::take(self.list_mut(dimension));
        for point in &points {
            self.index.remove(&point.name);
            self.reserved.insert(point.name.clone());
        }
        points
    }

    fn list(&self, dimension: PointDimension) -> &Vec<PointDraft> {
        match dimension {
            PointDimension::One => &self.one,
            PointDimension::Two => &self.two,
            PointDimension::Three => &self.three,
        }
    }

    fn list_mut(&mut self, dimension: PointDimension) -> &mut Vec<PointDraft> {
        match dimension {
            PointDimension::One => &mut self.one,
            PointDimension::Two => &mut self.two,
            PointDimension::Three => &mut self.three,
        }
    }
}
