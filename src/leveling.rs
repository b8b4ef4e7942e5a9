//! Leveling setup accumulator.
//!
//! One setup holds a back-sight point with up to two readings and a
//! fore-sight point with up to two readings. The second reading of a side is
//! only accepted for the same point as the first (two-run R-V-V-R check).

use crate::models::ObservationDraft;

/// A reading with its optional staff distance
#[derive(Debug, Clone, Copy, PartialEq)]
struct Sight {
    reading: f64,
    distance: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelingData {
    start_point: Option<String>,
    end_point: Option<String>,
    back: [Option<Sight>; 2],
    fore: [Option<Sight>; 2],
}

impl LevelingData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_point(&self) -> Option<&str> {
        self.start_point.as_deref()
    }

    pub fn end_point(&self) -> Option<&str> {
        self.end_point.as_deref()
    }

    /// Add a back-sight reading. A second reading for a different point is
    /// ignored.
    pub fn add_back_sight(&mut self, name: &str, reading: f64, distance: Option<f64>, is_first: bool) {
        let sight = Sight { reading, distance };
        if is_first {
            self.start_point = Some(name.to_string());
            self.back[0] = Some(sight);
        } else if self.start_point.as_deref() == Some(name) {
            self.back[1] = Some(sight);
        }
    }

    /// Add a fore-sight reading. A second reading for a different point is
    /// ignored.
    pub fn add_fore_sight(&mut self, name: &str, reading: f64, distance: Option<f64>, is_first: bool) {
        let sight = Sight { reading, distance };
        if is_first {
            self.end_point = Some(name.to_string());
            self.fore[0] = Some(sight);
        } else if self.end_point.as_deref() == Some(name) {
            self.fore[1] = Some(sight);
        }
    }

    /// Back sight that counts as first until one exists
    pub fn push_back_sight(&mut self, name: &str, reading: f64, distance: Option<f64>) {
        let is_first = self.back[0].is_none();
        self.add_back_sight(name, reading, distance, is_first);
    }

    /// Fore sight that counts as first until one exists
    pub fn push_fore_sight(&mut self, name: &str, reading: f64, distance: Option<f64>) {
        let is_first = self.fore[0].is_none();
        self.add_fore_sight(name, reading, distance, is_first);
    }

    pub fn has_back_sight(&self) -> bool {
        self.back[0].is_some()
    }

    pub fn has_fore_sight(&self) -> bool {
        self.fore[0].is_some()
    }

    /// Mean length of the setup (back + fore), averaged when both runs carry
    /// distances
    pub fn distance(&self) -> f64 {
        let run = |i: usize| match (self.back[i], self.fore[i]) {
            (Some(b), Some(f)) => b.distance.zip(f.distance).map(|(db, df)| db + df),
            _ => None,
        };
        Self::mean_over_runs(run(0), run(1))
    }

    /// Mean height difference back minus fore
    pub fn delta_height(&self) -> f64 {
        let run = |i: usize| match (self.back[i], self.fore[i]) {
            (Some(b), Some(f)) => Some(b.reading - f.reading),
            _ => None,
        };
        Self::mean_over_runs(run(0), run(1))
    }

    fn mean_over_runs(first: Option<f64>, second: Option<f64>) -> f64 {
        let mut value = first.unwrap_or(0.0);
        if let Some(second) = second {
            value = 0.5 * (value + second);
        }
        value
    }

    /// Leveling observation for a complete setup
    pub fn to_observation(&self) -> Option<ObservationDraft> {
        let start = self.start_point.as_deref()?;
        let end = self.end_point.as_deref()?;
        if !self.has_back_sight() || !self.has_fore_sight() {
            return None;
        }
        let distance = self.distance();
        Some(
            ObservationDraft::new(start, end, 0.0, 0.0, self.delta_height())
                .with_distance(Some(distance)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_single_run() {
        let mut data = LevelingData::new();
        data.add_back_sight("A", 1.500, Some(20.0), true);
        data.add_fore_sight("B", 1.200, Some(22.0), true);

        assert!((data.delta_height() - 0.300).abs() < EPS);
        assert!((data.distance() - 42.0).abs() < EPS);
    }

    #[test]
    fn test_two_runs_average() {
        let mut data = LevelingData::new();
        data.add_back_sight("A", 1.5000, Some(20.0), true);
        data.add_fore_sight("B", 1.2000, Some(22.0), true);
        data.add_fore_sight("B", 1.1998, Some(22.2), false);
        data.add_back_sight("A", 1.4999, Some(20.0), false);

        let run1 = 1.5000 - 1.2000;
        let run2 = 1.4999 - 1.1998;
        assert!((data.delta_height() - 0.5 * (run1 + run2)).abs() < EPS);
        assert!((data.distance() - 0.5 * (42.0 + 42.2)).abs() < EPS);
    }

    #[test]
    fn test_mismatched_second_back_sight_is_ignored() {
        let mut data = LevelingData::new();
        data.add_back_sight("A", 1.5, None, true);
        data.add_fore_sight("B", 1.2, None, true);
        let one_run = data.delta_height();

        data.add_back_sight("X", 0.9, None, false);
        data.add_fore_sight("B", 1.1, None, false);

        assert!((data.delta_height() - one_run).abs() < EPS);
        assert_eq!(data.start_point(), Some("A"));
    }

    #[test]
    fn test_missing_distance_contributes_nothing() {
        let mut data = LevelingData::new();
        data.add_back_sight("A", 1.5, Some(20.0), true);
        data.add_fore_sight("B", 1.2, None, true);
        assert_eq!(data.distance(), 0.0);

        let observation = data.to_observation().unwrap();
        assert_eq!(observation.distance_apriori, None);
        assert_eq!(observation.start_point, "A");
        assert_eq!(observation.end_point, "B");
    }

    #[test]
    fn test_push_helpers_pick_first_then_second() {
        let mut data = LevelingData::new();
        data.push_back_sight("A", 2.0, Some(10.0));
        data.push_back_sight("A", 2.2, Some(10.0));
        data.push_fore_sight("B", 1.0, Some(10.0));
        data.push_fore_sight("B", 1.0, Some(10.0));

        assert!((data.delta_height() - 1.1).abs() < EPS);
    }

    #[test]
    fn test_incomplete_setup_has_no_observation() {
        let mut data = LevelingData::new();
        data.add_back_sight("A", 1.5, None, true);
        assert!(data.to_observation().is_none());
    }
}
