//! Caplan Z-file decoder.
//!
//! Fixed-column records keyed by two code digits at columns 5 and 6:
//!
//! | c1   | c2   | record                                   |
//! |------|------|------------------------------------------|
//! | 0    | any  | block boundary, `(0,4)` names the project |
//! | 1    | 0    | station                                  |
//! | 2..8 | 0..4 | tacheometer observation                  |
//! | 2..3 | 5..8 | leveling back / fore / side shot         |
//!
//! Points carry no coordinates here. Their names are collected per
//! dimension while decoding and normalized at end of input.

use super::{
    DecoderContext, SourceDecoder, SourceFormat, column, is_digits, parse_decimal, require_ascii,
    turning_point_name,
};
use crate::assembler::GroupAssembler;
use crate::constants::RHO_GRAD2RAD;
use crate::constants::zfile_columns::*;
use crate::error::Result;
use crate::leveling::LevelingData;
use crate::models::{DraftGroup, ObservationDraft, ObservationType, PointDimension, PointDraft};
use crate::reader::{LineDecoder, RawLine};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::ops::Range;
use tracing::debug;

/// Point names and codes seen per dimension, in first-seen order
#[derive(Debug, Default)]
struct PointNames {
    one: IndexMap<String, String>,
    two: IndexMap<String, String>,
    three: IndexMap<String, String>,
}

impl PointNames {
    fn add(&mut self, name: &str, code: &str, dimension: PointDimension) {
        let map = match dimension {
            PointDimension::One => &mut self.one,
            PointDimension::Two => &mut self.two,
            PointDimension::Three => &mut self.three,
        };
        if !map.contains_key(name) {
            map.insert(name.to_string(), code.to_string());
        }
    }

    /// A name seen as 1D and 2D is a 3D point. 3D names leave the lower
    /// dimensions; the first non-empty code wins.
    fn normalize(&mut self) {
        let promoted: Vec<(String, String)> = self
            .one
            .iter()
            .filter_map(|(name, code)| {
                let plan_code = self.two.get(name)?;
                let code = if code.is_empty() { plan_code } else { code };
                Some((name.clone(), code.clone()))
            })
            .collect();
        for (name, code) in promoted {
            match self.three.get_mut(&name) {
                Some(existing) if existing.is_empty() => *existing = code,
                Some(_) => {}
                None => {
                    self.three.insert(name, code);
                }
            }
        }

        for (name, code) in self.three.iter_mut() {
            for lower in [&mut self.one, &mut self.two] {
                if let Some(lower_code) = lower.shift_remove(name) {
                    if code.is_empty() {
                        *code = lower_code;
                    }
                }
            }
        }
    }

    fn into_drafts(self) -> impl Iterator<Item = (PointDimension, PointDraft)> {
        let drafts = |dimension: PointDimension, map: IndexMap<String, String>| {
            map.into_iter()
                .map(move |(name, code)| (dimension, PointDraft::new(name, code)))
        };
        drafts(PointDimension::One, self.one)
            .chain(drafts(PointDimension::Two, self.two))
            .chain(drafts(PointDimension::Three, self.three))
    }
}

/// Height key of a station or target record, from column 10 on
#[derive(Debug, Clone, Copy, PartialEq)]
enum HeightKey {
    /// All nines: a 2D point without height
    Plan,
    /// All zeros: reuse the cached target height
    Cached,
    Height(f64),
    Missing,
}

impl HeightKey {
    fn parse(key: &str) -> Self {
        let digits = key.get(2..).unwrap_or_default().trim();
        if !is_digits(digits) {
            return HeightKey::Missing;
        }
        if digits.bytes().all(|b| b == b'9') {
            HeightKey::Plan
        } else if digits.bytes().all(|b| b == b'0') {
            HeightKey::Cached
        } else {
            match digits.parse::<u64>() {
                Ok(value) => HeightKey::Height(0.001 * value as f64),
                Err(_) => HeightKey::Missing,
            }
        }
    }
}

/// Code from the `|`-separated attribute area
fn attribute_code(text: &str) -> String {
    if text.len() <= ATTRIBUTE_MARKER + 1 || text.as_bytes()[ATTRIBUTE_MARKER] != b'|' {
        return String::new();
    }
    text[ATTRIBUTE_MARKER + 1..]
        .split('|')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[derive(Debug, Clone, Default)]
struct Station {
    name: String,
    code: String,
    instrument_height: f64,
    is_plan: bool,
    /// Last reflector height per target
    target_heights: HashMap<String, f64>,
}

pub struct ZFileDecoder {
    assembler: GroupAssembler,
    decimal_separator: char,
    project: Option<String>,
    station: Option<Station>,
    points: PointNames,
    setup: Option<LevelingData>,
    back_reading: Option<f64>,
    back_distance: Option<f64>,
    last_turning_point: Option<String>,
    turning_points: u32,
}

impl ZFileDecoder {
    pub fn new(context: DecoderContext) -> Self {
        Self {
            assembler: GroupAssembler::new(&context.source_name, context.reserved_points),
            decimal_separator: context.decimal_separator,
            project: None,
            station: None,
            points: PointNames::default(),
            setup: None,
            back_reading: None,
            back_distance: None,
            last_turning_point: None,
            turning_points: 0,
        }
    }

    /// Close every observation group; names end with the project if known
    fn close_all(&mut self) {
        let suffix = self.project.as_ref().map(|p| format!(" {}", p));
        let name = self.assembler.item_name(None, suffix.as_deref());
        self.assembler.close(ObservationType::Leveling, name.clone());
        self.assembler.close_direction_set();
        for kind in [
            ObservationType::HorizontalDistance,
            ObservationType::SlopeDistance,
            ObservationType::ZenithAngle,
        ] {
            self.assembler.close(kind, name.clone());
        }
    }

    fn value(&self, text: &str, range: Range<usize>) -> Option<f64> {
        parse_decimal(column(text, range), self.decimal_separator).ok()
    }

    fn start_station(&mut self, text: &str, key: &str, name: &str, line_number: usize) {
        self.assembler.close_direction_set();
        let (is_plan, instrument_height) = match HeightKey::parse(key) {
            HeightKey::Plan => (true, 0.0),
            HeightKey::Height(ih) => (false, ih),
            HeightKey::Cached | HeightKey::Missing => (false, 0.0),
        };
        debug!("Line {}: new station {}", line_number, name);
        self.station = Some(Station {
            name: name.to_string(),
            code: attribute_code(text),
            instrument_height,
            is_plan,
            target_heights: HashMap::new(),
        });
    }

    fn add_observation(&mut self, text: &str, c1: u8, key: &str, target: &str) {
        let Some(station) = self.station.as_mut().filter(|s| !s.name.is_empty()) else {
            return;
        };

        let (target_is_plan, th) = match HeightKey::parse(key) {
            HeightKey::Plan => (true, 0.0),
            HeightKey::Cached => {
                let th = *station.target_heights.entry(target.to_string()).or_insert(0.0);
                (false, th)
            }
            HeightKey::Height(th) => {
                station.target_heights.insert(target.to_string(), th);
                (false, th)
            }
            HeightKey::Missing => (false, 0.0),
        };
        let station = station.clone();
        let target_code = attribute_code(text);
        let spatial = !station.is_plan && !target_is_plan;
        let ih = station.instrument_height;
        let (plan_ih, plan_th) = (
            if station.is_plan { 0.0 } else { ih },
            if target_is_plan { 0.0 } else { th },
        );

        let add_points = |points: &mut PointNames, start: PointDimension, end: PointDimension| {
            points.add(&station.name, &station.code, start);
            points.add(target, &target_code, end);
        };
        let plan_or_space = |forced_plan: bool, is_plan: bool| {
            if forced_plan || is_plan {
                PointDimension::Two
            } else {
                PointDimension::Three
            }
        };

        let mut distance = None;

        if matches!(c1, 2 | 3) && spatial {
            if let Some(slope) = self.value(text, VALUE_1).filter(|d| *d > 0.0) {
                distance = Some(slope);
                let observation = ObservationDraft::new(&station.name, target, ih, th, slope)
                    .with_distance(Some(slope));
                self.assembler.push(ObservationType::SlopeDistance, observation);
                add_points(&mut self.points, PointDimension::Three, PointDimension::Three);
            }
        }

        if matches!(c1, 5 | 6) {
            if let Some(horizontal) = self.value(text, VALUE_1).filter(|d| *d > 0.0) {
                distance = Some(horizontal);
                let observation =
                    ObservationDraft::new(&station.name, target, plan_ih, plan_th, horizontal)
                        .with_distance(Some(horizontal));
                self.assembler.push(ObservationType::HorizontalDistance, observation);
                add_points(
                    &mut self.points,
                    plan_or_space(c1 == 6, station.is_plan),
                    plan_or_space(c1 == 6, target_is_plan),
                );
            }
        }

        if matches!(c1, 2 | 5 | 8) {
            if let Some(direction) = self.value(text, VALUE_2) {
                let observation = ObservationDraft::new(
                    &station.name,
                    target,
                    plan_ih,
                    plan_th,
                    direction * RHO_GRAD2RAD,
                )
                .with_distance(distance);
                self.assembler.push(ObservationType::Direction, observation);
                add_points(
                    &mut self.points,
                    plan_or_space(c1 == 8, station.is_plan),
                    plan_or_space(c1 == 8, target_is_plan),
                );
            }
        }

        if matches!(c1, 2 | 4) && spatial {
            if let Some(zenith) = self.value(text, VALUE_3) {
                let observation =
                    ObservationDraft::new(&station.name, target, ih, th, zenith * RHO_GRAD2RAD)
                        .with_distance(distance);
                self.assembler.push(ObservationType::ZenithAngle, observation);
                add_points(&mut self.points, PointDimension::Three, PointDimension::Three);
            }
        }

        if matches!(c1, 5 | 7) && spatial {
            if let Some(delta_height) = self.value(text, VALUE_3) {
                let observation = ObservationDraft::new(&station.name, target, ih, th, delta_height)
                    .with_distance(distance);
                self.assembler.push(ObservationType::Leveling, observation);
                let dimension = if c1 == 5 {
                    PointDimension::Three
                } else {
                    PointDimension::One
                };
                add_points(&mut self.points, dimension, dimension);
            }
        }
    }

    fn emit(&mut self, setup: &LevelingData) {
        if let Some(observation) = setup.to_observation() {
            self.assembler.push(ObservationType::Leveling, observation);
        }
    }

    fn add_leveling(&mut self, text: &str, c1: u8, c2: u8, target: &str) -> Result<()> {
        let precision_mode = column(text, PRECISION_FLAG) == "2";
        let sign = if c1 == 3 { -1.0 } else { 1.0 };
        let distance = if c2 == 8 {
            None
        } else {
            self.value(text, VALUE_1).filter(|d| *d > 0.0)
        };
        let first = sign * parse_decimal(column(text, VALUE_2), self.decimal_separator)?;
        let second = if precision_mode {
            Some(sign * parse_decimal(column(text, VALUE_3), self.decimal_separator)?)
        } else {
            None
        };
        let code = attribute_code(text);
        let unnamed = target.is_empty() || target == "0";

        if c2 == 5 {
            let name = match (&self.last_turning_point, unnamed) {
                (Some(last), true) => last.clone(),
                _ => target.to_string(),
            };
            let mut setup = LevelingData::new();
            setup.add_back_sight(&name, first, distance, true);
            if let Some(second) = second {
                setup.add_back_sight(&name, second, distance, false);
            }
            self.setup = Some(setup);
            self.back_reading = Some(first);
            self.back_distance = distance;
            self.points.add(&name, &code, PointDimension::One);
            let station = self.station.get_or_insert_with(Station::default);
            station.name = name;
            station.code = code;
            return Ok(());
        }

        if self.setup.is_none() {
            return Ok(());
        }

        let name = if unnamed {
            self.turning_points += 1;
            let name = turning_point_name(self.turning_points);
            self.last_turning_point = Some(name.clone());
            name
        } else {
            target.to_string()
        };

        if c2 > 6 {
            let start = self.station.as_ref().map(|s| s.name.clone());
            if let (Some(back), Some(start)) = (self.back_reading, start) {
                let mut side = LevelingData::new();
                side.add_back_sight(&start, back, self.back_distance, true);
                side.add_fore_sight(&name, first, distance, true);
                self.emit(&side);
            }
        }

        if c2 == 6 {
            if let Some(mut setup) = self.setup.take() {
                setup.add_fore_sight(&name, first, distance, true);
                if let Some(second) = second {
                    setup.add_fore_sight(&name, second, distance, false);
                }
                self.emit(&setup);
            }
        }

        self.points.add(&name, &code, PointDimension::One);
        Ok(())
    }
}

impl LineDecoder for ZFileDecoder {
    fn parse_line(&mut self, line: &RawLine<'_>) -> Result<()> {
        let text = line.text;
        if text.len() < MIN_LENGTH {
            return Ok(());
        }
        require_ascii(text)?;

        let bytes = text.as_bytes();
        let (c1, c2) = (bytes[CODE_1], bytes[CODE_2]);
        if !c1.is_ascii_digit() || !c2.is_ascii_digit() {
            return Ok(());
        }
        let (c1, c2) = (c1 - b'0', c2 - b'0');
        let key = column(text, HEIGHT_KEY).trim();
        let target = column(text, POINT_ID).trim();

        if c1 < 1 {
            self.close_all();
        }
        if (c1, c2) == (0, 4) {
            self.project = Some(target.to_string()).filter(|p| !p.is_empty());
        }

        let is_observation = text.len() >= MIN_OBSERVATION_LENGTH
            && (2..=8).contains(&c1)
            && (0..=4).contains(&c2)
            && bytes[DELETED_MARKER] != b'*';
        let is_leveling =
            text.len() >= MIN_OBSERVATION_LENGTH && (2..=3).contains(&c1) && (5..=8).contains(&c2);

        if (c1, c2) == (1, 0) {
            self.start_station(text, key, target, line.number);
        } else if is_observation {
            self.add_observation(text, c1, key, target);
        } else if is_leveling {
            self.add_leveling(text, c1, c2, target)?;
        }
        Ok(())
    }
}

impl SourceDecoder for ZFileDecoder {
    fn format(&self) -> SourceFormat {
        SourceFormat::ZFile
    }

    fn finish(mut self: Box<Self>) -> Vec<DraftGroup> {
        self.close_all();
        let mut points = std::mem::take(&mut self.points);
        points.normalize();
        for (dimension, point) in points.into_drafts() {
            self.assembler.points_mut().offer(dimension, point);
        }
        self.assembler.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_key() {
        assert_eq!(HeightKey::parse("10abc"), HeightKey::Missing);
        assert_eq!(HeightKey::parse("109999"), HeightKey::Plan);
        assert_eq!(HeightKey::parse("100000"), HeightKey::Cached);
        assert_eq!(HeightKey::parse("101600"), HeightKey::Height(1.6));
        assert_eq!(HeightKey::parse("1"), HeightKey::Missing);
    }

    #[test]
    fn test_normalize_promotes_and_merges_codes() {
        let mut names = PointNames::default();
        names.add("A", "", PointDimension::One);
        names.add("A", "BOLT", PointDimension::Two);
        names.add("B", "", PointDimension::Two);
        names.add("C", "", PointDimension::Three);
        names.add("C", "PILLAR", PointDimension::One);

        names.normalize();

        assert!(names.one.is_empty());
        assert_eq!(names.two.keys().collect::<Vec<_>>(), vec!["B"]);
        assert_eq!(names.three.get("A").map(String::as_str), Some("BOLT"));
        assert_eq!(names.three.get("C").map(String::as_str), Some("PILLAR"));
    }

    #[test]
    fn test_attribute_code() {
        let mut text = format!("{:<70}", "x");
        assert_eq!(attribute_code(&text), "");
        text.push_str("|MARK|other");
        assert_eq!(attribute_code(&text), "MARK");
    }
}
