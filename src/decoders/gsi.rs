//! Leica GSI8/GSI16 decoder.
//!
//! A GSI line is a sequence of fixed-width word blocks. Each block starts
//! with a 2- or 3-digit word index, a unit nibble at column 5 and a sign at
//! column 6, followed by 8 (GSI8) or 16 (GSI16) data characters. GSI16 lines
//! are marked with a leading `*`.
//!
//! Tacheometer records yield directions, zenith angles, distances and height
//! differences. Digital level records (words 331..336) are reduced to
//! leveling observations through [`LevelingData`].

use super::{DecoderContext, SourceDecoder, SourceFormat, is_digits, turning_point_name};
use crate::assembler::GroupAssembler;
use crate::config::GroupSeparation;
use crate::constants::gsi_words::*;
use crate::error::{ImportError, Result};
use crate::leveling::LevelingData;
use crate::models::{
    DimensionType, DraftGroup, ObservationDraft, ObservationType, PointDimension, PointDraft,
};
use crate::reader::{LineDecoder, RawLine};
use crate::units::{Sign, UnitCode, decode};
use regex::Regex;
use std::f64::consts::{PI, TAU};
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Point code that opens a new leveling line, e.g. `?......1`
static NEW_LINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\?\.*\d$").expect("Invalid leveling line regex"));

/// Fold a Face-II reading to Face I.
///
/// A zenith angle above π marks Face II: the direction is turned by π and
/// the zenith mirrored to 2π − zenith, both modulo 2π.
pub fn reduce_to_face_one(direction: Option<f64>, zenith: Option<f64>) -> (Option<f64>, Option<f64>) {
    match zenith {
        Some(z) if z.is_finite() && z > PI => (
            direction.map(|d| modulo(d + PI, TAU)),
            Some(modulo(TAU - z, TAU)),
        ),
        _ => (direction, zenith),
    }
}

/// Floored modulo, always in `[0, y)` for positive `y`
fn modulo(x: f64, y: f64) -> f64 {
    x - (x / y).floor() * y
}

/// A-priori distance of a direction: the horizontal distance if measured,
/// else the slope distance reduced by the zenith angle.
fn direction_distance(horizontal: Option<f64>, slope: Option<f64>, zenith: Option<f64>) -> Option<f64> {
    horizontal.or_else(|| {
        let slope = slope?;
        Some(match zenith {
            Some(z) => slope * z.abs().max(f64::EPSILON.sqrt()).sin().abs(),
            None => slope,
        })
    })
}

/// Word values of one GSI line
#[derive(Debug, Default)]
struct GsiRecord {
    point_name: Option<String>,
    point_code: String,
    line_name: Option<String>,
    new_station: bool,
    direction: Option<f64>,
    zenith: Option<f64>,
    slope_distance: Option<f64>,
    horizontal_distance: Option<f64>,
    delta_height: Option<f64>,
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    reflector_height: Option<f64>,
    instrument_height: Option<f64>,
    back_1: Option<f64>,
    back_2: Option<f64>,
    fore_1: Option<f64>,
    fore_2: Option<f64>,
    side: Option<f64>,
}

impl GsiRecord {
    /// Split a line into word blocks and collect their values
    fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if !text.is_ascii() {
            return Err(ImportError::malformed("non-ASCII characters in GSI line"));
        }
        let (body, data_width) = match text.strip_prefix('*') {
            Some(rest) => (rest, 16),
            None => (text, 8),
        };
        let line = format!("{} ", body);
        let block_width = 7 + data_width;

        let mut record = GsiRecord::default();
        let mut blocks = 0;
        let mut start = 0;
        let mut end = block_width;
        while end < line.len() {
            let block = &line[start..end];
            start = end + 1;
            end = start + block_width;
            blocks += 1;

            if let Err(e) = record.read_block(block, data_width) {
                debug!("Skipping GSI block '{}': {}", block, e);
            }
        }

        if blocks == 0 {
            return Err(ImportError::malformed(format!(
                "no complete GSI{} word block",
                data_width
            )));
        }
        Ok(record)
    }

    fn read_block(&mut self, block: &str, data_width: usize) -> Result<()> {
        let bytes = block.as_bytes();
        let index_length = if bytes[2] == b'.' { 2 } else { 3 };
        let key: u32 = block[..index_length]
            .parse()
            .map_err(|_| ImportError::malformed(format!("invalid word index in '{}'", block)))?;
        let data = &block[7..7 + data_width];

        if key == POINT_ID || (key > 100 && key / 10 == POINT_ID) {
            let name = data.trim_start_matches('0').trim();
            self.point_name = Some(if name.is_empty() { "0" } else { name }.to_string());
        } else if key == POINT_CODE || (key > 400 && key / 10 == POINT_CODE) {
            self.point_code = data.trim_start_matches('0').trim().to_string();
        } else if key == LINE_NAME {
            let name = data.trim_start_matches('0').trim();
            if !name.is_empty() {
                self.line_name = Some(name.to_string());
            }
        } else if is_numeric_word(key) && is_digits(data) {
            if STATION_WORDS.contains(&key) {
                self.new_station = true;
            }
            let unit = UnitCode::from_gsi(bytes[5] as char)?;
            let value = decode(unit, Sign::from_char(bytes[6] as char), data)?;
            self.assign(key, value);
        }
        Ok(())
    }

    fn assign(&mut self, key: u32, value: f64) {
        let slot = match key {
            HORIZONTAL_ANGLE => &mut self.direction,
            VERTICAL_ANGLE => &mut self.zenith,
            SLOPE_DISTANCE => &mut self.slope_distance,
            HORIZONTAL_DISTANCE => &mut self.horizontal_distance,
            HEIGHT_DIFFERENCE => &mut self.delta_height,
            EASTING | STATION_EASTING => &mut self.y,
            NORTHING | STATION_NORTHING => &mut self.x,
            HEIGHT | STATION_HEIGHT => &mut self.z,
            TARGET_HEIGHT => &mut self.reflector_height,
            INSTRUMENT_HEIGHT => &mut self.instrument_height,
            BACK_SIGHT_1 => &mut self.back_1,
            BACK_SIGHT_2 => &mut self.back_2,
            FORE_SIGHT_1 => &mut self.fore_1,
            FORE_SIGHT_2 => &mut self.fore_2,
            SIDE_SHOT => &mut self.side,
            _ => return,
        };
        *slot = Some(value);

        // a zero distance means "not measured"
        if matches!(key, SLOPE_DISTANCE | HORIZONTAL_DISTANCE) && value == 0.0 {
            *slot = None;
        }
    }

    fn starts_leveling_line(&self) -> bool {
        NEW_LINE_CODE.is_match(&self.point_code)
    }
}

/// Word indices that carry numeric data
fn is_numeric_word(key: u32) -> bool {
    !(key % 10 == 0 || key <= 19 || (41..=49).contains(&key) || (70..=79).contains(&key))
}

#[derive(Debug, Clone)]
struct StationContext {
    name: String,
    instrument_height: f64,
    reflector_height: f64,
}

impl StationContext {
    /// Same station with the heights a target record carries
    fn with_heights(&self, instrument_height: Option<f64>, reflector_height: Option<f64>) -> Self {
        Self {
            name: self.name.clone(),
            instrument_height: instrument_height.unwrap_or(self.instrument_height),
            reflector_height: reflector_height.unwrap_or(self.reflector_height),
        }
    }
}

/// Level readings waiting for their partner reading, with the rider
/// distances paired to them
#[derive(Debug, Default)]
struct LevelReadings {
    back_1: Option<f64>,
    back_2: Option<f64>,
    fore_1: Option<f64>,
    fore_2: Option<f64>,
    side: Option<f64>,
    /// Mean back sight the next side shot refers to
    last_back: Option<f64>,
    distance_back_1: Option<f64>,
    distance_back_2: Option<f64>,
    distance_fore_1: Option<f64>,
    distance_fore_2: Option<f64>,
    distance_side: Option<f64>,
    distance_last_back: Option<f64>,
}

impl LevelReadings {
    fn update(&mut self, record: &GsiRecord) {
        if let Some(back) = record.back_1 {
            self.back_1 = Some(back);
            self.last_back = Some(back);
        }
        if let Some(back) = record.back_2 {
            self.back_2 = Some(back);
            self.last_back = Some(match self.last_back {
                Some(last) => 0.5 * (last + back),
                None => back,
            });
        }
        if record.fore_1.is_some() {
            self.fore_1 = record.fore_1;
        }
        if record.fore_2.is_some() {
            self.fore_2 = record.fore_2;
        }
        if record.side.is_some() {
            self.side = record.side;
        }
    }

    /// Hand an unlabeled distance to the first reading still lacking one:
    /// back 1, back 2, fore 1, fore 2, side shot. Returns the distance if no
    /// reading took it.
    fn pair_distance(&mut self, distance: Option<f64>) -> Option<f64> {
        let distance = distance?;
        if self.back_1.is_some() && self.distance_back_1.is_none() {
            self.distance_back_1 = Some(distance);
            self.distance_last_back = Some(distance);
        } else if self.back_2.is_some() && self.distance_back_2.is_none() {
            self.distance_back_2 = Some(distance);
            self.distance_last_back = Some(match self.distance_last_back {
                Some(last) => 0.5 * (last + distance),
                None => distance,
            });
        } else if self.fore_1.is_some() && self.distance_fore_1.is_none() {
            self.distance_fore_1 = Some(distance);
        } else if self.fore_2.is_some() && self.distance_fore_2.is_none() {
            self.distance_fore_2 = Some(distance);
        } else if self.side.is_some() && self.distance_side.is_none() {
            self.distance_side = Some(distance);
        } else {
            return Some(distance);
        }
        None
    }

    fn reset_station_distances(&mut self) {
        self.distance_back_1 = None;
        self.distance_back_2 = None;
        self.distance_last_back = None;
    }
}

pub struct GsiDecoder {
    dimension: DimensionType,
    separation: GroupSeparation,
    assembler: GroupAssembler,
    station: Option<StationContext>,
    end_point: Option<String>,
    readings: LevelReadings,
    /// First run of a setup waiting for its second run
    open_setup: Option<LevelingData>,
    line_name: Option<String>,
    last_turning_point: Option<String>,
    turning_points: u32,
}

impl GsiDecoder {
    pub fn new(context: DecoderContext) -> Self {
        Self {
            dimension: context.dimension,
            separation: context.group_separation,
            assembler: GroupAssembler::new(&context.source_name, context.reserved_points),
            station: None,
            end_point: None,
            readings: LevelReadings::default(),
            open_setup: None,
            line_name: None,
            last_turning_point: None,
            turning_points: 0,
        }
    }

    fn accept(&mut self, kind: ObservationType, draft: ObservationDraft) {
        if self.dimension.accepts(kind) {
            self.assembler.push(kind, draft);
        }
    }

    /// Replace `0` point ids of level records by turning point names
    fn resolve_turning_point(&mut self, record: &mut GsiRecord) {
        if self.dimension != DimensionType::Height || record.point_name.as_deref() != Some("0") {
            return;
        }
        if record.fore_1.is_some() {
            self.turning_points += 1;
            let name = turning_point_name(self.turning_points);
            self.last_turning_point = Some(name.clone());
            record.point_name = Some(name);
        } else if let Some(name) = &self.last_turning_point {
            record.point_name = Some(name.clone());
        }
    }

    fn emit_open_setup(&mut self) {
        if let Some(observation) = self.open_setup.take().and_then(|s| s.to_observation()) {
            self.accept(ObservationType::Leveling, observation);
        }
    }

    fn leveling_group_name(&self) -> String {
        match (&self.line_name, &self.station) {
            (Some(line), _) => self.assembler.item_name(None, Some(&format!(" ({})", line))),
            (None, Some(station)) if self.separation.leveling => self
                .assembler
                .item_name(None, Some(&format!(" ({})", station.name))),
            _ => self.assembler.item_name(None, None),
        }
    }

    /// Close the groups that are kept per station. A setup continued from
    /// `next_station` (second run) stays open.
    fn close_station_groups(&mut self, next_station: &str) {
        if self.separation.separates(ObservationType::Direction) {
            self.assembler.close_direction_set();
        }
        let continues_setup = self
            .open_setup
            .as_ref()
            .is_some_and(|setup| setup.start_point() == Some(next_station));
        if self.separation.leveling && self.line_name.is_none() && !continues_setup {
            self.emit_open_setup();
            let name = self.leveling_group_name();
            self.assembler.close(ObservationType::Leveling, name);
        }
        let Some(station) = &self.station else {
            return;
        };
        let name = self
            .assembler
            .item_name(None, Some(&format!(" ({})", station.name)));
        for kind in [
            ObservationType::HorizontalDistance,
            ObservationType::SlopeDistance,
            ObservationType::ZenithAngle,
        ] {
            if self.separation.separates(kind) {
                self.assembler.close(kind, name.clone());
            }
        }
    }

    /// Start a new leveling line: close the current one and reset line state
    fn close_leveling_line(&mut self) {
        self.emit_open_setup();
        let name = self.leveling_group_name();
        self.assembler.close(ObservationType::Leveling, name);
        self.line_name = None;
        self.last_turning_point = None;
        self.readings = LevelReadings::default();
    }

    fn register_point(&mut self, record: &GsiRecord) {
        let Some(name) = record.point_name.as_deref() else {
            return;
        };
        let (x, y, z) = (record.x, record.y, record.z);
        let dimension = match self.dimension {
            DimensionType::Spatial | DimensionType::PlanAndHeight
                if x.is_some() && y.is_some() && z.is_some() =>
            {
                PointDimension::Three
            }
            DimensionType::Plan | DimensionType::PlanAndHeight if x.is_some() && y.is_some() => {
                PointDimension::Two
            }
            DimensionType::Height | DimensionType::PlanAndHeight if z.is_some() => {
                PointDimension::One
            }
            _ => return,
        };
        let point = PointDraft::new(name, record.point_code.as_str()).with_coordinates(x, y, z);
        self.assembler.points_mut().offer(dimension, point);
    }

    fn record_observations(&mut self, record: &GsiRecord) {
        let Some(station) = self
            .station
            .as_ref()
            .map(|s| s.with_heights(record.instrument_height, record.reflector_height))
        else {
            return;
        };
        self.station = Some(station.clone());

        self.readings.update(record);
        let mut horizontal_distance = self.readings.pair_distance(record.horizontal_distance);
        let end_point = self.end_point.clone();

        // side shot against the last back sight
        if let (Some(last_back), Some(side)) = (self.readings.last_back, self.readings.side) {
            self.readings.side = None;
            let distance_side = self.readings.distance_side.take();
            if let Some(end) = &end_point {
                let mut setup = LevelingData::new();
                setup.add_back_sight(&station.name, last_back, self.readings.distance_last_back, true);
                setup.add_fore_sight(end, side, distance_side, true);
                if let Some(observation) = setup.to_observation() {
                    self.accept(ObservationType::Leveling, observation);
                }
            }
        }

        // first run opens a setup
        if let (Some(back), Some(fore)) = (self.readings.back_1, self.readings.fore_1) {
            self.readings.back_1 = None;
            self.readings.fore_1 = None;
            let distance_back = self.readings.distance_back_1.take();
            let distance_fore = self.readings.distance_fore_1.take();
            self.emit_open_setup();
            if let Some(end) = &end_point {
                let mut setup = LevelingData::new();
                setup.add_back_sight(&station.name, back, distance_back, true);
                setup.add_fore_sight(end, fore, distance_fore, true);
                self.open_setup = Some(setup);
            }
        }
        // second run completes it
        else if let (Some(back), Some(fore)) = (self.readings.back_2, self.readings.fore_2) {
            self.readings.back_2 = None;
            self.readings.fore_2 = None;
            let distance_back = self.readings.distance_back_2.take();
            let distance_fore = self.readings.distance_fore_2.take();
            let fore_name = end_point
                .as_deref()
                .or(self.open_setup.as_ref().and_then(|s| s.end_point()))
                .map(str::to_string);
            let mismatch = self.open_setup.as_ref().is_some_and(|setup| {
                setup.start_point() != Some(station.name.as_str())
                    || (fore_name.is_some() && setup.end_point() != fore_name.as_deref())
            });
            if mismatch {
                warn!(
                    "Second run {} -> {} does not repeat the open setup, keeping both runs apart",
                    station.name,
                    fore_name.as_deref().unwrap_or("?")
                );
                self.emit_open_setup();
            }
            let mut setup = self.open_setup.take().unwrap_or_default();
            let is_first = !setup.has_back_sight();
            setup.add_back_sight(&station.name, back, distance_back, is_first);
            if let Some(end) = fore_name {
                setup.add_fore_sight(&end, fore, distance_fore, is_first);
            }
            if let Some(observation) = setup.to_observation() {
                self.accept(ObservationType::Leveling, observation);
            }
        }

        let Some(end) = end_point else {
            return;
        };

        if let Some(delta_height) = record.delta_height {
            let observation = ObservationDraft::new(&station.name, &end, 0.0, 0.0, delta_height)
                .with_distance(horizontal_distance);
            self.accept(ObservationType::Leveling, observation);
        }

        let (ih, th) = (station.instrument_height, station.reflector_height);

        if let Some(direction) = record.direction {
            let distance =
                direction_distance(horizontal_distance, record.slope_distance, record.zenith);
            let observation =
                ObservationDraft::new(&station.name, &end, ih, th, direction).with_distance(distance);
            self.accept(ObservationType::Direction, observation);
        }

        if let Some(distance) = horizontal_distance.take() {
            let observation = ObservationDraft::new(&station.name, &end, ih, th, distance)
                .with_distance(Some(distance));
            self.accept(ObservationType::HorizontalDistance, observation);
        }

        if let Some(distance) = record.slope_distance {
            let observation = ObservationDraft::new(&station.name, &end, ih, th, distance)
                .with_distance(Some(distance));
            self.accept(ObservationType::SlopeDistance, observation);
        }

        if let Some(zenith) = record.zenith {
            let observation = ObservationDraft::new(&station.name, &end, ih, th, zenith)
                .with_distance(record.slope_distance);
            self.accept(ObservationType::ZenithAngle, observation);
        }
    }
}

impl LineDecoder for GsiDecoder {
    fn parse_line(&mut self, line: &RawLine<'_>) -> Result<()> {
        let mut record = GsiRecord::parse(line.text)?;

        // zenith angles are folded in spatial mode only
        if self.dimension != DimensionType::Height {
            let (direction, zenith) = reduce_to_face_one(record.direction, record.zenith);
            record.direction = direction;
            if self.dimension == DimensionType::Spatial {
                record.zenith = zenith;
            }
        }

        if self.dimension == DimensionType::Height {
            if record.starts_leveling_line() {
                debug!("Line {}: new leveling line", line.number);
                self.close_leveling_line();
            }
            if let Some(name) = record.line_name.clone() {
                if self.line_name.as_ref().is_some_and(|current| *current != name) {
                    self.close_leveling_line();
                }
                self.line_name = Some(name);
            }
        }

        self.resolve_turning_point(&mut record);

        match record.point_name.clone() {
            Some(name) if record.new_station => {
                self.close_station_groups(&name);
                debug!("Line {}: new station {}", line.number, name);
                self.station = Some(StationContext {
                    name,
                    instrument_height: record.instrument_height.unwrap_or(0.0),
                    reflector_height: record.reflector_height.unwrap_or(0.0),
                });
                self.readings.reset_station_distances();
            }
            Some(name) => self.end_point = Some(name),
            None => {}
        }

        self.register_point(&record);
        self.record_observations(&record);
        Ok(())
    }
}

impl SourceDecoder for GsiDecoder {
    fn format(&self) -> SourceFormat {
        SourceFormat::Gsi
    }

    fn finish(mut self: Box<Self>) -> Vec<DraftGroup> {
        self.emit_open_setup();
        let name = self.leveling_group_name();
        self.assembler.close(ObservationType::Leveling, name);
        self.assembler.finish()
    }
}
