//! Neptan BEO decoder.
//!
//! Fixed-column records of at least 89 characters. The three character key
//! selects the kind:
//!
//! - `10.` station with instrument height
//! - `20.`, `21.`, `24.`, `31.` spatial round: slope distance, direction,
//!   zenith angle
//! - `50.` plan round: horizontal distance, direction, height difference
//! - `70.` leveling: height difference with distance
//!
//! Heights (instrument or reflector) follow as a free-format number from
//! column 79. A station without a readable height keeps the previous
//! instrument height.

use super::{DecoderContext, SourceDecoder, SourceFormat, column, parse_decimal, require_ascii};
use crate::assembler::GroupAssembler;
use crate::constants::RHO_GRAD2RAD;
use crate::constants::beo_columns::*;
use crate::error::Result;
use crate::models::{DraftGroup, ObservationDraft, ObservationType};
use crate::reader::{LineDecoder, RawLine};
use std::ops::Range;
use tracing::debug;

#[derive(Debug, Clone)]
struct Station {
    name: String,
    instrument_height: f64,
    /// No observation has been read from this station yet
    is_new: bool,
}

pub struct BeoDecoder {
    assembler: GroupAssembler,
    decimal_separator: char,
    station: Option<Station>,
    /// Last instrument height read, kept when a station record has none
    instrument_height: f64,
}

impl BeoDecoder {
    pub fn new(context: DecoderContext) -> Self {
        Self {
            assembler: GroupAssembler::new(&context.source_name, context.reserved_points),
            decimal_separator: context.decimal_separator,
            station: None,
            instrument_height: 0.0,
        }
    }

    /// First token of the height area, `None` when absent or unparsable
    fn parse_height(&self, text: &str) -> Option<f64> {
        let token = text
            .get(HEIGHT_FROM..)
            .and_then(|rest| rest.split_whitespace().next())?;
        match parse_decimal(token, self.decimal_separator) {
            Ok(height) if height == NO_HEIGHT => Some(0.0),
            Ok(height) => Some(height),
            Err(e) => {
                debug!("Unreadable height '{}': {}", token, e);
                None
            }
        }
    }

    /// Reflector height of a target record; 0 when absent or unparsable
    fn height(&self, text: &str) -> f64 {
        self.parse_height(text).unwrap_or(0.0)
    }

    fn value(&self, text: &str, range: Range<usize>) -> Option<f64> {
        let field = column(text, range).trim();
        if field.is_empty() {
            return None;
        }
        match parse_decimal(field, self.decimal_separator) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Dropping BEO field '{}': {}", field, e);
                None
            }
        }
    }

    /// Station of an observation record. The first observation after a
    /// station record closes the previous direction set.
    fn observing_station(&mut self) -> Option<Station> {
        let station = self.station.as_mut()?;
        if station.is_new {
            station.is_new = false;
            self.assembler.close_direction_set();
        }
        self.station.clone()
    }

    fn observation(station: &Station, end: &str, th: f64, value: f64) -> ObservationDraft {
        ObservationDraft::new(&station.name, end, station.instrument_height, th, value)
    }

    fn spatial_round(&mut self, text: &str, station: &Station, end: &str) {
        let th = self.height(text);
        let distance = self.value(text, DISTANCE).filter(|d| *d > 0.0);
        if let Some(slope) = distance {
            let observation = Self::observation(station, end, th, slope).with_distance(distance);
            self.assembler.push(ObservationType::SlopeDistance, observation);
        }
        if let Some(direction) = self.value(text, DIRECTION) {
            let observation = Self::observation(station, end, th, direction * RHO_GRAD2RAD)
                .with_distance(distance);
            self.assembler.push(ObservationType::Direction, observation);
        }
        if let Some(zenith) = self.value(text, ANGLE_OR_HEIGHT) {
            let observation = Self::observation(station, end, th, zenith * RHO_GRAD2RAD)
                .with_distance(distance);
            self.assembler.push(ObservationType::ZenithAngle, observation);
        }
    }

    fn plan_round(&mut self, text: &str, station: &Station, end: &str) {
        let th = self.height(text);
        let distance = self.value(text, DISTANCE).filter(|d| *d > 0.0);
        if let Some(horizontal) = distance {
            let observation =
                Self::observation(station, end, th, horizontal).with_distance(distance);
            self.assembler.push(ObservationType::HorizontalDistance, observation);
        }
        if let Some(direction) = self.value(text, DIRECTION) {
            let observation = Self::observation(station, end, th, direction * RHO_GRAD2RAD)
                .with_distance(distance);
            self.assembler.push(ObservationType::Direction, observation);
        }
        if let Some(delta_height) = self.value(text, ANGLE_OR_HEIGHT) {
            let observation =
                Self::observation(station, end, th, delta_height).with_distance(distance);
            self.assembler.push(ObservationType::Leveling, observation);
        }
    }

    fn leveling(&mut self, text: &str, station: &Station, end: &str) {
        let th = self.height(text);
        if let Some(delta_height) = self.value(text, ANGLE_OR_HEIGHT) {
            let distance = self.value(text, DISTANCE);
            let observation =
                Self::observation(station, end, th, delta_height).with_distance(distance);
            self.assembler.push(ObservationType::Leveling, observation);
        }
    }
}

impl LineDecoder for BeoDecoder {
    fn parse_line(&mut self, line: &RawLine<'_>) -> Result<()> {
        let text = line.text.trim();
        if text.len() < MIN_LENGTH {
            return Ok(());
        }
        require_ascii(text)?;

        let key = column(text, RECORD_KEY).trim();
        let point = column(text, POINT_ID).trim();

        if key == STATION {
            if point.is_empty() {
                self.station = None;
                return Ok(());
            }
            debug!("Line {}: new station {}", line.number, point);
            if let Some(height) = self.parse_height(text) {
                self.instrument_height = height;
            }
            self.station = Some(Station {
                name: point.to_string(),
                instrument_height: self.instrument_height,
                is_new: true,
            });
            return Ok(());
        }

        let is_spatial = SPATIAL_ROUNDS.contains(&key);
        if !(is_spatial || key == PLAN_ROUND || key == LEVELING) {
            return Ok(());
        }
        let Some(station) = self.observing_station() else {
            return Ok(());
        };
        if point.is_empty() || (is_spatial && point == station.name) {
            return Ok(());
        }

        if is_spatial {
            self.spatial_round(text, &station, point);
        } else if key == PLAN_ROUND {
            self.plan_round(text, &station, point);
        } else {
            self.leveling(text, &station, point);
        }
        Ok(())
    }
}

impl SourceDecoder for BeoDecoder {
    fn format(&self) -> SourceFormat {
        SourceFormat::Beo
    }

    fn finish(self: Box<Self>) -> Vec<DraftGroup> {
        self.assembler.finish()
    }
}
