//! Topcon DL-100 decoder.
//!
//! Records are comma separated; the first letter selects the record kind:
//!
//! - `B`, `C`: loop start (single run / double run) with the known start
//!   height and the loop date
//! - `W`, `T`, `Z`: loop interruptions and loop end
//! - `G`, `H`: first and second back sight
//! - `I`, `J`: first and second fore sight
//! - `K`: side shot
//!
//! The second character of field 1 is a unit code selecting the scale of
//! staff readings, staff distances and keyed-in heights.

use super::{DecoderContext, SourceDecoder, SourceFormat, parse_decimal};
use crate::assembler::GroupAssembler;
use crate::constants::FOOT_TO_METER;
use crate::constants::dl100::*;
use crate::error::{ImportError, Result};
use crate::leveling::LevelingData;
use crate::models::{DraftGroup, ObservationType, PointDimension, PointDraft};
use crate::reader::{LineDecoder, RawLine};
use chrono::NaiveDateTime;
use tracing::{debug, warn};

/// Unit code of one DL-100 record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Dl100Unit(char);

impl Dl100Unit {
    /// Second character of the (trimmed) status field
    fn from_field(field: &str) -> Result<Self> {
        field
            .trim()
            .chars()
            .nth(1)
            .map(|c| Self(c.to_ascii_uppercase()))
            .ok_or_else(|| ImportError::malformed(format!("no unit code in '{}'", field)))
    }

    fn unsupported(self) -> ImportError {
        ImportError::UnsupportedUnit {
            code: self.0.to_string(),
        }
    }

    fn foot_factor(self) -> f64 {
        match self.0 {
            '4' | '5' | '6' | '9' | 'A' => FOOT_TO_METER,
            _ => 1.0,
        }
    }

    fn staff_scale(self) -> Result<f64> {
        match self.0 {
            '1' => Ok(1.0e-3),
            '2' | '7' => Ok(1.0e-4),
            '3' | '4' | '8' => Ok(1.0e-5),
            '5' | '9' => Ok(1.0e-6),
            '6' | 'A' => Ok(1.0e-7),
            _ => Err(self.unsupported()),
        }
    }

    fn distance_scale(self) -> Result<f64> {
        match self.0 {
            '1' | '2' | '7' => Ok(1.0e-2),
            '3' | '8' => Ok(1.0e-3),
            '4' | '5' | '6' | '9' | 'A' => Ok(1.0e-5),
            _ => Err(self.unsupported()),
        }
    }

    fn input_scale(self) -> Result<f64> {
        match self.0 {
            '1' | '2' => Ok(1.0e-3),
            '3' | '7' => Ok(1.0e-4),
            '4' | '5' | '8' => Ok(1.0e-5),
            '6' | '9' => Ok(1.0e-6),
            'A' => Ok(1.0e-7),
            _ => Err(self.unsupported()),
        }
    }

    fn convert(self, text: &str, scale: f64) -> Result<f64> {
        Ok(parse_decimal(text, '.')? * scale * self.foot_factor())
    }

    fn staff(self, text: &str) -> Result<f64> {
        self.convert(text, self.staff_scale()?)
    }

    fn distance(self, text: &str) -> Result<f64> {
        self.convert(text, self.distance_scale()?)
    }

    fn input(self, text: &str) -> Result<f64> {
        self.convert(text, self.input_scale()?)
    }
}

/// Field `index`, trimmed; empty when absent
fn field<'a>(fields: &[&'a str], index: usize) -> &'a str {
    fields.get(index).map(|f| f.trim()).unwrap_or_default()
}

pub struct Dl100Decoder {
    assembler: GroupAssembler,
    loop_id: Option<String>,
    loop_date: Option<NaiveDateTime>,
    setup: Option<LevelingData>,
    /// First back sight of the current setup, referenced by side shots
    start_point: Option<String>,
    back_reading: Option<f64>,
    back_distance: Option<f64>,
}

impl Dl100Decoder {
    pub fn new(context: DecoderContext) -> Self {
        Self {
            assembler: GroupAssembler::new(&context.source_name, context.reserved_points),
            loop_id: None,
            loop_date: None,
            setup: None,
            start_point: None,
            back_reading: None,
            back_distance: None,
        }
    }

    fn close_loop(&mut self) {
        let Some(loop_id) = &self.loop_id else {
            return;
        };
        let prefix = match self.loop_date {
            Some(date) => format!("{} ({}) ", loop_id, date.format(DISPLAY_DATE_FORMAT)),
            None => format!("{} ", loop_id),
        };
        let name = self.assembler.item_name(Some(&prefix), None);
        self.assembler.close(ObservationType::Leveling, name);
    }

    /// Push a setup whose end differs from its start
    fn emit(&mut self, setup: Option<LevelingData>) {
        let Some(setup) = setup else {
            return;
        };
        if setup.start_point() == setup.end_point() {
            return;
        }
        if let Some(observation) = setup.to_observation() {
            self.assembler.push(ObservationType::Leveling, observation);
        }
    }

    fn add_height_point(&mut self, name: &str, z: f64) {
        if name.is_empty() || self.assembler.points().is_known(name) {
            return;
        }
        let point = PointDraft::new(name, "").with_height(z);
        self.assembler.points_mut().offer(PointDimension::One, point);
    }

    fn parse_date(text: &str, line_number: usize) -> Option<NaiveDateTime> {
        match NaiveDateTime::parse_from_str(text, DATE_FORMAT) {
            Ok(date) => Some(date),
            Err(e) => {
                warn!("Line {}: invalid loop date '{}': {}", line_number, text, e);
                None
            }
        }
    }

    /// `B`/`C` record: close the previous loop and register the start height
    fn start_loop(&mut self, kind: char, fields: &[&str], line_number: usize) -> Result<()> {
        self.close_loop();
        let loop_id = field(fields, 2).to_string();
        debug!("Line {}: loop {} starts", line_number, loop_id);
        self.loop_id = Some(loop_id);

        let (date, point, height) = match kind {
            'B' if fields.len() > 5 => (5, 3, 4),
            'C' if fields.len() > 20 => (20, 18, 19),
            _ => return Ok(()),
        };

        let date = field(fields, date);
        if !date.is_empty() {
            self.loop_date = Self::parse_date(date, line_number);
        }

        let name = field(fields, point);
        let height = field(fields, height);
        if name.is_empty() || height.is_empty() || self.assembler.points().is_known(name) {
            return Ok(());
        }
        let unit = Dl100Unit::from_field(field(fields, 1))?;
        let z0 = unit.input(height)?;
        self.add_height_point(name, z0);
        Ok(())
    }

    /// `G`..`K` record
    fn add_measurement(&mut self, kind: char, fields: &[&str]) -> Result<()> {
        let status = field(fields, 1);
        let name = field(fields, 7);
        if status.len() < 2 || name.is_empty() || field(fields, 2).is_empty() {
            return Ok(());
        }
        let unit = Dl100Unit::from_field(status)?;

        let reading = unit.staff(field(fields, 2))?;
        let distance = match field(fields, 3) {
            "" => None,
            text => Some(unit.distance(text)?),
        };
        let z = match field(fields, 4) {
            "" => 0.0,
            text => unit.staff(text)?,
        };

        if kind == 'G' {
            let previous = self.setup.take();
            self.emit(previous);
            self.setup = Some(LevelingData::new());
            self.start_point = Some(name.to_string());
            self.back_reading = Some(reading);
            self.back_distance = distance;
        }

        if let ('K', Some(start), Some(back)) = (kind, self.start_point.clone(), self.back_reading)
        {
            let mut side = LevelingData::new();
            side.add_back_sight(&start, back, self.back_distance, true);
            side.add_fore_sight(name, reading, distance, true);
            self.add_height_point(name, z);
            self.emit(Some(side));
        } else if let Some(setup) = self.setup.as_mut() {
            match kind {
                'G' | 'H' => setup.add_back_sight(name, reading, distance, kind == 'G'),
                _ => setup.add_fore_sight(name, reading, distance, kind == 'I'),
            }
            self.add_height_point(name, z);
        }
        Ok(())
    }
}

impl LineDecoder for Dl100Decoder {
    fn parse_line(&mut self, line: &RawLine<'_>) -> Result<()> {
        let Some(kind) = line.text.chars().next().map(|c| c.to_ascii_uppercase()) else {
            return Ok(());
        };
        let fields: Vec<&str> = line.text.split(FIELD_SEPARATOR).collect();

        if matches!(kind, 'B' | 'C' | 'W' | 'T' | 'Z') {
            let started = if matches!(kind, 'B' | 'C') && fields.len() > 2 {
                self.start_loop(kind, &fields, line.number)
            } else {
                Ok(())
            };

            // every boundary ends the open setup
            let open = self.setup.take();
            self.emit(open);
            self.start_point = None;
            self.back_reading = None;
            self.back_distance = None;
            return started;
        }

        if self.loop_id.is_some() && fields.len() > 7 && matches!(kind, 'G'..='K') {
            self.add_measurement(kind, &fields)?;
        }
        Ok(())
    }
}

impl SourceDecoder for Dl100Decoder {
    fn format(&self) -> SourceFormat {
        SourceFormat::Dl100
    }

    fn finish(mut self: Box<Self>) -> Vec<DraftGroup> {
        let open = self.setup.take();
        self.emit(open);
        self.close_loop();
        self.assembler.finish()
    }
}
