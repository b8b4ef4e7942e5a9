//! M5 digital level decoder (Zeiss DiNi / Trimble).
//!
//! Every record is a fixed 118+ column line starting with `FOR M5`. The
//! address block (columns 21..48) carries point id, code and loop id; three
//! typed value blocks follow, each with a two-letter type and a unit label.

use super::{
    DecoderContext, SourceDecoder, SourceFormat, column, parse_decimal, require_ascii,
    turning_point_name,
};
use crate::assembler::GroupAssembler;
use crate::constants::m5_columns::*;
use crate::constants::{FOOT_TO_METER, TURNING_POINT_CODE};
use crate::error::{ImportError, Result};
use crate::leveling::LevelingData;
use crate::models::{DraftGroup, ObservationType, PointDimension, PointDraft};
use crate::reader::{LineDecoder, RawLine};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// An address block that names something
static ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\w+.+$").expect("Invalid M5 address regex"));

/// One typed value block
#[derive(Debug, Clone, Copy)]
struct Field<'a> {
    kind: &'a str,
    value: &'a str,
    unit: &'a str,
}

impl Field<'_> {
    fn is_foot(&self) -> bool {
        self.unit.trim().eq_ignore_ascii_case("ft")
    }

    fn read(&self, separator: char) -> Result<f64> {
        let value = parse_decimal(self.value, separator)?;
        Ok(if self.is_foot() { FOOT_TO_METER * value } else { value })
    }

    /// Staff distance, present only for `E` and `HD` blocks
    fn read_distance(&self, separator: char) -> Result<Option<f64>> {
        match self.kind {
            "E" | "HD" => self.read(separator).map(Some),
            _ => Ok(None),
        }
    }
}

pub struct M5Decoder {
    assembler: GroupAssembler,
    decimal_separator: char,
    loop_id: Option<String>,
    setup: Option<LevelingData>,
    /// Back sight of the current setup, referenced by side shots
    start_point: Option<String>,
    back_reading: Option<f64>,
    back_distance: Option<f64>,
    last_point: Option<String>,
    turning_points: u32,
}

impl M5Decoder {
    pub fn new(context: DecoderContext) -> Self {
        Self {
            assembler: GroupAssembler::new(&context.source_name, context.reserved_points),
            decimal_separator: context.decimal_separator,
            loop_id: None,
            setup: None,
            start_point: None,
            back_reading: None,
            back_distance: None,
            last_point: None,
            turning_points: 0,
        }
    }

    fn close_loop(&mut self) {
        let prefix = self
            .loop_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| format!("{} ", id));
        let name = self.assembler.item_name(prefix.as_deref(), None);
        self.assembler.close(ObservationType::Leveling, name);
    }

    fn emit(&mut self, setup: &LevelingData) {
        if let Some(observation) = setup.to_observation() {
            self.assembler.push(ObservationType::Leveling, observation);
        }
    }

    /// Add a 1D point unless the name is already known
    fn add_height_point(&mut self, name: &str, code: &str, field: &Field<'_>) -> Result<()> {
        if self.assembler.points().is_known(name) {
            return Ok(());
        }
        let z = field.read(self.decimal_separator)?;
        let point = PointDraft::new(name, code).with_height(z);
        self.assembler.points_mut().offer(PointDimension::One, point);
        Ok(())
    }

    fn last_point_name(&self) -> Result<String> {
        self.last_point
            .clone()
            .ok_or_else(|| ImportError::malformed("back sight without point id"))
    }
}

impl LineDecoder for M5Decoder {
    fn parse_line(&mut self, line: &RawLine<'_>) -> Result<()> {
        let text = line.text;
        let upper = text.to_uppercase();
        if !upper.starts_with(RECORD_PREFIX) || text.len() < MIN_LENGTH {
            return Ok(());
        }
        if upper.as_bytes().get(ERROR_MARKER) == Some(&b'E') {
            debug!("Line {}: record flagged as erroneous", line.number);
            return Ok(());
        }
        require_ascii(text)?;

        let type_2 = column(text, TYPE_2).trim();
        let address = column(text, VALUE_2);
        let value_3 = Field {
            kind: column(text, TYPE_3).trim(),
            value: column(text, VALUE_3),
            unit: column(text, UNIT_3),
        };
        let value_4 = Field {
            kind: column(text, TYPE_4).trim(),
            value: column(text, VALUE_4),
            unit: column(text, UNIT_4),
        };
        let value_5 = Field {
            kind: column(text, TYPE_5).trim(),
            value: column(text, VALUE_5),
            unit: column(text, UNIT_5),
        };

        if address.contains("#####") || !(type_2.starts_with("KD") || type_2.starts_with("KN")) {
            return Ok(());
        }
        if !ADDRESS.is_match(address) || address.len() < LOOP_ID.end {
            return Ok(());
        }

        let mut name = column(address, POINT_ID).trim().to_string();
        let mut code = column(address, POINT_CODE).trim().to_string();
        let loop_id = column(address, LOOP_ID).trim().to_string();

        if self.loop_id.as_ref().is_some_and(|current| *current != loop_id) {
            debug!("Line {}: loop {} starts", line.number, loop_id);
            self.close_loop();
        }
        self.loop_id = Some(loop_id);

        let separator = self.decimal_separator;
        match value_3.kind {
            "Lr" | "Rb" => {
                if name.is_empty() {
                    name = self.last_point_name()?;
                }
                let reading = value_3.read(separator)?;
                let distance = value_4.read_distance(separator)?;

                if self.setup.is_none() {
                    self.start_point = Some(name.clone());
                    self.back_reading = Some(reading);
                    self.back_distance = distance;
                }
                self.setup
                    .get_or_insert_with(LevelingData::new)
                    .push_back_sight(&name, reading, distance);
            }
            "Lv" | "Rf" => {
                let reading = value_3.read(separator)?;
                let distance = value_4.read_distance(separator)?;
                if name.is_empty() {
                    self.turning_points += 1;
                    name = turning_point_name(self.turning_points);
                    self.last_point = Some(name.clone());
                }
                if let Some(setup) = self.setup.as_mut() {
                    setup.push_fore_sight(&name, reading, distance);
                }
            }
            "Lz" | "Rz" => {
                let reading = value_3.read(separator)?;
                let distance = value_4.read_distance(separator)?;
                if value_5.kind == "Z" {
                    self.add_height_point(&name, &code, &value_5)?;
                }
                if let (Some(start), Some(back)) = (self.start_point.clone(), self.back_reading) {
                    let mut side = LevelingData::new();
                    side.add_back_sight(&start, back, self.back_distance, true);
                    side.add_fore_sight(&name, reading, distance, true);
                    self.emit(&side);
                }
            }
            _ if value_5.kind == "Z" => {
                if name.is_empty() {
                    name = self.last_point_name()?;
                    code = TURNING_POINT_CODE.to_string();
                }
                self.add_height_point(&name, &code, &value_5)?;
                if let Some(setup) = self.setup.take() {
                    self.emit(&setup);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl SourceDecoder for M5Decoder {
    fn format(&self) -> SourceFormat {
        SourceFormat::M5
    }

    fn finish(mut self: Box<Self>) -> Vec<DraftGroup> {
        if let Some(setup) = self.setup.take() {
            self.emit(&setup);
        }
        self.close_loop();
        self.assembler.finish()
    }
}
