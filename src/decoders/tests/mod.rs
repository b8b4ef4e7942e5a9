//! Tests for the instrument format decoders

pub mod dl100_tests;
pub mod m5_tests;

use crate::config::ImportConfig;
use crate::decoders::{DecoderContext, SourceFormat, create_decoder};
use crate::models::{DraftGroup, GroupKind, ObservationDraft, ObservationType, PointDimension, PointDraft};
use crate::reader::RawLine;

pub const EPS: f64 = 1e-9;

/// Feed `lines` through a fresh decoder. Returns the groups and the number
/// of lines that failed to decode.
pub fn decode_lines(
    format: SourceFormat,
    source_name: &str,
    config: &ImportConfig,
    reserved: &[&str],
    lines: &[String],
) -> (Vec<DraftGroup>, usize) {
    let context = DecoderContext::new(source_name, config)
        .with_reserved_points(reserved.iter().map(|n| n.to_string()).collect());
    let mut decoder = create_decoder(format, context);
    assert_eq!(decoder.format(), format);

    let mut failures = 0;
    for (index, text) in lines.iter().enumerate() {
        let line = RawLine {
            number: index + 1,
            offset: 0,
            text,
        };
        if decoder.parse_line(&line).is_err() {
            failures += 1;
        }
    }
    (decoder.finish(), failures)
}

pub fn observation_groups(groups: &[DraftGroup], kind: ObservationType) -> Vec<&DraftGroup> {
    groups
        .iter()
        .filter(|g| g.kind == GroupKind::Observations(kind))
        .collect()
}

pub fn observations(groups: &[DraftGroup], kind: ObservationType) -> Vec<&ObservationDraft> {
    observation_groups(groups, kind)
        .into_iter()
        .flat_map(|g| g.observations())
        .collect()
}

pub fn points(groups: &[DraftGroup], dimension: PointDimension) -> Vec<&PointDraft> {
    groups
        .iter()
        .filter(|g| g.kind == GroupKind::Points(dimension))
        .flat_map(|g| g.points())
        .collect()
}

/// Write `text` into `buffer` starting at `column`, growing it as needed
pub fn place(buffer: &mut String, column: usize, text: &str) {
    if buffer.len() < column + text.len() {
        let width = column + text.len();
        *buffer = format!("{:<width$}", buffer, width = width);
    }
    buffer.replace_range(column..column + text.len(), text);
}

#[test]
fn test_place_pads_and_overwrites() {
    let mut line = String::new();
    place(&mut line, 3, "ab");
    assert_eq!(line, "   ab");
    place(&mut line, 0, "x");
    assert_eq!(line, "x  ab");
}
