//! M5 decoder tests

use super::{EPS, decode_lines, observation_groups, observations, place, points};
use crate::config::ImportConfig;
use crate::constants::FOOT_TO_METER;
use crate::decoders::SourceFormat;
use crate::models::{DraftGroup, ObservationType, PointDimension};

/// A typed value block: type, value, unit
type Block<'a> = (&'a str, &'a str, &'a str);

const EMPTY: Block<'static> = ("", "", "");

fn m5_line(point: &str, code: &str, loop_id: &str, blocks: [Block<'_>; 3]) -> String {
    let mut line = " ".repeat(118);
    place(&mut line, 0, "For M5|Adr     1|");
    place(&mut line, 17, "KD1");
    let address = format!("{:<8}{:<5}{:10}{:<4}", point, code, "", loop_id);
    place(&mut line, 21, &address);
    for (block, start) in blocks.iter().zip([49, 72, 95]) {
        let (kind, value, unit) = block;
        place(&mut line, start, kind);
        place(&mut line, start + 3, &format!("{:>14}", value));
        place(&mut line, start + 18, &format!("{:<4}", unit));
    }
    line
}

fn back(point: &str, loop_id: &str, reading: &str, distance: &str) -> String {
    m5_line(point, "", loop_id, [("Lr", reading, "m"), ("HD", distance, "m"), EMPTY])
}

fn fore(point: &str, loop_id: &str, reading: &str, distance: &str) -> String {
    m5_line(point, "", loop_id, [("Lv", reading, "m"), ("HD", distance, "m"), EMPTY])
}

fn height(point: &str, loop_id: &str, z: &str) -> String {
    m5_line(point, "", loop_id, [EMPTY, EMPTY, ("Z", z, "m")])
}

fn decode(lines: &[String], reserved: &[&str]) -> Vec<DraftGroup> {
    let (groups, failures) =
        decode_lines(SourceFormat::M5, "level.dat", &ImportConfig::new(), reserved, lines);
    assert_eq!(failures, 0);
    groups
}

#[test]
fn test_layout_of_generated_lines() {
    let line = back("A", "1", "1.50000", "20.000");
    assert_eq!(line.len(), 118);
    assert_eq!(&line[49..51], "Lr");
    assert_eq!(line[52..66].trim(), "1.50000");
    assert_eq!(line[67..71].trim(), "m");
    assert_eq!(&line[72..74], "HD");
    assert_eq!(line[21..48][23..27].trim(), "1");
}

#[test]
fn test_setup_closed_by_height_record() {
    let groups = decode(
        &[
            back("A", "1", "1.50000", "20.000"),
            fore("B", "1", "1.20000", "22.000"),
            height("B", "1", "100.30000"),
        ],
        &[],
    );

    let leveling = observations(&groups, ObservationType::Leveling);
    assert_eq!(leveling.len(), 1);
    assert_eq!(leveling[0].start_point, "A");
    assert_eq!(leveling[0].end_point, "B");
    assert!((leveling[0].value_apriori - 0.3).abs() < EPS);
    assert!((leveling[0].distance_apriori.unwrap() - 42.0).abs() < EPS);

    let heights = points(&groups, PointDimension::One);
    assert_eq!(heights.len(), 1);
    assert_eq!(heights[0].name, "B");
    assert!((heights[0].z.unwrap() - 100.3).abs() < EPS);
}

#[test]
fn test_loop_change_closes_group_under_old_loop() {
    let groups = decode(
        &[
            back("A", "1", "1.50000", "20.000"),
            fore("B", "1", "1.20000", "22.000"),
            height("B", "1", "100.30000"),
            back("B", "2", "1.40000", "15.000"),
            fore("", "2", "1.00000", "15.000"),
            height("", "2", "100.70000"),
        ],
        &[],
    );

    let sets = observation_groups(&groups, ObservationType::Leveling);
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0].name, "1 level");
    assert_eq!(sets[1].name, "2 level");

    let second = sets[1].observations().next().unwrap();
    assert_eq!(second.start_point, "B");
    assert_eq!(second.end_point, "W0000001");

    let names: Vec<_> = points(&groups, PointDimension::One)
        .iter()
        .map(|p| p.name.clone())
        .collect();
    assert_eq!(names, vec!["B", "W0000001"]);
}

#[test]
fn test_side_shot_refers_to_back_sight() {
    let side = m5_line(
        "S1",
        "",
        "1",
        [("Lz", "1.10000", "m"), ("HD", "8.000", "m"), ("Z", "100.40000", "m")],
    );
    let groups = decode(
        &[
            back("A", "1", "1.50000", "20.000"),
            side,
            fore("B", "1", "1.20000", "22.000"),
            height("B", "1", "100.30000"),
        ],
        &[],
    );

    let leveling = observations(&groups, ObservationType::Leveling);
    assert_eq!(leveling.len(), 2);
    assert_eq!(leveling[0].end_point, "S1");
    assert!((leveling[0].value_apriori - 0.4).abs() < EPS);
    assert!((leveling[0].distance_apriori.unwrap() - 28.0).abs() < EPS);
    assert_eq!(points(&groups, PointDimension::One).len(), 2);
}

#[test]
fn test_feet_are_converted() {
    let groups = decode(
        &[
            m5_line("A", "", "1", [("Lr", "5.00000", "ft"), EMPTY, EMPTY]),
            m5_line("B", "", "1", [("Lv", "4.00000", "ft"), EMPTY, EMPTY]),
            height("B", "1", "10.0"),
        ],
        &[],
    );

    let leveling = observations(&groups, ObservationType::Leveling);
    assert!((leveling[0].value_apriori - FOOT_TO_METER).abs() < EPS);
    assert_eq!(leveling[0].distance_apriori, None);
}

#[test]
fn test_skipped_records() {
    let mut flagged = back("A", "1", "1.50000", "20.000");
    flagged.push('E');
    let mut wrong_type = back("A", "1", "1.50000", "20.000");
    place(&mut wrong_type, 17, "TO ");
    let mut hashed = back("A", "1", "1.50000", "20.000");
    place(&mut hashed, 30, "#####");

    let groups = decode(
        &[
            flagged,
            wrong_type,
            hashed,
            "For M5|short".to_string(),
            fore("B", "1", "1.20000", "22.000"),
            height("B", "1", "100.30000"),
        ],
        &[],
    );

    assert!(observations(&groups, ObservationType::Leveling).is_empty());
}

#[test]
fn test_reserved_height_point_not_emitted() {
    let groups = decode(
        &[
            back("A", "1", "1.50000", "20.000"),
            fore("B", "1", "1.20000", "22.000"),
            height("B", "1", "100.30000"),
        ],
        &["B"],
    );

    assert!(points(&groups, PointDimension::One).is_empty());
    assert_eq!(observations(&groups, ObservationType::Leveling).len(), 1);
}

#[test]
fn test_unparsable_reading_is_reported() {
    let lines = [back("A", "1", "1.5x", "20.000")];
    let (groups, failures) =
        decode_lines(SourceFormat::M5, "level.dat", &ImportConfig::new(), &[], &lines);
    assert_eq!(failures, 1);
    assert!(groups.is_empty());
}
