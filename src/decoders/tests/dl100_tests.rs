//! DL-100 decoder tests

use super::{EPS, decode_lines, observation_groups, observations, points};
use crate::config::ImportConfig;
use crate::decoders::SourceFormat;
use crate::models::{DraftGroup, ObservationType, PointDimension};

fn decode(lines: &[&str], reserved: &[&str]) -> (Vec<DraftGroup>, usize) {
    let lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    decode_lines(SourceFormat::Dl100, "loop.l", &ImportConfig::new(), reserved, &lines)
}

const LOOP: &[&str] = &[
    "b,28,L1,A,+1000000,2103141530,,,,V,",
    "g,28,+150000,+20000,+1000000,3,0,A,1,1314,D,",
    "i,28,+120000,+22000,+1030000,3,0,B,1,1315,D,",
    "z,28,L1,,,,,",
];

#[test]
fn test_loop_yields_scaled_height_difference() {
    let (groups, failures) = decode(LOOP, &[]);
    assert_eq!(failures, 0);

    let leveling = observations(&groups, ObservationType::Leveling);
    assert_eq!(leveling.len(), 1);
    assert_eq!(leveling[0].start_point, "A");
    assert_eq!(leveling[0].end_point, "B");
    // unit 8: staff readings in 1e-5 m, distances in mm
    assert!((leveling[0].value_apriori - (1.5 - 1.2)).abs() < EPS);
    assert!((leveling[0].distance_apriori.unwrap() - 42.0).abs() < EPS);

    let sets = observation_groups(&groups, ObservationType::Leveling);
    assert_eq!(sets[0].name, "L1 (2021-03-14 15:30) loop");
}

#[test]
fn test_start_height_and_staff_points() {
    let (groups, _) = decode(LOOP, &[]);

    let heights = points(&groups, PointDimension::One);
    assert_eq!(heights.len(), 2);
    assert_eq!(heights[0].name, "A");
    assert!((heights[0].z.unwrap() - 10.0).abs() < EPS);
    assert_eq!(heights[1].name, "B");
    assert!((heights[1].z.unwrap() - 10.3).abs() < EPS);
}

#[test]
fn test_reserved_start_point_is_not_emitted() {
    let (groups, _) = decode(LOOP, &["A"]);

    let names: Vec<_> = points(&groups, PointDimension::One)
        .iter()
        .map(|p| p.name.clone())
        .collect();
    assert_eq!(names, vec!["B"]);
}

#[test]
fn test_double_run_and_side_shot() {
    let (groups, failures) = decode(
        &[
            "b,27,L2,,,,,,,V,",
            "g,27,+15000,+2000,+0,3,0,A,1,1314,D,",
            "k,27,+11000,+800,+0,3,0,S,1,1314,D,",
            "i,27,+12000,+2200,+0,3,0,B,1,1315,D,",
            "j,27,+11998,+2200,+0,3,0,B,1,1315,D,",
            "h,27,+14999,+2000,+0,3,0,A,1,1316,D,",
            "g,27,+13000,+1500,+0,3,0,B,1,1320,D,",
            "i,27,+10000,+1500,+0,3,0,C,1,1321,D,",
        ],
        &[],
    );
    assert_eq!(failures, 0);

    let leveling = observations(&groups, ObservationType::Leveling);
    assert_eq!(leveling.len(), 3);

    let side = leveling[0];
    assert_eq!((side.start_point.as_str(), side.end_point.as_str()), ("A", "S"));
    assert!((side.value_apriori - 0.4).abs() < EPS);

    let double = leveling[1];
    assert_eq!((double.start_point.as_str(), double.end_point.as_str()), ("A", "B"));
    let expected = 0.5 * ((1.5 - 1.2) + (1.4999 - 1.1998));
    assert!((double.value_apriori - expected).abs() < EPS);

    assert_eq!(leveling[2].end_point, "C");
    assert_eq!(
        observation_groups(&groups, ObservationType::Leveling)[0].name,
        "L2 loop"
    );
}

#[test]
fn test_measurements_before_loop_start_are_ignored() {
    let (groups, failures) = decode(
        &[
            "g,28,+150000,+20000,+1000000,3,0,A,1,1314,D,",
            "i,28,+120000,+22000,+1030000,3,0,B,1,1315,D,",
        ],
        &[],
    );
    assert_eq!(failures, 0);
    assert!(groups.is_empty());
}

#[test]
fn test_unknown_unit_skips_record() {
    let (groups, failures) = decode(
        &[
            "b,20,L3,,,,,,,V,",
            "g,20,+150000,+20000,+0,3,0,A,1,1314,D,",
        ],
        &[],
    );
    assert_eq!(failures, 1);
    assert!(observations(&groups, ObservationType::Leveling).is_empty());
}

#[test]
fn test_invalid_date_is_dropped_from_name() {
    let (groups, failures) = decode(
        &[
            "b,28,L4,,,99999999,,,,V,",
            "g,28,+150000,+20000,,3,0,A,1,1314,D,",
            "i,28,+120000,+22000,,3,0,B,1,1315,D,",
        ],
        &[],
    );
    assert_eq!(failures, 0);
    assert_eq!(
        observation_groups(&groups, ObservationType::Leveling)[0].name,
        "L4 loop"
    );
}
