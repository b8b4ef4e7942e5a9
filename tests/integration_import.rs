//! End-to-end imports through the public API
//!
//! Each test writes a small instrument file into a temporary directory,
//! imports it into a `MemoryStore` and checks the committed groups.

use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use survey_import::store::StoredGroup;
use survey_import::{
    DimensionType, GroupKind, ImportConfig, ImportError, InterruptFlag, MemoryStore,
    ObservationType, ParquetExporter, PointDimension, ReadOutcome, SourceFormat, SurveyImporter,
};
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    let mut content = lines.join("\r\n");
    content.push_str("\r\n");
    fs::write(&path, content).unwrap();
    path
}

fn strings(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|l| l.to_string()).collect()
}

fn group<'a>(store: &'a MemoryStore, kind: GroupKind) -> &'a StoredGroup {
    store
        .groups()
        .iter()
        .find(|g| g.kind == kind)
        .unwrap_or_else(|| panic!("no {} group", kind))
}

/// Fixed-column line builder: `(column, text)` pairs on a blank line
fn columns(width: usize, fields: &[(usize, &str)]) -> String {
    let mut line = " ".repeat(width);
    for (column, text) in fields {
        let end = column + text.len();
        if line.len() < end {
            line.push_str(&" ".repeat(end - line.len()));
        }
        line.replace_range(*column..end, text);
    }
    line
}

#[test]
fn test_gsi_total_station_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_file(
        temp_dir.path(),
        "traverse.gsi",
        &strings(&[
            "# station 1",
            "11....+000000S1 84..10+00001000 85..10+00002000 86..10+00000100",
            "11....+000000P1 21.022+05000000 32...0+00012345",
            "11....+000000P2 21.022+15000000 32...0+00023456",
            "11....+000000S2 84..10+00003000 85..10+00004000 86..10+00000200",
            "11....+000000P1 21.022+25000000 32...0+00011111",
        ]),
    );

    let importer =
        SurveyImporter::new(ImportConfig::new().with_dimension(DimensionType::Plan)).unwrap();
    let mut store = MemoryStore::new();
    let report = importer.import_file(&path, None, &mut store, None).unwrap();

    assert!(report.is_committed());
    assert_eq!(report.format, SourceFormat::Gsi);

    let names: Vec<_> = report.groups.iter().map(|g| g.name.as_str()).collect();
    assert!(names.contains(&"traverse (S1)"));
    assert!(names.contains(&"traverse (S2)"));

    let distances = group(
        &store,
        GroupKind::Observations(ObservationType::HorizontalDistance),
    );
    assert_eq!(distances.observations.len(), 3);
    assert!(
        store
            .groups()
            .iter()
            .all(|g| g.kind != GroupKind::Observations(ObservationType::Leveling))
    );

    let stations = group(&store, GroupKind::Points(PointDimension::Two));
    let station_names: Vec<_> = stations.points.iter().map(|(_, p)| p.name.as_str()).collect();
    assert_eq!(station_names, vec!["S1", "S2"]);
}

#[test]
fn test_dl100_loop_and_parquet_export() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_file(
        temp_dir.path(),
        "loop.l",
        &strings(&[
            "b,28,L1,A,+1000000,2103141530,,,,V,",
            "g,28,+150000,+20000,+1000000,3,0,A,1,1314,D,",
            "i,28,+120000,+22000,+1030000,3,0,B,1,1315,D,",
            "g,28,+140000,+15000,+1030000,3,0,B,1,1320,D,",
            "i,28,+100000,+15000,+1070000,3,0,C,1,1321,D,",
            "z,28,L1,,,,,",
        ]),
    );

    let importer = SurveyImporter::new(ImportConfig::new()).unwrap();
    let mut store = MemoryStore::new();
    let report = importer.import_file(&path, None, &mut store, None).unwrap();

    let leveling = group(&store, GroupKind::Observations(ObservationType::Leveling));
    assert_eq!(leveling.name, "L1 (2021-03-14 15:30) loop");
    assert_eq!(leveling.observations.len(), 2);
    assert_eq!(report.groups.len(), 2);

    let output = temp_dir.path().join("parquet");
    let summary = ParquetExporter::new(&output, importer.config().export.clone())
        .export(&store)
        .unwrap();
    assert_eq!(summary.points, 3);
    assert_eq!(summary.observations, 2);
    assert_eq!(summary.files.len(), 2);

    let observations = ParquetReader::new(File::open(output.join("observations.parquet")).unwrap())
        .finish()
        .unwrap();
    assert_eq!(observations.height(), 2);
}

#[test]
fn test_m5_file_with_loop_change() {
    let m5 = |point: &str, loop_id: &str, kind: &str, value: &str, distance: Option<&str>| {
        let address = format!("{:<8}{:<5}{:10}{:<4}", point, "", "", loop_id);
        let value = format!("{:>14}", value);
        let mut fields = vec![
            (0, "For M5|Adr     1|"),
            (17, "KD1"),
            (21, address.as_str()),
        ];
        let distance = distance.map(|d| format!("{:>14}", d));
        let (type_column, value_column, unit_column) = if kind == "Z" {
            (95, 98, 113)
        } else {
            (49, 52, 67)
        };
        fields.push((type_column, kind));
        fields.push((value_column, value.as_str()));
        fields.push((unit_column, "m"));
        if let Some(distance) = &distance {
            fields.extend([(72, "HD"), (75, distance.as_str()), (90, "m")]);
        }
        columns(118, &fields)
    };

    let temp_dir = TempDir::new().unwrap();
    let path = write_file(
        temp_dir.path(),
        "level.dat",
        &[
            m5("A", "7", "Lr", "1.50000", Some("20.000")),
            m5("B", "7", "Lv", "1.20000", Some("22.000")),
            m5("B", "7", "Z", "100.30000", None),
            m5("B", "8", "Lr", "1.40000", Some("15.000")),
            m5("C", "8", "Lv", "1.00000", Some("15.000")),
            m5("C", "8", "Z", "100.70000", None),
        ],
    );

    let importer = SurveyImporter::new(ImportConfig::new()).unwrap();
    let mut store = MemoryStore::new();
    let report = importer.import_file(&path, None, &mut store, None).unwrap();

    assert_eq!(report.format, SourceFormat::M5);
    assert_eq!(report.outcome.stats().lines_skipped, 0);
    let names: Vec<_> = report.groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["7 level", "8 level", "level"]);

    let heights = group(&store, GroupKind::Points(PointDimension::One));
    let z: Vec<_> = heights.points.iter().map(|(_, p)| p.z).collect();
    assert_eq!(z, vec![Some(100.3), Some(100.7)]);
}

#[test]
fn test_zfile_with_project_and_comments() {
    let z = |codes: &str, key: &str, point: &str, values: [&str; 3]| {
        let values: Vec<String> = values.iter().map(|v| format!("{:>12}", v)).collect();
        columns(
            71,
            &[
                (0, "    1"),
                (5, codes),
                (8, key),
                (16, point),
                (32, values[0].as_str()),
                (44, values[1].as_str()),
                (56, values[2].as_str()),
            ],
        )
    };

    let temp_dir = TempDir::new().unwrap();
    let path = write_file(
        temp_dir.path(),
        "net.z",
        &[
            "! exported by field software".to_string(),
            z("04", "", "NORTH", ["", "", ""]),
            z("10", "1001600", "S1", ["", "", ""]),
            z("20", "1001500", "P1", ["100.000", "50.0000", "99.0000"]),
            z("20", "1000000", "P2", ["80.000", "150.0000", "101.0000"]),
        ],
    );

    let importer = SurveyImporter::new(ImportConfig::new()).unwrap();
    let mut store = MemoryStore::new();
    let report = importer.import_file(&path, None, &mut store, None).unwrap();

    assert_eq!(report.outcome.stats().lines_ignored, 1);
    let slope = group(&store, GroupKind::Observations(ObservationType::SlopeDistance));
    assert_eq!(slope.name, "net NORTH");
    assert_eq!(slope.observations.len(), 2);
    assert_eq!(
        group(&store, GroupKind::Observations(ObservationType::Direction)).name,
        "net (S1)"
    );

    let points = group(&store, GroupKind::Points(PointDimension::Three));
    assert_eq!(points.points.len(), 3);
}

#[test]
fn test_beo_file_with_comment_and_decimal_comma() {
    let beo = |key: &str, point: &str, values: [&str; 3], height: &str| {
        let distance = format!("{:>16}", values[0]);
        let direction = format!("{:>15}", values[1]);
        let angle = format!("{:>15}", values[2]);
        let tail = format!("{:<10}{:>10}", height, "0");
        columns(
            99,
            &[
                (0, key),
                (15, point),
                (33, distance.as_str()),
                (49, direction.as_str()),
                (64, angle.as_str()),
                (79, tail.as_str()),
            ],
        )
    };

    let temp_dir = TempDir::new().unwrap();
    let path = write_file(
        temp_dir.path(),
        "obs.beo",
        &[
            "# Neptan export".to_string(),
            beo("10.", "S1", ["", "", ""], "1,6"),
            beo("20.", "P1", ["100,000", "50,0000", "99,0000"], "1,5"),
            beo("70.", "P1", ["100,000", "", "0,2500"], "1,5"),
        ],
    );

    let importer =
        SurveyImporter::new(ImportConfig::new().with_decimal_separator(',')).unwrap();
    let mut store = MemoryStore::new();
    let report = importer.import_file(&path, None, &mut store, None).unwrap();
    assert_eq!(report.outcome.stats().lines_ignored, 1);
    assert_eq!(report.outcome.stats().lines_skipped, 0);

    let zenith = group(&store, GroupKind::Observations(ObservationType::ZenithAngle));
    let (_, observation) = &zenith.observations[0];
    assert!((observation.instrument_height - 1.6).abs() < 1e-9);
    assert!((observation.reflector_height - 1.5).abs() < 1e-9);

    let leveling = group(&store, GroupKind::Observations(ObservationType::Leveling));
    assert!((leveling.observations[0].1.value_apriori - 0.25).abs() < 1e-9);
}

#[test]
fn test_second_import_respects_points_of_first() {
    let temp_dir = TempDir::new().unwrap();
    let lines = strings(&[
        "b,28,L1,A,+1000000,2103141530,,,,V,",
        "g,28,+150000,+20000,+1000000,3,0,A,1,1314,D,",
        "i,28,+120000,+22000,+1030000,3,0,B,1,1315,D,",
    ]);
    let first = write_file(temp_dir.path(), "day1.l", &lines);
    let second = write_file(temp_dir.path(), "day2.l", &lines);

    let importer = SurveyImporter::new(ImportConfig::new()).unwrap();
    let mut store = MemoryStore::new();
    importer.import_file(&first, None, &mut store, None).unwrap();
    let report = importer.import_file(&second, None, &mut store, None).unwrap();

    assert!(
        report
            .groups
            .iter()
            .all(|g| !matches!(g.kind, GroupKind::Points(_)))
    );
}

#[test]
fn test_missing_file_and_unknown_format() {
    let temp_dir = TempDir::new().unwrap();
    let importer = SurveyImporter::new(ImportConfig::new()).unwrap();
    let mut store = MemoryStore::new();

    let missing = temp_dir.path().join("missing.gsi");
    assert!(matches!(
        importer.import_file(&missing, None, &mut store, None),
        Err(ImportError::FileNotFound { .. })
    ));

    let unknown = write_file(temp_dir.path(), "notes.txt", &strings(&["hello"]));
    assert!(matches!(
        importer.import_file(&unknown, None, &mut store, None),
        Err(ImportError::UnknownFormat { .. })
    ));
}

#[tokio::test]
async fn test_interrupt_from_another_task() {
    let temp_dir = TempDir::new().unwrap();
    let lines: Vec<String> = (0..2000)
        .map(|i| format!("11....+{:08} 32...0+00010000", i + 1))
        .collect();
    let path = write_file(temp_dir.path(), "long.gsi", &lines);

    let interrupt = InterruptFlag::new();
    interrupt.request();
    let flag = interrupt.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        let importer = SurveyImporter::new(ImportConfig::new()).unwrap();
        let mut store = MemoryStore::new();
        let report = importer
            .import_file(&path, None, &mut store, Some(flag))
            .unwrap();
        (report.outcome, store.groups().len())
    })
    .await
    .unwrap();

    assert!(matches!(outcome.0, ReadOutcome::Interrupted(_)));
    assert_eq!(outcome.1, 0);
    assert!(interrupt.is_requested());
}
