//! Parquet export of imported groups.
//!
//! Flattens a [`MemoryStore`] into one frame per record family and writes
//! each to its own file in the output directory.

use super::MemoryStore;
use crate::config::ExportConfig;
use crate::error::{ImportError, Result};
use crate::models::GroupKind;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const POINTS_FILE: &str = "points.parquet";
pub const OBSERVATIONS_FILE: &str = "observations.parquet";
pub const GNSS_FILE: &str = "gnss.parquet";

/// Files and row counts written by one export
#[derive(Debug, Default)]
pub struct ExportSummary {
    pub files: Vec<PathBuf>,
    pub points: usize,
    pub observations: usize,
    pub gnss_observations: usize,
}

#[derive(Debug)]
pub struct ParquetExporter {
    output_dir: PathBuf,
    config: ExportConfig,
}

impl ParquetExporter {
    pub fn new(output_dir: impl Into<PathBuf>, config: ExportConfig) -> Self {
        Self {
            output_dir: output_dir.into(),
            config,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write points, terrestrial observations and GNSS baselines
    pub fn export(&self, store: &MemoryStore) -> Result<ExportSummary> {
        fs::create_dir_all(&self.output_dir)?;
        let mut summary = ExportSummary::default();

        let mut points = points_frame(store)?;
        summary.points = points.height();
        summary.files.push(self.write_frame(&mut points, POINTS_FILE)?);

        let mut observations = observations_frame(store)?;
        summary.observations = observations.height();
        summary
            .files
            .push(self.write_frame(&mut observations, OBSERVATIONS_FILE)?);

        let mut gnss = gnss_frame(store)?;
        summary.gnss_observations = gnss.height();
        if summary.gnss_observations > 0 || self.config.write_empty_gnss {
            summary.files.push(self.write_frame(&mut gnss, GNSS_FILE)?);
        }

        info!(
            "Exported {} points, {} observations, {} GNSS baselines to {}",
            summary.points,
            summary.observations,
            summary.gnss_observations,
            self.output_dir.display()
        );
        Ok(summary)
    }

    fn write_frame(&self, df: &mut DataFrame, file_name: &str) -> Result<PathBuf> {
        let path = self.output_dir.join(file_name);
        let file = File::create(&path)?;
        ParquetWriter::new(file)
            .with_compression(self.config.compression.to_polars_compression())
            .finish(df)
            .map_err(|e| {
                ImportError::persistence(format!("Failed to write {}: {}", path.display(), e))
            })?;
        debug!("Wrote {} rows to {}", df.height(), path.display());
        Ok(path)
    }
}

fn points_frame(store: &MemoryStore) -> Result<DataFrame> {
    let mut group_id = Vec::new();
    let mut group_name = Vec::new();
    let mut dimension = Vec::new();
    let mut name = Vec::new();
    let mut code = Vec::new();
    let (mut x, mut y, mut z) = (Vec::new(), Vec::new(), Vec::new());

    for group in store.groups() {
        let GroupKind::Points(dim) = group.kind else {
            continue;
        };
        for (_, point) in &group.points {
            group_id.push(group.id);
            group_name.push(group.name.clone());
            dimension.push(dim.as_u8() as u32);
            name.push(point.name.clone());
            code.push(point.code.clone());
            x.push(point.x);
            y.push(point.y);
            z.push(point.z);
        }
    }

    Ok(df!(
        "group_id" => group_id,
        "group_name" => group_name,
        "dimension" => dimension,
        "name" => name,
        "code" => code,
        "x" => x,
        "y" => y,
        "z" => z,
    )?)
}

fn observations_frame(store: &MemoryStore) -> Result<DataFrame> {
    let mut group_id = Vec::new();
    let mut group_name = Vec::new();
    let mut kind = Vec::new();
    let mut start = Vec::new();
    let mut end = Vec::new();
    let mut instrument_height = Vec::new();
    let mut reflector_height = Vec::new();
    let mut value = Vec::new();
    let mut distance = Vec::new();
    let mut enabled = Vec::new();

    for group in store.groups() {
        for (_, observation) in &group.observations {
            group_id.push(group.id);
            group_name.push(group.name.clone());
            kind.push(group.kind.to_string());
            start.push(observation.start_point.clone());
            end.push(observation.end_point.clone());
            instrument_height.push(observation.instrument_height);
            reflector_height.push(observation.reflector_height);
            value.push(observation.value_apriori);
            distance.push(observation.distance_apriori);
            enabled.push(observation.enabled);
        }
    }

    Ok(df!(
        "group_id" => group_id,
        "group_name" => group_name,
        "kind" => kind,
        "start_point" => start,
        "end_point" => end,
        "instrument_height" => instrument_height,
        "reflector_height" => reflector_height,
        "value_apriori" => value,
        "distance_apriori" => distance,
        "enabled" => enabled,
    )?)
}

fn gnss_frame(store: &MemoryStore) -> Result<DataFrame> {
    let mut group_id = Vec::new();
    let mut start = Vec::new();
    let mut end = Vec::new();
    let (mut x, mut y, mut z) = (Vec::new(), Vec::new(), Vec::new());

    for group in store.groups() {
        for (_, baseline) in &group.gnss_observations {
            group_id.push(group.id);
            start.push(baseline.start_point.clone());
            end.push(baseline.end_point.clone());
            x.push(baseline.x);
            y.push(baseline.y);
            z.push(baseline.z);
        }
    }

    Ok(df!(
        "group_id" => group_id,
        "start_point" => start,
        "end_point" => end,
        "x" => x,
        "y" => y,
        "z" => z,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ObservationDraft, ObservationType, PointDimension, PointDraft};
    use crate::store::ObservationStore;
    use tempfile::TempDir;

    fn sample_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        let points = store
            .create_group(GroupKind::Points(PointDimension::One), "line pts")
            .unwrap();
        store
            .save_point(points, &PointDraft::new("BM1", "").with_height(101.25))
            .unwrap();
        let leveling = store
            .create_group(GroupKind::Observations(ObservationType::Leveling), "line")
            .unwrap();
        store
            .save_terrestrial_observation(
                leveling,
                &ObservationDraft::new("BM1", "W0000001", 0.0, 0.0, 0.3).with_distance(Some(40.0)),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_export_writes_points_and_observations() {
        let temp_dir = TempDir::new().unwrap();
        let exporter = ParquetExporter::new(temp_dir.path().join("out"), ExportConfig::default());

        let summary = exporter.export(&sample_store()).unwrap();

        assert_eq!(summary.points, 1);
        assert_eq!(summary.observations, 1);
        assert_eq!(summary.gnss_observations, 0);
        assert_eq!(summary.files.len(), 2);
        assert!(temp_dir.path().join("out").join(POINTS_FILE).exists());
        assert!(!temp_dir.path().join("out").join(GNSS_FILE).exists());
    }

    #[test]
    fn test_exported_observations_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let exporter = ParquetExporter::new(temp_dir.path(), ExportConfig::default());
        exporter.export(&sample_store()).unwrap();

        let file = File::open(temp_dir.path().join(OBSERVATIONS_FILE)).unwrap();
        let df = ParquetReader::new(file).finish().unwrap();

        assert_eq!(df.height(), 1);
        let value = df
            .column("value_apriori")
            .unwrap()
            .get(0)
            .unwrap()
            .try_extract::<f64>()
            .unwrap();
        assert_eq!(value, 0.3);
    }
}
