//! Configuration for decoding and export.
//!
//! Holds the import dimension used by the GSI decoder, the per-type group
//! separation rules, the numeric locale and the Parquet export settings.

use crate::error::{ImportError, Result};
use crate::models::{DimensionType, ObservationType};
use polars::prelude::ParquetCompression;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Supported compression algorithms for parquet files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum CompressionAlgorithm {
    /// Snappy compression - good balance of speed and compression
    Snappy,
    /// ZSTD compression - better compression ratio, slower
    Zstd,
    /// LZ4 compression - fastest, lower compression ratio
    Lz4,
    /// No compression
    Uncompressed,
}

impl CompressionAlgorithm {
    /// Convert to polars ParquetCompression type
    pub fn to_polars_compression(&self) -> ParquetCompression {
        match self {
            CompressionAlgorithm::Snappy => ParquetCompression::Snappy,
            CompressionAlgorithm::Zstd => ParquetCompression::Zstd(None),
            CompressionAlgorithm::Lz4 => ParquetCompression::Lz4Raw,
            CompressionAlgorithm::Uncompressed => ParquetCompression::Uncompressed,
        }
    }
}

/// Parquet export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub compression: CompressionAlgorithm,
    /// Write a GNSS file even when no baselines were imported
    pub write_empty_gnss: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            compression: CompressionAlgorithm::Snappy,
            write_empty_gnss: false,
        }
    }
}

/// Which observation groups are closed when the instrument moves to a new
/// station
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSeparation {
    pub leveling: bool,
    pub direction: bool,
    pub horizontal_distance: bool,
    pub slope_distance: bool,
    pub zenith_angle: bool,
}

impl Default for GroupSeparation {
    fn default() -> Self {
        Self {
            leveling: false,
            direction: true,
            horizontal_distance: false,
            slope_distance: false,
            zenith_angle: false,
        }
    }
}

impl GroupSeparation {
    pub fn separates(&self, observation_type: ObservationType) -> bool {
        match observation_type {
            ObservationType::Leveling => self.leveling,
            ObservationType::Direction => self.direction,
            ObservationType::HorizontalDistance => self.horizontal_distance,
            ObservationType::SlopeDistance => self.slope_distance,
            ObservationType::ZenithAngle => self.zenith_angle,
            _ => false,
        }
    }

    /// Separate every terrestrial type per station
    pub fn per_station() -> Self {
        Self {
            leveling: true,
            direction: true,
            horizontal_distance: true,
            slope_distance: true,
            zenith_angle: true,
        }
    }
}

/// Main configuration for an import run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Network dimension GSI records are interpreted for
    pub dimension: DimensionType,

    /// Per-type group separation at station changes
    pub group_separation: GroupSeparation,

    /// Decimal separator of free-format numeric fields
    pub decimal_separator: char,

    /// Stop after this many decoded lines and commit nothing
    pub max_lines: Option<usize>,

    /// Parquet export settings
    pub export: ExportConfig,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            dimension: DimensionType::PlanAndHeight,
            group_separation: GroupSeparation::default(),
            decimal_separator: '.',
            max_lines: None,
            export: ExportConfig::default(),
        }
    }
}

impl ImportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimension(mut self, dimension: DimensionType) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_group_separation(mut self, separation: GroupSeparation) -> Self {
        self.group_separation = separation;
        self
    }

    pub fn with_decimal_separator(mut self, separator: char) -> Self {
        self.decimal_separator = separator;
        self
    }

    /// Bounded preview: decode at most `lines` lines
    pub fn with_max_lines(mut self, lines: usize) -> Self {
        self.max_lines = Some(lines);
        self
    }

    pub fn with_compression(mut self, compression: CompressionAlgorithm) -> Self {
        self.export.compression = compression;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let separator = self.decimal_separator;
        if separator.is_ascii_digit() || separator.is_whitespace() || matches!(separator, '+' | '-')
        {
            return Err(ImportError::Configuration {
                message: format!("Invalid decimal separator '{}'", separator),
            });
        }
        if self.max_lines == Some(0) {
            return Err(ImportError::Configuration {
                message: "max_lines must be greater than zero".to_string(),
            });
        }

        debug!(
            "Configuration validated: dimension={:?}, separator='{}', max_lines={:?}",
            self.dimension, self.decimal_separator, self.max_lines
        );
        Ok(())
    }
}
