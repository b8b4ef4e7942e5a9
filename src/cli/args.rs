//! Command-line argument definitions for the survey importer
//!
//! This module defines the CLI interface using the clap derive API and maps
//! it onto an [`ImportConfig`].

use crate::config::{CompressionAlgorithm, ImportConfig};
use crate::decoders::SourceFormat;
use crate::error::{ImportError, Result};
use crate::models::DimensionType;
use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for the survey file importer
///
/// Decodes raw instrument files into groups of points and observations and
/// optionally exports them to Parquet.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "survey-import",
    version,
    about = "Import raw surveying instrument files (GSI, M5, DL-100, Z-file, BEO)",
    long_about = "Reads field books and data logger dumps of total stations and digital levels, \
                  groups their observations per station, loop or leveling line, and writes the \
                  result to Parquet. Lines that cannot be decoded are skipped and reported."
)]
pub struct Args {
    /// Files, directories or glob patterns to import
    ///
    /// Directories are walked recursively; only files with a known instrument
    /// extension are picked up.
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Source format; detected from the file extension when omitted
    #[arg(short = 'f', long = "format", value_enum)]
    pub format: Option<SourceFormat>,

    /// Network dimension GSI records are interpreted for
    #[arg(long = "dimension", value_enum, default_value = "plan-and-height")]
    pub dimension: DimensionType,

    /// Output directory for Parquet files
    ///
    /// Will be created if it doesn't exist. Nothing is written when omitted.
    #[arg(
        short = 'o',
        long = "output",
        value_name = "DIR",
        help = "Output directory for Parquet files"
    )]
    pub output_path: Option<PathBuf>,

    /// Parquet compression algorithm
    #[arg(long = "compression", value_enum, default_value = "snappy")]
    pub compression: CompressionAlgorithm,

    /// Decode at most N lines per file and commit nothing
    #[arg(long = "preview", value_name = "N")]
    pub preview: Option<usize>,

    /// Decode and report groups without storing or exporting them
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// File with point names that already exist, one per line
    #[arg(long = "reserved", value_name = "FILE")]
    pub reserved_points: Option<PathBuf>,

    /// Free-format numbers use a decimal comma
    #[arg(long = "decimal-comma")]
    pub decimal_comma: bool,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Validate the arguments for consistency
    pub fn validate(&self) -> Result<()> {
        if self.preview == Some(0) {
            return Err(ImportError::Configuration {
                message: "Preview line count must be greater than 0".to_string(),
            });
        }

        if let Some(reserved) = &self.reserved_points {
            if !reserved.is_file() {
                return Err(ImportError::Configuration {
                    message: format!("Reserved names file does not exist: {}", reserved.display()),
                });
            }
        }

        if let Some(output) = &self.output_path {
            if output.is_file() {
                return Err(ImportError::Configuration {
                    message: format!("Output path is a file: {}", output.display()),
                });
            }
        }

        Ok(())
    }

    /// Import configuration described by the arguments
    pub fn to_import_config(&self) -> ImportConfig {
        let mut config = ImportConfig::new()
            .with_dimension(self.dimension)
            .with_compression(self.compression);
        if self.decimal_comma {
            config = config.with_decimal_separator(',');
        }
        if let Some(lines) = self.preview {
            config = config.with_max_lines(lines);
        }
        config
    }

    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Check if we should show progress bars (not in quiet mode)
    pub fn show_progress(&self) -> bool {
        !self.quiet
    }

    /// Whether groups are committed to the store
    pub fn commits(&self) -> bool {
        !self.dry_run && self.preview.is_none()
    }
}
