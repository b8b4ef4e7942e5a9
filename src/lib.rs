//! Survey Import Library
//!
//! Decoders for raw land-surveying instrument files and the machinery that
//! turns their records into named groups of points and observations.
//!
//! This library provides tools for:
//! - Reading GSI8/GSI16 (Leica), M5 (Zeiss/Trimble), DL-100 (Topcon),
//!   Z-file (Caplan) and BEO (Neptan) files line by line under a shared lock
//! - Decoding unit-coded values and accumulating leveling setups
//! - Grouping observations per station, loop or line and deduplicating points
//! - Committing groups to an [`ObservationStore`] and exporting them to Parquet

pub mod assembler;
pub mod config;
pub mod constants;
pub mod decoders;
pub mod error;
pub mod importer;
pub mod leveling;
pub mod models;
pub mod reader;
pub mod store;
pub mod units;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
    pub mod input;
}

// Re-export commonly used types
pub use config::{ImportConfig, GroupSeparation};
pub use decoders::SourceFormat;
pub use error::{ImportError, Result};
pub use importer::{ImportReport, SurveyImporter};
pub use models::{DimensionType, GroupKind, ImportedGroup, ObservationType, PointDimension};
pub use reader::{InterruptFlag, ReadOutcome, ReadStats};
pub use store::{MemoryStore, ObservationStore, ParquetExporter};
