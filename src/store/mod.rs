//! Persistence interface for imported groups.
//!
//! Decoders never talk to storage directly: finished groups are handed to an
//! [`ObservationStore`] by the assembler once a file has been read to the end.
//!
//! - [`MemoryStore`]: in-process store used by the command line tool and tests
//! - [`ParquetExporter`]: writes the contents of a `MemoryStore` to Parquet

pub mod memory;
pub mod parquet;

pub use memory::{MemoryStore, StoredGroup};
pub use parquet::{ExportSummary, ParquetExporter};

use crate::error::Result;
use crate::models::{
    GnssObservationDraft, GroupId, GroupKind, ObservationDraft, ObservationId, PointDraft,
    PointId,
};
use std::collections::HashSet;

/// Storage collaborator receiving imported groups and rows
pub trait ObservationStore {
    /// Point names already present in the destination
    fn reserved_point_names(&self) -> Result<HashSet<String>>;

    fn create_group(&mut self, kind: GroupKind, name: &str) -> Result<GroupId>;

    fn save_point(&mut self, group: GroupId, point: &PointDraft) -> Result<PointId>;

    fn save_terrestrial_observation(
        &mut self,
        group: GroupId,
        observation: &ObservationDraft,
    ) -> Result<ObservationId>;

    fn save_gnss_observation(
        &mut self,
        group: GroupId,
        observation: &GnssObservationDraft,
    ) -> Result<ObservationId>;
}
