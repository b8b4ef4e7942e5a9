//! Import facade: one file in, committed groups out.
//!
//! [`SurveyImporter`] wires the record source, the format decoder and the
//! store together. Groups reach the store only when the file was read to the
//! end; a stopped or interrupted read discards the decoder state.

use crate::assembler::commit_groups;
use crate::config::ImportConfig;
use crate::decoders::{DecoderContext, SourceFormat, create_decoder};
use crate::error::{ImportError, Result};
use crate::models::{DraftGroup, ImportedGroup};
use crate::reader::{InterruptFlag, LineReader, ReadOutcome};
use crate::store::ObservationStore;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of importing one file
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub source: PathBuf,
    pub format: SourceFormat,
    pub outcome: ReadOutcome,
    /// Committed groups in commit order; empty unless the read completed
    pub groups: Vec<ImportedGroup>,
}

impl ImportReport {
    pub fn is_committed(&self) -> bool {
        self.outcome.is_completed()
    }
}

/// Decoded groups of a dry run
#[derive(Debug, Clone)]
pub struct DecodeReport {
    pub source: PathBuf,
    pub format: SourceFormat,
    pub outcome: ReadOutcome,
    /// Groups as they would be committed; empty unless the read completed
    pub groups: Vec<DraftGroup>,
}

#[derive(Debug, Clone, Default)]
pub struct SurveyImporter {
    config: ImportConfig,
}

impl SurveyImporter {
    pub fn new(config: ImportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Format given by the caller, else detected from the extension
    pub fn resolve_format(path: &Path, format: Option<SourceFormat>) -> Result<SourceFormat> {
        format
            .or_else(|| SourceFormat::from_path(path))
            .ok_or_else(|| ImportError::UnknownFormat {
                path: path.to_path_buf(),
            })
    }

    /// Decode `path` and commit its groups to `store`
    pub fn import_file<S>(
        &self,
        path: &Path,
        format: Option<SourceFormat>,
        store: &mut S,
        interrupt: Option<InterruptFlag>,
    ) -> Result<ImportReport>
    where
        S: ObservationStore + ?Sized,
    {
        let reserved = store.reserved_point_names()?;
        let decoded = self.decode(path, format, reserved, interrupt)?;

        let groups = if decoded.outcome.is_completed() {
            commit_groups(decoded.groups, store)?
        } else {
            warn!(
                "{}: read {}, nothing committed",
                path.display(),
                decoded.outcome.label()
            );
            Vec::new()
        };

        info!(
            "Imported {} as {}: {} groups",
            path.display(),
            decoded.format,
            groups.len()
        );
        Ok(ImportReport {
            source: decoded.source,
            format: decoded.format,
            outcome: decoded.outcome,
            groups,
        })
    }

    /// Decode `path` without persisting anything
    pub fn decode_file(
        &self,
        path: &Path,
        format: Option<SourceFormat>,
        reserved_points: HashSet<String>,
        interrupt: Option<InterruptFlag>,
    ) -> Result<DecodeReport> {
        self.decode(path, format, reserved_points, interrupt)
    }

    fn decode(
        &self,
        path: &Path,
        format: Option<SourceFormat>,
        reserved_points: HashSet<String>,
        interrupt: Option<InterruptFlag>,
    ) -> Result<DecodeReport> {
        let format = Self::resolve_format(path, format)?;
        info!("Importing {} as {}", path.display(), format);

        let source_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let context =
            DecoderContext::new(source_name, &self.config).with_reserved_points(reserved_points);
        let mut decoder = create_decoder(format, context);

        let mut reader = LineReader::new(path)
            .with_comment_prefix(format.comment_prefix())
            .with_max_lines(self.config.max_lines);
        if let Some(interrupt) = interrupt {
            reader = reader.with_interrupt(interrupt);
        }

        let outcome = reader.read(decoder.as_mut())?;
        let groups = if outcome.is_completed() {
            decoder.finish()
        } else {
            debug!("Discarding decoder state of {}", path.display());
            Vec::new()
        };

        Ok(DecodeReport {
            source: path.to_path_buf(),
            format,
            outcome,
            groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GroupKind, ObservationType, PointDimension};
    use crate::store::MemoryStore;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn fixture(suffix: &str, lines: &[&str]) -> NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    const DL100_LOOP: &[&str] = &[
        "# exported field book",
        "b,28,L1,A,+1000000,2103141530,,,,V,",
        "g,28,+150000,+20000,+1000000,3,0,A,1,1314,D,",
        "i,28,+120000,+22000,+1030000,3,0,B,1,1315,D,",
        "z,28,L1,,,,,",
    ];

    #[test]
    fn test_import_commits_groups_in_order() {
        let file = fixture(".l", DL100_LOOP);
        let importer = SurveyImporter::new(ImportConfig::new()).unwrap();
        let mut store = MemoryStore::new();

        let report = importer.import_file(file.path(), None, &mut store, None).unwrap();

        assert!(report.is_committed());
        assert_eq!(report.format, SourceFormat::Dl100);
        let kinds: Vec<_> = report.groups.iter().map(|g| g.kind).collect();
        assert_eq!(
            kinds,
            vec![
                GroupKind::Observations(ObservationType::Leveling),
                GroupKind::Points(PointDimension::One),
            ]
        );
        assert_eq!(store.groups().len(), 2);
        assert_eq!(report.outcome.stats().lines_ignored, 1);
    }

    #[test]
    fn test_reserved_names_come_from_store() {
        let file = fixture(".l", DL100_LOOP);
        let importer = SurveyImporter::new(ImportConfig::new()).unwrap();
        let mut store = MemoryStore::new().with_reserved_points(["A", "B"]);

        let report = importer.import_file(file.path(), None, &mut store, None).unwrap();

        assert_eq!(report.groups.len(), 1);
        assert_eq!(
            report.groups[0].kind,
            GroupKind::Observations(ObservationType::Leveling)
        );
    }

    #[test]
    fn test_preview_commits_nothing() {
        let file = fixture(".l", DL100_LOOP);
        let importer = SurveyImporter::new(ImportConfig::new().with_max_lines(2)).unwrap();
        let mut store = MemoryStore::new();

        let report = importer.import_file(file.path(), None, &mut store, None).unwrap();

        assert!(matches!(report.outcome, ReadOutcome::Stopped(_)));
        assert!(report.groups.is_empty());
        assert!(store.groups().is_empty());
    }

    #[test]
    fn test_interrupted_read_commits_nothing() {
        let file = fixture(".l", DL100_LOOP);
        let importer = SurveyImporter::new(ImportConfig::new()).unwrap();
        let mut store = MemoryStore::new();
        let interrupt = InterruptFlag::new();
        interrupt.request();

        let report = importer
            .import_file(file.path(), None, &mut store, Some(interrupt))
            .unwrap();

        assert!(matches!(report.outcome, ReadOutcome::Interrupted(_)));
        assert!(store.groups().is_empty());
    }

    #[test]
    fn test_unknown_extension_needs_explicit_format() {
        let file = fixture(".txt", DL100_LOOP);
        let importer = SurveyImporter::new(ImportConfig::new()).unwrap();
        let mut store = MemoryStore::new();

        let err = importer
            .import_file(file.path(), None, &mut store, None)
            .unwrap_err();
        assert!(matches!(err, ImportError::UnknownFormat { .. }));

        let report = importer
            .import_file(file.path(), Some(SourceFormat::Dl100), &mut store, None)
            .unwrap();
        assert!(report.is_committed());
        assert!(!report.groups.is_empty());
    }

    #[test]
    fn test_dry_run_leaves_store_untouched() {
        let file = fixture(".l", DL100_LOOP);
        let importer = SurveyImporter::new(ImportConfig::new()).unwrap();

        let report = importer
            .decode_file(file.path(), None, HashSet::new(), None)
            .unwrap();

        assert!(report.outcome.is_completed());
        assert_eq!(report.groups.len(), 2);
        assert!(report.groups[0].name.starts_with("L1 (2021-03-14 15:30) "));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ImportConfig::new().with_decimal_separator('1');
        assert!(matches!(
            SurveyImporter::new(config),
            Err(ImportError::Configuration { .. })
        ));
    }
}
