//! Command implementation for the survey importer CLI
//!
//! Runs the import of every input file on a blocking worker, reports
//! progress, prints a summary of the committed groups and exports the store
//! to Parquet when an output directory is given.

use crate::cli::args::Args;
use crate::cli::input::{collect_input_files, read_reserved_points};
use crate::decoders::SourceFormat;
use crate::importer::SurveyImporter;
use crate::models::GroupKind;
use crate::reader::{InterruptFlag, ReadOutcome};
use crate::store::{ExportSummary, MemoryStore, ObservationStore, ParquetExporter};
use anyhow::{Context, Result};
use colored::*;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// One group as reported to the user
#[derive(Debug, Clone)]
pub struct GroupLine {
    pub kind: GroupKind,
    pub name: String,
    pub records: usize,
}

/// How the import of one file ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Completed,
    Stopped,
    Interrupted,
    Failed,
}

impl From<&ReadOutcome> for FileStatus {
    fn from(outcome: &ReadOutcome) -> Self {
        match outcome {
            ReadOutcome::Completed(_) => FileStatus::Completed,
            ReadOutcome::Stopped(_) => FileStatus::Stopped,
            ReadOutcome::Interrupted(_) => FileStatus::Interrupted,
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileStatus::Completed => "completed",
            FileStatus::Stopped => "stopped",
            FileStatus::Interrupted => "interrupted",
            FileStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Outcome of one input file
#[derive(Debug, Clone)]
pub struct FileResult {
    pub path: PathBuf,
    pub format: Option<SourceFormat>,
    pub status: FileStatus,
    pub lines_decoded: usize,
    pub lines_skipped: usize,
    pub groups: Vec<GroupLine>,
    pub error: Option<String>,
}

impl FileResult {
    fn failed(path: &Path, error: String) -> Self {
        Self {
            path: path.to_path_buf(),
            format: None,
            status: FileStatus::Failed,
            lines_decoded: 0,
            lines_skipped: 0,
            groups: Vec::new(),
            error: Some(error),
        }
    }

    fn from_outcome(
        path: &Path,
        format: SourceFormat,
        outcome: &ReadOutcome,
        groups: Vec<GroupLine>,
    ) -> Self {
        let stats = outcome.stats();
        Self {
            path: path.to_path_buf(),
            format: Some(format),
            status: FileStatus::from(outcome),
            lines_decoded: stats.lines_decoded,
            lines_skipped: stats.lines_skipped,
            groups,
            error: None,
        }
    }
}

/// Statistics of a whole run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub files: Vec<FileResult>,
    pub interrupted: bool,
    pub exported: Option<Vec<PathBuf>>,
    pub processing_time: Duration,
}

impl RunSummary {
    pub fn failed_files(&self) -> usize {
        self.files.iter().filter(|f| f.error.is_some()).count()
    }

    pub fn total_groups(&self) -> usize {
        self.files.iter().map(|f| f.groups.len()).sum()
    }

    /// Process exit code: 0 when every file was read without a fatal error
    pub fn exit_code(&self) -> i32 {
        if self.failed_files() > 0 || self.interrupted {
            1
        } else {
            0
        }
    }
}

/// Main command runner
///
/// 1. Set up logging and validate the arguments
/// 2. Collect input files and reserved point names
/// 3. Import each file on a blocking worker with progress reporting
/// 4. Export the store and print the summary
pub async fn run(args: Args, interrupt: InterruptFlag) -> Result<RunSummary> {
    let start_time = Instant::now();

    setup_logging(&args)?;
    info!("Starting survey import");
    debug!("Command line arguments: {:?}", args);

    args.validate()?;
    let importer = SurveyImporter::new(args.to_import_config())?;

    let files = collect_input_files(&args.inputs, args.format)
        .context("Failed to collect input files")?;
    if files.is_empty() {
        anyhow::bail!("No instrument files found in the given inputs");
    }
    info!("Importing {} files", files.len());

    let reserved: HashSet<String> = match &args.reserved_points {
        Some(path) => read_reserved_points(path)
            .with_context(|| format!("Failed to read reserved names from {}", path.display()))?,
        None => HashSet::new(),
    };
    let mut store = MemoryStore::new().with_reserved_points(reserved);

    let progress_bar = args
        .show_progress()
        .then(|| create_progress_bar(files.len() as u64, "Importing..."));

    let mut summary = RunSummary::default();
    for (i, path) in files.iter().enumerate() {
        if interrupt.is_requested() {
            summary.interrupted = true;
            break;
        }
        if let Some(pb) = &progress_bar {
            pb.set_position(i as u64);
            pb.set_message(file_label(path));
        }

        let (result, returned) = import_one(&args, &importer, path, store, &interrupt).await?;
        store = returned;
        if let Some(error) = &result.error {
            error!("Failed to import {}: {}", path.display(), error);
        }
        if result.status == FileStatus::Interrupted {
            summary.interrupted = true;
        }
        summary.files.push(result);
    }

    if let Some(pb) = &progress_bar {
        pb.finish_with_message("Import complete");
    }

    if let Some(output) = &args.output_path {
        if args.commits() && !summary.interrupted {
            let exporter = ParquetExporter::new(output, importer.config().export.clone());
            let export: ExportSummary = exporter
                .export(&store)
                .with_context(|| format!("Failed to export to {}", output.display()))?;
            summary.exported = Some(export.files);
        }
    }

    summary.processing_time = start_time.elapsed();
    print_summary(&args, &summary);
    Ok(summary)
}

/// Import or dry-run one file on a blocking worker. The store moves into
/// the worker and comes back with the result.
async fn import_one(
    args: &Args,
    importer: &SurveyImporter,
    path: &Path,
    mut store: MemoryStore,
    interrupt: &InterruptFlag,
) -> Result<(FileResult, MemoryStore)> {
    let importer = importer.clone();
    let path = path.to_path_buf();
    let format = args.format;
    let commits = args.commits();
    let interrupt = interrupt.clone();

    let worker = tokio::task::spawn_blocking(move || {
        let result = if commits {
            import_into(&importer, &path, format, &mut store, interrupt)
        } else {
            decode_only(&importer, &path, format, &store, interrupt)
        };
        (result, store)
    });

    worker.await.context("Import worker panicked")
}

fn import_into(
    importer: &SurveyImporter,
    path: &Path,
    format: Option<SourceFormat>,
    store: &mut MemoryStore,
    interrupt: InterruptFlag,
) -> FileResult {
    match importer.import_file(path, format, store, Some(interrupt)) {
        Ok(report) => {
            let groups = report
                .groups
                .iter()
                .map(|group| GroupLine {
                    kind: group.kind,
                    name: group.name.clone(),
                    records: store.group(group.id).map_or(0, |g| g.len()),
                })
                .collect();
            FileResult::from_outcome(path, report.format, &report.outcome, groups)
        }
        Err(e) => FileResult::failed(path, e.to_string()),
    }
}

fn decode_only(
    importer: &SurveyImporter,
    path: &Path,
    format: Option<SourceFormat>,
    store: &MemoryStore,
    interrupt: InterruptFlag,
) -> FileResult {
    let reserved = match store.reserved_point_names() {
        Ok(reserved) => reserved,
        Err(e) => return FileResult::failed(path, e.to_string()),
    };
    match importer.decode_file(path, format, reserved, Some(interrupt)) {
        Ok(report) => {
            let groups = report
                .groups
                .iter()
                .filter(|group| !group.is_empty())
                .map(|group| GroupLine {
                    kind: group.kind,
                    name: group.name.clone(),
                    records: group.len(),
                })
                .collect();
            FileResult::from_outcome(path, report.format, &report.outcome, groups)
        }
        Err(e) => FileResult::failed(path, e.to_string()),
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Set up structured logging based on CLI arguments
fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("survey_import={}", log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Create a progress bar with appropriate styling
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

fn print_summary(args: &Args, summary: &RunSummary) {
    if args.quiet {
        return;
    }

    println!();
    let title = if args.commits() {
        "Import summary"
    } else {
        "Decode summary (nothing stored)"
    };
    println!("{}", title.bright_green().bold());

    for file in &summary.files {
        let format = file
            .format
            .map(|f| f.to_string())
            .unwrap_or_else(|| "?".to_string());
        let label = file.status.to_string();
        let status = match file.status {
            FileStatus::Completed => label.green(),
            FileStatus::Failed => label.red().bold(),
            FileStatus::Stopped | FileStatus::Interrupted => label.yellow(),
        };
        println!(
            "  {} {} {}",
            file.path.display().to_string().bright_cyan(),
            format!("[{}]", format).bright_black(),
            status
        );

        if let Some(error) = &file.error {
            println!("      {}", error.red());
            continue;
        }
        if file.lines_skipped > 0 {
            println!(
                "      {}",
                format!(
                    "{} of {} lines skipped",
                    file.lines_skipped, file.lines_decoded
                )
                .yellow()
            );
        }
        for group in &file.groups {
            println!(
                "      {:<22} {} {}",
                group.kind.to_string(),
                group.name.bright_white(),
                format!("({} records)", group.records).bright_black()
            );
        }
    }

    println!();
    println!(
        "{} files, {} groups, {} failed in {}",
        summary.files.len().to_string().bright_yellow().bold(),
        summary.total_groups().to_string().bright_yellow().bold(),
        summary.failed_files().to_string().bright_yellow().bold(),
        HumanDuration(summary.processing_time)
    );
    if summary.interrupted {
        println!("{}", "Import interrupted, remaining files were not read".yellow());
    }
    if let Some(files) = &summary.exported {
        for file in files {
            println!("Wrote {}", file.display().to_string().bright_cyan());
        }
    }
}
