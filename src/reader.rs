//! Line-oriented record source.
//!
//! Reads an instrument file under a shared advisory lock and hands every
//! non-blank, non-comment line to a [`LineDecoder`]. Per-record decode errors
//! are counted and logged; any other error aborts the read.

use crate::constants::UTF8_BOM;
use crate::error::{ImportError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Upper bound on diagnostics kept in [`ReadStats::errors`]
const MAX_RECORDED_ERRORS: usize = 100;

/// One input line handed to a decoder
#[derive(Debug, Clone, Copy)]
pub struct RawLine<'a> {
    /// 1-based line number
    pub number: usize,
    /// Byte offset of the line start
    pub offset: u64,
    pub text: &'a str,
}

/// Consumer of raw lines
pub trait LineDecoder {
    fn parse_line(&mut self, line: &RawLine<'_>) -> Result<()>;
}

/// Cooperative stop request shared between threads
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Statistics from reading one file
#[derive(Debug, Clone, Default)]
pub struct ReadStats {
    pub lines_read: usize,
    pub lines_ignored: usize,
    pub lines_decoded: usize,
    pub lines_skipped: usize,
    pub errors: Vec<String>,
}

impl ReadStats {
    /// Share of decoded lines that were accepted, in percent
    pub fn success_rate(&self) -> f64 {
        if self.lines_decoded == 0 {
            0.0
        } else {
            (self.lines_decoded - self.lines_skipped) as f64 / self.lines_decoded as f64 * 100.0
        }
    }

    fn record_skip(&mut self, line: usize, error: &ImportError) {
        self.lines_skipped += 1;
        if self.errors.len() < MAX_RECORDED_ERRORS {
            self.errors.push(format!("line {}: {}", line, error));
        }
    }
}

/// How a read ended
#[derive(Debug, Clone)]
pub enum ReadOutcome {
    /// End of file reached
    Completed(ReadStats),
    /// Line limit reached before end of file
    Stopped(ReadStats),
    /// Interrupt requested between lines
    Interrupted(ReadStats),
}

impl ReadOutcome {
    pub fn stats(&self) -> &ReadStats {
        match self {
            ReadOutcome::Completed(stats)
            | ReadOutcome::Stopped(stats)
            | ReadOutcome::Interrupted(stats) => stats,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ReadOutcome::Completed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReadOutcome::Completed(_) => "completed",
            ReadOutcome::Stopped(_) => "stopped",
            ReadOutcome::Interrupted(_) => "interrupted",
        }
    }
}

/// Shared lock held for the duration of a read
struct SharedLock<'a> {
    file: &'a File,
}

impl<'a> SharedLock<'a> {
    fn acquire(file: &'a File, path: &Path) -> Result<Self> {
        file.try_lock_shared()
            .map_err(|source| ImportError::LockUnavailable {
                path: path.to_path_buf(),
                source: source.into(),
            })?;
        Ok(Self { file })
    }
}

impl Drop for SharedLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!("Failed to release file lock: {}", e);
        }
    }
}

pub struct LineReader {
    path: PathBuf,
    comment_prefix: Option<String>,
    max_lines: Option<usize>,
    interrupt: Option<InterruptFlag>,
}

impl LineReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            comment_prefix: None,
            max_lines: None,
            interrupt: None,
        }
    }

    /// Lines starting with `prefix` are not handed to the decoder
    pub fn with_comment_prefix(mut self, prefix: Option<&str>) -> Self {
        self.comment_prefix = prefix.filter(|p| !p.is_empty()).map(str::to_string);
        self
    }

    pub fn with_max_lines(mut self, max_lines: Option<usize>) -> Self {
        self.max_lines = max_lines;
        self
    }

    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Feed every line of the file to `decoder`
    pub fn read<D: LineDecoder + ?Sized>(&self, decoder: &mut D) -> Result<ReadOutcome> {
        if !self.path.is_file() {
            return Err(ImportError::FileNotFound {
                path: self.path.clone(),
            });
        }

        let file = File::open(&self.path)?;
        let _lock = SharedLock::acquire(&file, &self.path)?;
        let mut reader = BufReader::new(&file);

        debug!("Reading {}", self.path.display());

        let mut stats = ReadStats::default();
        let mut buffer = Vec::new();
        let mut offset = 0u64;

        loop {
            if self.interrupt.as_ref().is_some_and(|flag| flag.is_requested()) {
                info!(
                    "Read of {} interrupted after {} lines",
                    self.path.display(),
                    stats.lines_read
                );
                return Ok(ReadOutcome::Interrupted(stats));
            }

            buffer.clear();
            let bytes = reader.read_until(b'\n', &mut buffer)?;
            if bytes == 0 {
                break;
            }

            stats.lines_read += 1;
            let number = stats.lines_read;
            let line_offset = offset;
            offset += bytes as u64;

            let decoded = String::from_utf8_lossy(&buffer);
            let mut text = decoded.trim_end_matches(['\n', '\r']);
            if number == 1 {
                text = text.strip_prefix(UTF8_BOM).unwrap_or(text);
            }

            if text.trim().is_empty() || self.is_comment(text) {
                stats.lines_ignored += 1;
                continue;
            }

            if self.max_lines.is_some_and(|max| stats.lines_decoded >= max) {
                debug!("Line limit reached at line {}", number);
                return Ok(ReadOutcome::Stopped(stats));
            }

            stats.lines_decoded += 1;
            let line = RawLine {
                number,
                offset: line_offset,
                text,
            };
            match decoder.parse_line(&line) {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => {
                    debug!("Skipping line {}: {}", number, e);
                    stats.record_skip(number, &e);
                }
                Err(e) => return Err(e),
            }
        }

        if stats.lines_skipped > 0 {
            warn!(
                "{}: {} of {} lines could not be decoded",
                self.path.display(),
                stats.lines_skipped,
                stats.lines_decoded
            );
        }

        Ok(ReadOutcome::Completed(stats))
    }

    fn is_comment(&self, text: &str) -> bool {
        self.comment_prefix
            .as_deref()
            .is_some_and(|prefix| text.starts_with(prefix))
    }
}
