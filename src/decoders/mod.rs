//! Instrument format decoders.
//!
//! One stateful decoder per format. Each consumes lines through
//! [`LineDecoder::parse_line`], keeps its station/loop state private and
//! pushes drafts into its own [`GroupAssembler`](crate::assembler::GroupAssembler).
//! [`SourceDecoder::finish`] closes whatever is still open and returns the
//! groups in commit order.
//!
//! - [`GsiDecoder`]: Leica GSI8/GSI16 word blocks
//! - [`M5Decoder`]: Zeiss/Trimble M5 digital level records
//! - [`Dl100Decoder`]: Topcon DL-100 comma separated records
//! - [`ZFileDecoder`]: Caplan Z-file records
//! - [`BeoDecoder`]: Neptan BEO records

pub mod beo;
pub mod dl100;
pub mod gsi;
pub mod m5;
pub mod zfile;

pub use beo::BeoDecoder;
pub use dl100::Dl100Decoder;
pub use gsi::GsiDecoder;
pub use m5::M5Decoder;
pub use zfile::ZFileDecoder;

use crate::config::{GroupSeparation, ImportConfig};
use crate::constants::{DEFAULT_COMMENT_PREFIX, TURNING_POINT_PREFIX, ZFILE_COMMENT_PREFIX};
use crate::error::{ImportError, Result};
use crate::models::{DimensionType, DraftGroup};
use crate::reader::LineDecoder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use std::path::Path;

#[cfg(test)]
pub mod tests;

/// Supported instrument file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum SourceFormat {
    Gsi,
    M5,
    Dl100,
    #[value(name = "z")]
    ZFile,
    Beo,
}

impl SourceFormat {
    pub const ALL: [SourceFormat; 5] = [
        SourceFormat::Gsi,
        SourceFormat::M5,
        SourceFormat::Dl100,
        SourceFormat::ZFile,
        SourceFormat::Beo,
    ];

    /// Detect the format from the file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_string_lossy().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.extensions().contains(&extension.as_str()))
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            SourceFormat::Gsi => &["gsi"],
            SourceFormat::M5 => &["m5", "rec", "dat", "din"],
            SourceFormat::Dl100 => &["l", "top"],
            SourceFormat::ZFile => &["z"],
            SourceFormat::Beo => &["beo"],
        }
    }

    /// Prefix of lines that are never decoded
    pub fn comment_prefix(&self) -> Option<&'static str> {
        match self {
            SourceFormat::Gsi | SourceFormat::M5 | SourceFormat::Dl100 | SourceFormat::Beo => {
                Some(DEFAULT_COMMENT_PREFIX)
            }
            SourceFormat::ZFile => Some(ZFILE_COMMENT_PREFIX),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SourceFormat::Gsi => "GSI",
            SourceFormat::M5 => "M5",
            SourceFormat::Dl100 => "DL-100",
            SourceFormat::ZFile => "Z-file",
            SourceFormat::Beo => "BEO",
        };
        f.write_str(label)
    }
}

/// Everything a decoder needs at construction
#[derive(Debug, Clone)]
pub struct DecoderContext {
    /// File name group names are derived from
    pub source_name: String,
    /// Point names already present in the destination
    pub reserved_points: HashSet<String>,
    pub dimension: DimensionType,
    pub group_separation: GroupSeparation,
    pub decimal_separator: char,
}

impl DecoderContext {
    pub fn new(source_name: impl Into<String>, config: &ImportConfig) -> Self {
        Self {
            source_name: source_name.into(),
            reserved_points: HashSet::new(),
            dimension: config.dimension,
            group_separation: config.group_separation.clone(),
            decimal_separator: config.decimal_separator,
        }
    }

    pub fn with_reserved_points(mut self, reserved: HashSet<String>) -> Self {
        self.reserved_points = reserved;
        self
    }
}

/// A decoder for one instrument format
pub trait SourceDecoder: LineDecoder + Send {
    fn format(&self) -> SourceFormat;

    /// Close all open state and return the groups in commit order
    fn finish(self: Box<Self>) -> Vec<DraftGroup>;
}

/// Build the decoder for `format`
pub fn create_decoder(format: SourceFormat, context: DecoderContext) -> Box<dyn SourceDecoder> {
    match format {
        SourceFormat::Gsi => Box::new(GsiDecoder::new(context)),
        SourceFormat::M5 => Box::new(M5Decoder::new(context)),
        SourceFormat::Dl100 => Box::new(Dl100Decoder::new(context)),
        SourceFormat::ZFile => Box::new(ZFileDecoder::new(context)),
        SourceFormat::Beo => Box::new(BeoDecoder::new(context)),
    }
}

/// Fixed-column field, clamped to the line length
pub(crate) fn column(text: &str, range: Range<usize>) -> &str {
    let end = range.end.min(text.len());
    let start = range.start.min(end);
    text.get(start..end).unwrap_or_default()
}

/// Reject lines fixed-column decoders cannot index safely
pub(crate) fn require_ascii(text: &str) -> Result<()> {
    if text.is_ascii() {
        Ok(())
    } else {
        Err(ImportError::malformed("non-ASCII characters in fixed-column record"))
    }
}

/// Parse a free-format decimal using the configured separator
pub(crate) fn parse_decimal(text: &str, separator: char) -> Result<f64> {
    let text = text.trim();
    let value = if separator == '.' {
        text.parse::<f64>()
    } else {
        text.replace(separator, ".").parse::<f64>()
    };
    match value {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ImportError::malformed(format!("invalid number '{}'", text))),
    }
}

/// True for a non-empty string of ASCII digits
pub(crate) fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// Synthetic turning point name, e.g. `W0000012`
pub(crate) fn turning_point_name(counter: u32) -> String {
    format!("{}{:07}", TURNING_POINT_PREFIX, counter)
}
