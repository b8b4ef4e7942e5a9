//! Conversion factors, word indices and column layouts shared by the
//! instrument decoders.
//!
//! The numeric tables here are fixed by instrument firmware and must not be
//! changed.

use std::f64::consts::PI;

// =============================================================================
// Unit Conversion
// =============================================================================

/// International foot in meters
pub const FOOT_TO_METER: f64 = 0.3048;

/// Gradian (gon) to radian
pub const RHO_GRAD2RAD: f64 = PI / 200.0;

/// Decimal degree to radian
pub const RHO_DEG2RAD: f64 = PI / 180.0;

/// Artillery mil (6400 per circle) to radian
pub const RHO_MIL2RAD: f64 = PI / 3200.0;

// =============================================================================
// Comment Prefixes
// =============================================================================

/// Comment prefix for GSI, M5 and DL100 files
pub const DEFAULT_COMMENT_PREFIX: &str = "#";

/// Comment prefix for Z-files
pub const ZFILE_COMMENT_PREFIX: &str = "!";

/// UTF-8 byte-order mark as it appears after decoding
pub const UTF8_BOM: char = '\u{FEFF}';

// =============================================================================
// Synthetic Names
// =============================================================================

/// Prefix of generated turning point names, followed by a 7-digit counter
pub const TURNING_POINT_PREFIX: &str = "W";

/// Point code given to back-sight points whose id was carried over
pub const TURNING_POINT_CODE: &str = "TP";

/// Fallback stem when the source file name yields none
pub const DEFAULT_GROUP_STEM: &str = "import";

// =============================================================================
// GSI Word Indices
// =============================================================================

pub mod gsi_words {
    pub const POINT_ID: u32 = 11;
    pub const POINT_CODE: u32 = 41;
    pub const LINE_NAME: u32 = 271;

    pub const HORIZONTAL_ANGLE: u32 = 21;
    pub const VERTICAL_ANGLE: u32 = 22;
    pub const SLOPE_DISTANCE: u32 = 31;
    pub const HORIZONTAL_DISTANCE: u32 = 32;
    pub const HEIGHT_DIFFERENCE: u32 = 33;

    pub const EASTING: u32 = 81;
    pub const NORTHING: u32 = 82;
    pub const HEIGHT: u32 = 83;
    pub const STATION_EASTING: u32 = 84;
    pub const STATION_NORTHING: u32 = 85;
    pub const STATION_HEIGHT: u32 = 86;
    pub const TARGET_HEIGHT: u32 = 87;
    pub const INSTRUMENT_HEIGHT: u32 = 88;

    pub const BACK_SIGHT_1: u32 = 331;
    pub const FORE_SIGHT_1: u32 = 332;
    pub const SIDE_SHOT: u32 = 333;
    pub const BACK_SIGHT_2: u32 = 335;
    pub const FORE_SIGHT_2: u32 = 336;

    /// Words whose presence marks a station record
    pub const STATION_WORDS: &[u32] = &[
        STATION_EASTING,
        STATION_NORTHING,
        STATION_HEIGHT,
        BACK_SIGHT_1,
        BACK_SIGHT_2,
    ];
}

// =============================================================================
// M5 Column Layout
// =============================================================================

pub mod m5_columns {
    use std::ops::Range;

    pub const RECORD_PREFIX: &str = "FOR M5";
    pub const MIN_LENGTH: usize = 118;
    /// Column holding the error marker `E`
    pub const ERROR_MARKER: usize = 118;

    pub const TYPE_2: Range<usize> = 17..20;
    pub const VALUE_2: Range<usize> = 21..48;
    pub const TYPE_3: Range<usize> = 49..51;
    pub const VALUE_3: Range<usize> = 52..66;
    pub const UNIT_3: Range<usize> = 67..71;
    pub const TYPE_4: Range<usize> = 72..74;
    pub const VALUE_4: Range<usize> = 75..89;
    pub const UNIT_4: Range<usize> = 90..94;
    pub const TYPE_5: Range<usize> = 95..97;
    pub const VALUE_5: Range<usize> = 98..112;
    pub const UNIT_5: Range<usize> = 113..117;

    /// Sub-ranges of the address block (VALUE_2)
    pub const POINT_ID: Range<usize> = 0..8;
    pub const POINT_CODE: Range<usize> = 8..13;
    pub const LOOP_ID: Range<usize> = 23..27;
}

// =============================================================================
// Z-File Column Layout
// =============================================================================

pub mod zfile_columns {
    use std::ops::Range;

    pub const MIN_LENGTH: usize = 32;
    pub const MIN_OBSERVATION_LENGTH: usize = 71;

    pub const CODE_1: usize = 5;
    pub const CODE_2: usize = 6;
    pub const PRECISION_FLAG: Range<usize> = 8..9;
    pub const HEIGHT_KEY: Range<usize> = 8..15;
    pub const POINT_ID: Range<usize> = 16..32;
    pub const VALUE_1: Range<usize> = 32..44;
    pub const VALUE_2: Range<usize> = 44..56;
    pub const VALUE_3: Range<usize> = 56..68;
    /// Column marking a record as deleted with `*`
    pub const DELETED_MARKER: usize = 68;
    /// Column of the `|` opening the attribute area
    pub const ATTRIBUTE_MARKER: usize = 70;
}

// =============================================================================
// BEO Column Layout
// =============================================================================

pub mod beo_columns {
    use std::ops::Range;

    pub const MIN_LENGTH: usize = 89;

    pub const RECORD_KEY: Range<usize> = 0..3;
    pub const POINT_ID: Range<usize> = 15..28;
    pub const DISTANCE: Range<usize> = 33..49;
    pub const DIRECTION: Range<usize> = 49..64;
    pub const ANGLE_OR_HEIGHT: Range<usize> = 64..79;
    /// Start of the free-format instrument/reflector height field
    pub const HEIGHT_FROM: usize = 79;
    /// Height written by the instrument when none was entered
    pub const NO_HEIGHT: f64 = -1000.0;

    pub const STATION: &str = "10.";
    pub const SPATIAL_ROUNDS: &[&str] = &["20.", "21.", "24.", "31."];
    pub const PLAN_ROUND: &str = "50.";
    pub const LEVELING: &str = "70.";
}

// =============================================================================
// DL100
// =============================================================================

pub mod dl100 {
    pub const FIELD_SEPARATOR: char = ',';
    /// Loop date format, e.g. `2103141530`
    pub const DATE_FORMAT: &str = "%y%m%d%H%M";
    /// Loop date as shown in group names
    pub const DISPLAY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";
}
