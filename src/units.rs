//! Unit/value decoding for fixed-point instrument fields.
//!
//! Instrument words carry a unit code, a sign and a zero-padded digit string.
//! `decode` turns the three into meters or radians.

use crate::constants::{FOOT_TO_METER, RHO_DEG2RAD, RHO_GRAD2RAD, RHO_MIL2RAD};
use crate::error::{ImportError, Result};

/// Physical unit of a coded value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitCode {
    /// Unscaled value, marked by a `.` in the unit position
    None,
    Meter,
    Foot,
    Gradian,
    DecimalDegree,
    SexagesimalDegree,
    Mil,
    Meter10,
    Foot10000,
    Meter100,
}

impl UnitCode {
    /// Map the GSI unit nibble to a unit
    pub fn from_gsi(code: char) -> Result<Self> {
        match code {
            '.' => Ok(UnitCode::None),
            '0' => Ok(UnitCode::Meter),
            '1' => Ok(UnitCode::Foot),
            '2' => Ok(UnitCode::Gradian),
            '3' => Ok(UnitCode::DecimalDegree),
            '4' => Ok(UnitCode::SexagesimalDegree),
            '5' => Ok(UnitCode::Mil),
            '6' => Ok(UnitCode::Meter10),
            '7' => Ok(UnitCode::Foot10000),
            '8' => Ok(UnitCode::Meter100),
            other => Err(ImportError::UnsupportedUnit {
                code: other.to_string(),
            }),
        }
    }
}

/// Sign character of a coded value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    pub fn from_char(c: char) -> Self {
        if c == '-' { Sign::Minus } else { Sign::Plus }
    }

    pub fn factor(&self) -> f64 {
        match self {
            Sign::Plus => 1.0,
            Sign::Minus => -1.0,
        }
    }
}

/// Decode a zero-padded digit string into SI units (meters, radians)
pub fn decode(unit: UnitCode, sign: Sign, digits: &str) -> Result<f64> {
    let digits = digits.trim_start_matches('0');
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ImportError::malformed(format!(
            "invalid digit string '{}'",
            digits
        )));
    }
    let value = if digits.is_empty() {
        0.0
    } else {
        digits
            .parse::<f64>()
            .map_err(|_| ImportError::malformed(format!("invalid digit string '{}'", digits)))?
    };

    let value = match unit {
        UnitCode::None => value,
        UnitCode::Meter => value / 1000.0,
        UnitCode::Foot => value / 1000.0 * FOOT_TO_METER,
        UnitCode::Gradian => value / 100_000.0 * RHO_GRAD2RAD,
        UnitCode::DecimalDegree => value / 100_000.0 * RHO_DEG2RAD,
        UnitCode::SexagesimalDegree => sexagesimal_to_radian(value),
        UnitCode::Mil => value / 10_000.0 * RHO_MIL2RAD,
        UnitCode::Meter10 => value / 10_000.0,
        UnitCode::Foot10000 => value / 100_000.0 * FOOT_TO_METER,
        UnitCode::Meter100 => value / 100_000.0,
    };

    Ok(sign.factor() * value)
}

/// `DDDMMSSs`: degrees, minutes, seconds with one decimal
fn sexagesimal_to_radian(value: f64) -> f64 {
    let degrees = (value / 100_000.0).trunc();
    let rest = value - degrees * 100_000.0;
    let minutes = (rest / 1000.0).trunc();
    let seconds = (rest - minutes * 1000.0) / 10.0;
    (degrees + minutes / 60.0 + seconds / 3600.0) * RHO_DEG2RAD
}
