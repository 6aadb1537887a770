//! Frame rate parsing and validation.
//!
//! A [`FrameRate`] is a positive rational number. Rates reported by stream
//! metadata arrive as text such as `"24000/1001"` or `"25"`; rates supplied by
//! callers arrive as `f64`. Both paths go through strict validation, so any
//! `FrameRate` value in hand is positive and finite.
//!
//! # Example
//!
//! ```
//! use frameshift::FrameRate;
//!
//! let ntsc: FrameRate = "24000/1001".parse()?;
//! assert!((ntsc.as_f64() - 23.976).abs() < 0.001);
//!
//! let pal = FrameRate::validate(25.0)?;
//! assert_eq!(pal.to_string(), "25");
//!
//! assert!("1/0".parse::<FrameRate>().is_err());
//! # Ok::<(), frameshift::FrameshiftError>(())
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use crate::error::FrameshiftError;

/// Rate used for assembly when the caller does not provide one.
pub const DEFAULT_FRAME_RATE: u64 = 30;

/// Decimal rates keep at most this many fractional digits.
const MAX_FRACTION_DIGITS: usize = 9;

/// Smallest rate [`FrameRate::validate`] accepts: one step of the fraction.
const MIN_VALIDATED_RATE: f64 = 1e-9;

/// Largest rate [`FrameRate::validate`] accepts. Scaled by the fraction it
/// still fits a `u64` numerator.
const MAX_VALIDATED_RATE: f64 = 1e9;

/// A positive rational frame rate, stored in lowest terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRate {
    numerator: u64,
    denominator: u64,
}

impl FrameRate {
    /// Build a rate from an integer ratio.
    ///
    /// # Errors
    ///
    /// [`FrameshiftError::InvalidFrameRate`] if either term is zero.
    pub fn from_ratio(numerator: u64, denominator: u64) -> Result<Self, FrameshiftError> {
        if denominator == 0 {
            return Err(FrameshiftError::InvalidFrameRate(format!(
                "{numerator}/{denominator} has a zero denominator"
            )));
        }
        if numerator == 0 {
            return Err(FrameshiftError::InvalidFrameRate(format!(
                "{numerator}/{denominator} is zero"
            )));
        }
        let divisor = gcd(numerator, denominator);
        Ok(Self {
            numerator: numerator / divisor,
            denominator: denominator / divisor,
        })
    }

    /// Parse a rate as reported by stream metadata.
    ///
    /// Accepts `integer/integer` or a plain decimal (`25`, `29.97`, `.5`).
    /// Surrounding whitespace is ignored. Signs, exponents, `inf`, `nan`, and
    /// any other expression are rejected.
    ///
    /// # Errors
    ///
    /// [`FrameshiftError::InvalidFrameRate`] if the text is not in the grammar
    /// above or evaluates to zero.
    pub fn from_metadata(raw: &str) -> Result<Self, FrameshiftError> {
        let text = raw.trim();
        let invalid = || FrameshiftError::InvalidFrameRate(format!("cannot parse {raw:?}"));

        if let Some((numerator, denominator)) = text.split_once('/') {
            let numerator = parse_digits(numerator).ok_or_else(invalid)?;
            let denominator = parse_digits(denominator).ok_or_else(invalid)?;
            return Self::from_ratio(numerator, denominator);
        }

        let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        let whole = if whole.is_empty() {
            0
        } else {
            parse_digits(whole).ok_or_else(invalid)?
        };
        if !fraction.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(invalid());
        }

        let fraction = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
        let denominator = 10_u64.pow(fraction.len() as u32);
        let fraction_value = if fraction.is_empty() {
            0
        } else {
            parse_digits(fraction).ok_or_else(invalid)?
        };
        let numerator = whole
            .checked_mul(denominator)
            .and_then(|scaled| scaled.checked_add(fraction_value))
            .ok_or_else(invalid)?;

        Self::from_ratio(numerator, denominator)
    }

    /// Validate a caller-supplied rate.
    ///
    /// # Errors
    ///
    /// [`FrameshiftError::InvalidFrameRate`] if `value` is zero, negative,
    /// not finite, or outside `1e-9..=1e9`.
    pub fn validate(value: f64) -> Result<Self, FrameshiftError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(FrameshiftError::InvalidFrameRate(format!(
                "{value} is not a positive finite rate"
            )));
        }
        if !(MIN_VALIDATED_RATE..=MAX_VALIDATED_RATE).contains(&value) {
            return Err(FrameshiftError::InvalidFrameRate(format!(
                "{value} is outside the supported range of \
                 {MIN_VALIDATED_RATE:e} to {MAX_VALIDATED_RATE:e} fps"
            )));
        }
        // `Display` for f64 never uses exponent notation.
        Self::from_metadata(&value.to_string())
    }

    /// Numerator in lowest terms.
    pub fn numerator(&self) -> u64 {
        self.numerator
    }

    /// Denominator in lowest terms.
    pub fn denominator(&self) -> u64 {
        self.denominator
    }

    /// The rate as frames per second.
    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self {
            numerator: DEFAULT_FRAME_RATE,
            denominator: 1,
        }
    }
}

impl FromStr for FrameRate {
    type Err = FrameshiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_metadata(s)
    }
}

impl Display for FrameRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.denominator == 1 {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "{}/{}", self.numerator, self.denominator)
        }
    }
}

/// Parse a non-empty run of ASCII digits.
fn parse_digits(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
