//! # Coordinate Derivation
//!
//! Turns a block hash plus a reference point into a new point in the same
//! one-degree cell as the reference. The reference supplies the integer
//! degrees; the hash supplies the fractional digits.
//!
//! ## Recipe
//!
//! ```text
//! hash:   000000000019d6689c085ae165831e93 | 4ff763ae46a2a6c1 | 72b3f1b60a8ce26f
//!         ──────── ignored ─────────────── | ─── latitude ─── | ─── longitude ──
//!
//! latitude  = sign(ref.lat) * (|trunc(ref.lat)| + 0.<first 6 decimal digits of 0x4ff763ae46a2a6c1>)
//! longitude = sign(ref.lng) * (|trunc(ref.lng)| + 0.<first 6 decimal digits of 0x72b3f1b60a8ce26f>)
//! ```
//!
//! The sign comes from the reference value itself, not from its truncated
//! integer part. A reference of `-0.5` truncates to `-0`, and the derived
//! value must still land west of the meridian.
//!
//! Pure and deterministic: same `(hash, reference)` in, same bits out.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::convert::{base16_to_base10, ConvertError};
use crate::config::{DEFAULT_REFERENCE, FRACTION_DIGITS};
use crate::storage::{BlockHash, BlockRecord};

/// Errors from [`derive`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeoError {
    /// A hash half failed base conversion. Unreachable for a validated
    /// [`BlockHash`]; kept so a malformed input fails loudly instead of
    /// producing a bogus point.
    #[error("hash conversion failed: {0}")]
    Convert(#[from] ConvertError),

    /// The reference coordinate contains NaN or an infinity.
    #[error("reference coordinate is not finite: ({lat}, {lng})")]
    NonFiniteReference {
        /// Reference latitude as given.
        lat: String,
        /// Reference longitude as given.
        lng: String,
    },
}

/// A latitude/longitude pair in degrees.
///
/// No range enforcement: the deriver takes whatever the caller hands it and
/// renderers clamp if they care.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Degrees north (negative for south).
    pub lat: f64,
    /// Degrees east (negative for west).
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether both components are finite.
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

impl Default for Coordinate {
    fn default() -> Self {
        let (lat, lng) = DEFAULT_REFERENCE;
        Self { lat, lng }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lng)
    }
}

/// A block placed on the map: the record, the reference it was placed
/// against, and the resulting point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockPlace {
    pub height: u64,
    pub hash: BlockHash,
    pub reference: Coordinate,
    pub coordinate: Coordinate,
}

impl BlockPlace {
    /// Derives the place of `record` relative to `reference`.
    pub fn locate(record: &BlockRecord, reference: Coordinate) -> Result<Self, GeoError> {
        Ok(Self {
            height: record.height,
            hash: record.hash.clone(),
            reference,
            coordinate: derive(&record.hash, reference)?,
        })
    }
}

/// Derives the coordinate for `hash` near `reference`.
pub fn derive(hash: &BlockHash, reference: Coordinate) -> Result<Coordinate, GeoError> {
    if !reference.is_finite() {
        return Err(GeoError::NonFiniteReference {
            lat: reference.lat.to_string(),
            lng: reference.lng.to_string(),
        });
    }

    let (lat_half, lng_half) = hash.coordinate_halves();
    Ok(Coordinate {
        lat: axis(reference.lat, &fraction_digits(lat_half)?),
        lng: axis(reference.lng, &fraction_digits(lng_half)?),
    })
}

/// First `FRACTION_DIGITS` decimal digits of a hex slice. Not zero-padded:
/// a value below 100000 contributes fewer digits.
fn fraction_digits(hex_half: &str) -> Result<String, ConvertError> {
    let mut decimal = base16_to_base10(hex_half)?;
    decimal.truncate(FRACTION_DIGITS);
    Ok(decimal)
}

/// Glues the reference's integer degrees to the hash-derived fraction.
fn axis(reference: f64, fraction: &str) -> f64 {
    let whole = reference.trunc().abs();
    // Nearest f64 to the decimal text "<whole>.<fraction>".
    let magnitude = format!("{whole}.{fraction}")
        .parse::<f64>()
        .unwrap_or(whole);

    if reference.is_sign_negative() {
        -magnitude
    } else {
        magnitude
    }
}
