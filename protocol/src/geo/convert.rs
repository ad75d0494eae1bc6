//! Positional numeral system conversion over unbounded integers.
//!
//! The derivation only ever needs hex → decimal, but the primitive works for
//! any pair of bases in `[2, 64]` using the alphabet
//! `0-9`, `a-z`, `A-Z`, `+`, `/` in order of increasing digit value.
//!
//! Inputs are parsed into a [`BigUint`], so a 16-hex-digit slice (which
//! overflows `i64` and loses precision in `f64`) converts exactly.

use num::{BigUint, Integer, ToPrimitive, Zero};
use thiserror::Error;

/// Digit symbols in order of value. Index == digit value.
pub const ALPHABET: &[u8; 64] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ+/";

/// Smallest supported base.
pub const MIN_BASE: u32 = 2;

/// Largest supported base (the alphabet length).
pub const MAX_BASE: u32 = 64;

/// Errors from [`convert`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// A base argument fell outside `[2, 64]`.
    #[error("base {base} out of range, must be between 2 and 64")]
    InvalidBase {
        /// The offending base.
        base: u32,
    },

    /// A character is not in the alphabet or is too large for the source base.
    #[error("invalid digit {digit:?} for base {base}")]
    InvalidDigit {
        /// The offending character.
        digit: char,
        /// The base the input was declared to be in.
        base: u32,
    },
}

/// Converts `value` from `from_base` to `to_base`.
///
/// Digits are read most significant first. The result carries no leading
/// zeros; a zero value (including the empty string) converts to `"0"`.
pub fn convert(value: &str, from_base: u32, to_base: u32) -> Result<String, ConvertError> {
    check_base(from_base)?;
    check_base(to_base)?;

    let n = parse(value, from_base)?;
    Ok(render(n, to_base))
}

/// Hex to decimal. The only conversion the coordinate deriver performs.
pub fn base16_to_base10(value: &str) -> Result<String, ConvertError> {
    convert(value, 16, 10)
}

fn check_base(base: u32) -> Result<(), ConvertError> {
    if (MIN_BASE..=MAX_BASE).contains(&base) {
        Ok(())
    } else {
        Err(ConvertError::InvalidBase { base })
    }
}

/// Value of `ch` in the alphabet, if it is a valid digit in `base`.
fn digit_value(ch: char, base: u32) -> Option<u32> {
    if !ch.is_ascii() {
        return None;
    }
    ALPHABET
        .iter()
        .position(|&sym| sym == ch as u8)
        .map(|idx| idx as u32)
        .filter(|&v| v < base)
}

fn parse(value: &str, base: u32) -> Result<BigUint, ConvertError> {
    let radix = BigUint::from(base);
    value.chars().try_fold(BigUint::zero(), |acc, ch| {
        let d = digit_value(ch, base).ok_or(ConvertError::InvalidDigit { digit: ch, base })?;
        Ok(acc * &radix + BigUint::from(d))
    })
}

fn render(mut n: BigUint, base: u32) -> String {
    if n.is_zero() {
        return "0".to_string();
    }

    let radix = BigUint::from(base);
    let mut digits = Vec::new();
    while !n.is_zero() {
        let (q, r) = n.div_rem(&radix);
        // r < base <= 64, always fits.
        let idx = r.to_usize().unwrap_or_default();
        digits.push(ALPHABET[idx]);
        n = q;
    }
    digits.reverse();

    // Every byte came from ALPHABET, which is ASCII.
    digits.into_iter().map(char::from).collect()
}
