//! Fixed-point conversions between logical angles/instants and the integer
//! fields carried on the wire.
//!
//! | Quantity        | Wire type | Scale                          |
//! |-----------------|-----------|--------------------------------|
//! | timestamp       | `i64`     | microseconds since Unix epoch  |
//! | right ascension | `u32`     | full range ↔ [0, 360) degrees  |
//! | declination     | `i32`     | 2^30 ↔ 90 degrees              |
//!
//! Every packet field passes through these functions in both directions;
//! nothing else in the crate scales angles by hand.

use chrono::{DateTime, Utc};

use crate::protocol::frame::ProtocolError;

/// Number of right-ascension steps in one full turn (2^32).
pub const RA_FULL_TURN: f64 = 4_294_967_296.0;

/// Number of declination steps in one quadrant (2^30).
pub const DEC_QUADRANT: f64 = 1_073_741_824.0;

/// Smallest representable right-ascension increment, in degrees.
pub const RA_QUANTUM_DEG: f64 = 360.0 / RA_FULL_TURN;

/// Smallest representable declination increment, in degrees.
pub const DEC_QUANTUM_DEG: f64 = 90.0 / DEC_QUADRANT;

// ── Timestamps ────────────────────────────────────────────────────────────────

/// Encodes an instant as microseconds since the Unix epoch.
///
/// Sub-microsecond precision is dropped (rounded toward negative infinity).
pub fn encode_timestamp(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_micros()
}

/// Decodes a wire timestamp back into a UTC instant.
///
/// # Errors
///
/// Returns [`ProtocolError::TimestampOutOfRange`] if the value lies outside
/// the range `chrono` can represent (roughly ±262 000 years).
pub fn decode_timestamp(micros: i64) -> Result<DateTime<Utc>, ProtocolError> {
    DateTime::<Utc>::from_timestamp_micros(micros).ok_or(ProtocolError::TimestampOutOfRange(micros))
}

// ── Right ascension ───────────────────────────────────────────────────────────

/// Encodes a right ascension in degrees as `round(deg / 360 · 2^32) mod 2^32`.
///
/// Any finite input is accepted; values outside [0, 360) wrap around.
///
/// # Errors
///
/// Returns [`ProtocolError::NonFiniteAngle`] for NaN or infinite input.
///
/// # Examples
///
/// ```rust
/// use stellarium_core::protocol::fixed_point::{decode_ra, encode_ra};
///
/// assert_eq!(encode_ra(180.0).unwrap(), 0x8000_0000);
/// assert_eq!(encode_ra(-90.0).unwrap(), encode_ra(270.0).unwrap());
/// assert_eq!(decode_ra(0x4000_0000), 90.0);
/// ```
pub fn encode_ra(degrees: f64) -> Result<u32, ProtocolError> {
    ensure_finite(degrees)?;
    // `%` on floats is exact, so reducing first keeps full precision even for
    // inputs many turns away from the canonical range.
    let reduced = degrees % 360.0;
    let steps = (reduced / 360.0 * RA_FULL_TURN).round();
    Ok(steps.rem_euclid(RA_FULL_TURN) as u32)
}

/// Decodes a wire right ascension into degrees in [0, 360).
pub fn decode_ra(value: u32) -> f64 {
    f64::from(value) / RA_FULL_TURN * 360.0
}

// ── Declination ───────────────────────────────────────────────────────────────

/// Encodes a declination in degrees.
///
/// The input is first folded into [−90, 90] with an IEEE-style remainder
/// (`remainder(deg, 180)`, ties to even), then scaled by 2^30/90 and
/// truncated toward zero.  Declinations past a pole are folded back rather
/// than rejected.
///
/// # Errors
///
/// Returns [`ProtocolError::NonFiniteAngle`] for NaN or infinite input.
pub fn encode_dec(degrees: f64) -> Result<i32, ProtocolError> {
    ensure_finite(degrees)?;
    let folded = remainder_180(degrees);
    Ok((folded / 90.0 * DEC_QUADRANT) as i32)
}

/// Decodes a wire declination into degrees.
pub fn decode_dec(value: i32) -> f64 {
    f64::from(value) / DEC_QUADRANT * 90.0
}

/// `remainder(x, 180)` with round-half-to-even quotient, result in [−90, 90].
///
/// Reducing modulo 360 first preserves the parity of the quotient, and every
/// subtraction below stays within a factor of two of its operands so it is
/// exact.
fn remainder_180(x: f64) -> f64 {
    let mut r = x % 360.0;
    if r >= 270.0 {
        r -= 360.0;
    } else if r <= -270.0 {
        r += 360.0;
    }
    if r > 90.0 {
        r - 180.0
    } else if r < -90.0 {
        r + 180.0
    } else {
        r
    }
}

fn ensure_finite(degrees: f64) -> Result<(), ProtocolError> {
    if degrees.is_finite() {
        Ok(())
    } else {
        Err(ProtocolError::NonFiniteAngle(degrees))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
