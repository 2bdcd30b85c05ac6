//! Coordinate frames and the equatorial ↔ horizontal transform.
//!
//! The bridge talks ICRS right ascension / declination with Stellarium and
//! azimuth / elevation with the mount.  [`CoordinateTransform`] is the seam
//! between the two; [`SiderealTransform`] is the production implementation,
//! backed by the `celestial-coords` IAU 2006/2000A reduction.
//!
//! Conventions used throughout:
//!
//! - All angles are in degrees.
//! - Azimuth is measured from north through east, in [0, 360).
//! - Longitude is positive east of Greenwich.

pub mod sidereal;

use celestial_coords::CoordError;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use sidereal::SiderealTransform;

// ── Error type ────────────────────────────────────────────────────────────────

/// Errors produced while converting between coordinate frames.
#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    /// An input angle was NaN or infinite.
    #[error("{what} is not finite: {value}")]
    NonFinite {
        /// Which input was rejected, e.g. `"azimuth"`.
        what: &'static str,
        value: f64,
    },

    /// The observer latitude lies outside [−90, 90].
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    /// The underlying frame reduction rejected its input.
    #[error("coordinate frame conversion failed: {0}")]
    Frame(String),
}

impl From<CoordError> for TransformError {
    fn from(e: CoordError) -> Self {
        TransformError::Frame(e.to_string())
    }
}

// ── Value types ───────────────────────────────────────────────────────────────

/// Geodetic position of the observer on the Earth's surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoLocation {
    /// Latitude in degrees, north positive.
    pub latitude_deg: f64,
    /// Longitude in degrees, east positive.
    pub longitude_deg: f64,
}

impl GeoLocation {
    /// Creates a location after checking both angles.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::NonFinite`] for NaN/infinite input and
    /// [`TransformError::LatitudeOutOfRange`] when `|latitude| > 90`.
    pub fn new(latitude_deg: f64, longitude_deg: f64) -> Result<Self, TransformError> {
        let location = Self {
            latitude_deg,
            longitude_deg,
        };
        location.validate()?;
        Ok(location)
    }

    pub(crate) fn validate(&self) -> Result<(), TransformError> {
        ensure_finite("latitude", self.latitude_deg)?;
        ensure_finite("longitude", self.longitude_deg)?;
        if self.latitude_deg.abs() > 90.0 {
            return Err(TransformError::LatitudeOutOfRange(self.latitude_deg));
        }
        Ok(())
    }
}

/// An equatorial (right ascension / declination) coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Equatorial {
    pub ra_deg: f64,
    pub dec_deg: f64,
}

impl Equatorial {
    pub fn new(ra_deg: f64, dec_deg: f64) -> Self {
        Self { ra_deg, dec_deg }
    }
}

/// A horizontal (azimuth / elevation) coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Horizontal {
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
}

impl Horizontal {
    pub fn new(azimuth_deg: f64, elevation_deg: f64) -> Self {
        Self {
            azimuth_deg,
            elevation_deg,
        }
    }
}

// ── Transform seam ────────────────────────────────────────────────────────────

/// Converts between ICRS and the local horizon of an observer at an instant.
///
/// Implementations must be pure: the same inputs always yield the same
/// output, and no state is kept between calls.
pub trait CoordinateTransform: Send + Sync {
    /// Projects an ICRS position onto the observer's horizon.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError`] when an input is not finite, the latitude
    /// is out of range, or the frame reduction rejects the position.
    fn icrs_to_horizontal(
        &self,
        position: Equatorial,
        location: GeoLocation,
        time: DateTime<Utc>,
    ) -> Result<Horizontal, TransformError>;

    /// Finds the ICRS position seen at the given horizontal coordinate.
    ///
    /// # Errors
    ///
    /// Same conditions as [`icrs_to_horizontal`](Self::icrs_to_horizontal).
    fn horizontal_to_icrs(
        &self,
        position: Horizontal,
        location: GeoLocation,
        time: DateTime<Utc>,
    ) -> Result<Equatorial, TransformError>;
}

pub(crate) fn ensure_finite(what: &'static str, value: f64) -> Result<(), TransformError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(TransformError::NonFinite { what, value })
    }
}
