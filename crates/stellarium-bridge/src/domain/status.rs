//! Status snapshots reported by the RCI control server.
//!
//! The server pushes a JSON object on every update.  Only a handful of keys
//! matter to the bridge, but the whole object is kept so that future readers
//! (and debug logs) see exactly what the server sent.
//!
//! ```json
//! { "Latitude": 42.36, "Longitude": -71.09, "AzPos": 180.0, "ElPos": 45.0, ... }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use stellarium_core::coords::{GeoLocation, Horizontal, TransformError};

/// Observer latitude in degrees, north positive.
pub const LATITUDE_KEY: &str = "Latitude";
/// Observer longitude in degrees, east positive.
pub const LONGITUDE_KEY: &str = "Longitude";
/// Current mount azimuth in degrees.
pub const AZIMUTH_POSITION_KEY: &str = "AzPos";
/// Current mount elevation in degrees.
pub const ELEVATION_POSITION_KEY: &str = "ElPos";

/// Errors raised when a snapshot lacks the data the bridge needs.
#[derive(Debug, Error, PartialEq)]
pub enum StatusError {
    #[error("status field {0} is missing")]
    MissingField(&'static str),

    #[error("status field {field} is not a number: {value}")]
    NotANumber { field: &'static str, value: String },

    #[error("status reports an invalid location: {0}")]
    InvalidLocation(#[from] TransformError),
}

/// One status object as received from the RCI server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusSnapshot(Map<String, Value>);

impl StatusSnapshot {
    /// Parses a WebSocket text frame.  Anything other than a JSON object is
    /// rejected.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Raw access to any field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn latitude(&self) -> Result<f64, StatusError> {
        self.number(LATITUDE_KEY)
    }

    pub fn longitude(&self) -> Result<f64, StatusError> {
        self.number(LONGITUDE_KEY)
    }

    pub fn azimuth_position(&self) -> Result<f64, StatusError> {
        self.number(AZIMUTH_POSITION_KEY)
    }

    pub fn elevation_position(&self) -> Result<f64, StatusError> {
        self.number(ELEVATION_POSITION_KEY)
    }

    /// The observer location carried in the snapshot.
    ///
    /// # Errors
    ///
    /// Missing or non-numeric fields, or a latitude outside [−90, 90].
    pub fn location(&self) -> Result<GeoLocation, StatusError> {
        Ok(GeoLocation::new(self.latitude()?, self.longitude()?)?)
    }

    /// Where the mount is pointing right now.
    pub fn horizontal(&self) -> Result<Horizontal, StatusError> {
        Ok(Horizontal::new(
            self.azimuth_position()?,
            self.elevation_position()?,
        ))
    }

    fn number(&self, field: &'static str) -> Result<f64, StatusError> {
        let value = self.0.get(field).ok_or(StatusError::MissingField(field))?;
        value.as_f64().ok_or_else(|| StatusError::NotANumber {
            field,
            value: value.to_string(),
        })
    }
}

impl From<Map<String, Value>> for StatusSnapshot {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
