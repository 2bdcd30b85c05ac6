//! Equatorial ↔ horizontal conversion backed by `celestial-coords`.
//!
//! Pipeline for ICRS → horizon:
//!
//! 1. `CIRSPosition::from_icrs` applies solar light deflection, annual
//!    aberration and IAU 2006/2000A precession-nutation.
//! 2. The Earth rotation angle is evaluated at UT1, taken from the IERS
//!    table bundled with `celestial-coords` (UT1 = UTC outside its span).
//! 3. Hour angle H = ERA + east longitude − α(CIRS); the horizon step is
//!    `HourAnglePosition::to_topocentric`.
//!
//! The reverse direction runs the same steps backwards.  Polar motion and
//! refraction are not applied.
//!
//! `CIRSPosition::to_hour_angle` is not used: it pairs the CIO-based right
//! ascension with apparent sidereal time, which is off by the equation of
//! the origins.

use celestial_coords::{
    Angle, CIRSPosition, CoordResult, CoordinateFrame, EopParameters, EopProvider, EopRecord,
    HourAnglePosition, ICRSPosition, Location, TIRSPosition, TopocentricPosition, TT, UTC,
};
use celestial_time::scales::conversions::{ToTAI, ToTT, ToUT1WithDeltaT};
use celestial_time::transforms::earth_rotation_angle;
use chrono::{DateTime, Utc};
use tracing::{trace, warn};

use super::{ensure_finite, CoordinateTransform, Equatorial, GeoLocation, Horizontal, TransformError};

const MJD_ZERO_POINT: f64 = 2_400_000.5;

/// Production [`CoordinateTransform`] built on the IAU 2006/2000A
/// CIO-based reduction.
pub struct SiderealTransform {
    eop: Option<EopProvider>,
}

impl SiderealTransform {
    /// Loads the bundled IERS Earth orientation table.
    ///
    /// A table that fails to load is logged and UT1 = UTC is used instead.
    pub fn new() -> Self {
        match EopProvider::bundled() {
            Ok(provider) => Self {
                eop: Some(provider),
            },
            Err(e) => {
                warn!("bundled IERS table unavailable, assuming UT1 = UTC: {e}");
                Self::without_eop()
            }
        }
    }

    /// Ignores Earth orientation data and assumes UT1 = UTC.
    pub fn without_eop() -> Self {
        Self { eop: None }
    }

    /// TT epoch and Earth rotation angle (radians) at `time`.
    fn epoch(&self, time: DateTime<Utc>) -> CoordResult<(TT, f64)> {
        let utc = UTC::new(time.timestamp(), time.timestamp_subsec_nanos());
        let tt = utc.to_tai()?.to_tt()?;

        let jd = utc.to_julian_date();
        let mjd = (jd.jd1() - MJD_ZERO_POINT) + jd.jd2();
        let eop = self.earth_orientation(mjd)?;

        let delta_t = TIRSPosition::compute_delta_t(&tt, &eop)?;
        let ut1 = tt.to_ut1_with_delta_t(delta_t)?;
        let era = earth_rotation_angle(&ut1.to_julian_date())?;
        Ok((tt, era))
    }

    fn earth_orientation(&self, mjd: f64) -> CoordResult<EopParameters> {
        if let Some(provider) = &self.eop {
            match provider.get(mjd) {
                Ok(mut params) => {
                    params.mjd = mjd;
                    return Ok(params);
                }
                Err(e) => trace!("no IERS data for MJD {mjd:.1}, assuming UT1 = UTC: {e}"),
            }
        }
        Ok(EopRecord::new(mjd, 0.0, 0.0, 0.0, 0.0)?.to_parameters())
    }

    fn horizon_position(
        &self,
        position: Equatorial,
        location: GeoLocation,
        time: DateTime<Utc>,
    ) -> CoordResult<Horizontal> {
        let (tt, era) = self.epoch(time)?;
        let icrs = ICRSPosition::from_degrees(position.ra_deg, position.dec_deg)?;
        let cirs = CIRSPosition::from_icrs(&icrs, &tt)?;

        let hour_angle = era + location.longitude_deg.to_radians() - cirs.ra().radians();
        let topo = HourAnglePosition::new(
            Angle::from_radians(hour_angle),
            cirs.dec(),
            observer(location)?,
            tt,
        )?
        .to_topocentric()?;

        Ok(Horizontal::new(
            normalize_degrees(topo.azimuth().degrees()),
            topo.elevation().degrees(),
        ))
    }

    fn sky_position(
        &self,
        position: Horizontal,
        location: GeoLocation,
        time: DateTime<Utc>,
    ) -> CoordResult<Equatorial> {
        let (tt, era) = self.epoch(time)?;
        let local = TopocentricPosition::from_degrees(
            position.azimuth_deg,
            position.elevation_deg,
            observer(location)?,
            tt,
        )?
        .to_hour_angle()?;

        let ra = era + location.longitude_deg.to_radians() - local.hour_angle().radians();
        let cirs = CIRSPosition::new(Angle::from_radians(ra), local.declination(), tt)?;
        let icrs = cirs.to_icrs(&tt)?;

        Ok(Equatorial::new(
            normalize_degrees(icrs.ra().degrees()),
            icrs.dec().degrees(),
        ))
    }
}

impl Default for SiderealTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinateTransform for SiderealTransform {
    fn icrs_to_horizontal(
        &self,
        position: Equatorial,
        location: GeoLocation,
        time: DateTime<Utc>,
    ) -> Result<Horizontal, TransformError> {
        ensure_finite("right ascension", position.ra_deg)?;
        ensure_finite("declination", position.dec_deg)?;
        location.validate()?;
        Ok(self.horizon_position(position, location, time)?)
    }

    fn horizontal_to_icrs(
        &self,
        position: Horizontal,
        location: GeoLocation,
        time: DateTime<Utc>,
    ) -> Result<Equatorial, TransformError> {
        ensure_finite("azimuth", position.azimuth_deg)?;
        ensure_finite("elevation", position.elevation_deg)?;
        location.validate()?;
        Ok(self.sky_position(position, location, time)?)
    }
}

/// Sea-level observer with the longitude folded into [−180, 180).
fn observer(location: GeoLocation) -> CoordResult<Location> {
    let longitude = (location.longitude_deg + 180.0).rem_euclid(360.0) - 180.0;
    Ok(Location::from_degrees(location.latitude_deg, longitude, 0.0)?)
}

fn normalize_degrees(angle: f64) -> f64 {
    let angle = angle.rem_euclid(360.0);
    // rem_euclid can round a tiny negative angle up to exactly 360.
    if angle >= 360.0 {
        0.0
    } else {
        angle
    }
}
