//! Translation between mount status / Stellarium packets.
//!
//! ```text
//! Status → Stellarium:  StatusSnapshot (az/el) → CurrentPositionPacket (ICRS)
//!                       call: build_status_packet()
//!
//! Stellarium → Mount:   GotoPacket (ICRS) → set_azimuth_position + set_elevation_position
//!                       call: handle_goto()
//! ```
//!
//! `build_status_packet` and `goto_target` are pure functions; only
//! `handle_goto` talks to the control server.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use stellarium_core::coords::{CoordinateTransform, Equatorial, Horizontal, TransformError};
use stellarium_core::protocol::packets::{CurrentPositionPacket, GotoPacket};
use stellarium_core::protocol::ProtocolError;

use crate::application::control::{ControlCommands, ControlError, ControlService};
use crate::domain::status::{StatusError, StatusSnapshot};

// ── Error type ────────────────────────────────────────────────────────────────

/// Failures while turning one status update or one goto into its output.
///
/// None of these end a session; the affected report or goto is skipped.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No status snapshot has arrived from the control server yet.
    #[error("no status received from the control server yet")]
    NoStatus,

    #[error("unusable status: {0}")]
    Status(#[from] StatusError),

    #[error("coordinate transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("packet encoding failed: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("control command failed: {0}")]
    Control(#[from] ControlError),
}

// ── Status → Stellarium ───────────────────────────────────────────────────────

/// Builds the position report for a status snapshot.
///
/// The mount's azimuth/elevation are converted to ICRS at the snapshot's own
/// location, as seen at `now`; the packet carries `now` as its timestamp.
///
/// # Errors
///
/// Returns [`BridgeError::Status`] when position or location fields are
/// missing, and [`BridgeError::Transform`] / [`BridgeError::Protocol`] for
/// non-finite results.
pub fn build_status_packet(
    status: &StatusSnapshot,
    transform: &dyn CoordinateTransform,
    now: DateTime<Utc>,
) -> Result<CurrentPositionPacket, BridgeError> {
    let location = status.location()?;
    let pointing = status.horizontal()?;
    let sky = transform.horizontal_to_icrs(pointing, location, now)?;
    Ok(CurrentPositionPacket::new(now, sky.ra_deg, sky.dec_deg)?)
}

// ── Stellarium → Mount ────────────────────────────────────────────────────────

/// Computes where the mount must point for a goto.
///
/// Uses the location from `status` and the goto packet's own timestamp.
pub fn goto_target(
    goto: &GotoPacket,
    status: &StatusSnapshot,
    transform: &dyn CoordinateTransform,
) -> Result<Horizontal, BridgeError> {
    let location = status.location()?;
    let time = goto.time()?;
    let target = Equatorial::new(goto.ra_degrees(), goto.dec_degrees());
    Ok(transform.icrs_to_horizontal(target, location, time)?)
}

/// Executes a goto: reads the latest status for the observer location,
/// transforms the target, then commands azimuth followed by elevation.
///
/// Returns the commanded horizontal position.  There is no retry; the caller
/// logs the error and carries on.
pub async fn handle_goto(
    goto: &GotoPacket,
    control: &dyn ControlService,
    transform: &dyn CoordinateTransform,
) -> Result<Horizontal, BridgeError> {
    let status = control.latest_status().ok_or(BridgeError::NoStatus)?;
    let target = goto_target(goto, &status, transform)?;

    debug!(
        "goto ra={:.4} dec={:.4} → az={:.4} el={:.4}",
        goto.ra_degrees(),
        goto.dec_degrees(),
        target.azimuth_deg,
        target.elevation_deg
    );

    control.set_azimuth_position(target.azimuth_deg).await?;
    control.set_elevation_position(target.elevation_deg).await?;
    Ok(target)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
