//! The seam between the bridge and the RCI control server.
//!
//! Production code uses `infrastructure::rci_conn::RciClient`; tests use the
//! `mockall`-generated `MockControlService` or a small hand-written fake.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::domain::{RciCommand, StatusSnapshot};

/// Errors returned when a command cannot be handed to the control server.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The connection to the control server has gone away.
    #[error("control server connection is closed")]
    Disconnected,

    /// The command could not be serialized.
    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Access to the mount's control server.
///
/// Implementations are shared across all session tasks behind an `Arc`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ControlService: Send + Sync {
    /// The most recent status snapshot, or `None` before the first arrives.
    fn latest_status(&self) -> Option<StatusSnapshot>;

    /// A receiver that yields every subsequent status snapshot.
    fn subscribe(&self) -> broadcast::Receiver<StatusSnapshot>;

    /// Sends one command.  Returns once the command is queued for delivery;
    /// the server does not acknowledge commands.
    async fn send_command(&self, command: RciCommand) -> Result<(), ControlError>;
}

/// Convenience wrappers over [`ControlService::send_command`].
///
/// Implemented for every [`ControlService`], including trait objects.
#[async_trait]
pub trait ControlCommands {
    async fn set_azimuth_position(&self, degrees: f64) -> Result<(), ControlError>;
    async fn set_elevation_position(&self, degrees: f64) -> Result<(), ControlError>;
    async fn set_azimuth_velocity(&self, degrees_per_sec: f64) -> Result<(), ControlError>;
    async fn set_elevation_velocity(&self, degrees_per_sec: f64) -> Result<(), ControlError>;
    /// Sets both axis offsets, azimuth first.
    async fn set_offsets(&self, azimuth: f64, elevation: f64) -> Result<(), ControlError>;
    async fn stop(&self) -> Result<(), ControlError>;
}

#[async_trait]
impl<T: ControlService + ?Sized> ControlCommands for T {
    async fn set_azimuth_position(&self, degrees: f64) -> Result<(), ControlError> {
        self.send_command(RciCommand::SetAzimuthPosition { position: degrees })
            .await
    }

    async fn set_elevation_position(&self, degrees: f64) -> Result<(), ControlError> {
        self.send_command(RciCommand::SetElevationPosition { position: degrees })
            .await
    }

    async fn set_azimuth_velocity(&self, degrees_per_sec: f64) -> Result<(), ControlError> {
        self.send_command(RciCommand::SetAzimuthVelocity {
            velocity: degrees_per_sec,
        })
        .await
    }

    async fn set_elevation_velocity(&self, degrees_per_sec: f64) -> Result<(), ControlError> {
        self.send_command(RciCommand::SetElevationVelocity {
            velocity: degrees_per_sec,
        })
        .await
    }

    async fn set_offsets(&self, azimuth: f64, elevation: f64) -> Result<(), ControlError> {
        self.send_command(RciCommand::SetAzimuthOffset { position: azimuth })
            .await?;
        self.send_command(RciCommand::SetElevationOffset {
            position: elevation,
        })
        .await
    }

    async fn stop(&self) -> Result<(), ControlError> {
        self.send_command(RciCommand::Stop).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use mockall::Sequence;

    #[tokio::test]
    async fn test_set_azimuth_position_sends_position_command() {
        // Arrange
        let mut control = MockControlService::new();
        control
            .expect_send_command()
            .with(eq(RciCommand::SetAzimuthPosition { position: 12.5 }))
            .times(1)
            .returning(|_| Ok(()));

        // Act
        let result = control.set_azimuth_position(12.5).await;

        // Assert
        tokio_test::assert_ok!(result);
    }

    #[tokio::test]
    async fn test_velocity_helpers_send_velocity_commands() {
        let mut control = MockControlService::new();
        control
            .expect_send_command()
            .with(eq(RciCommand::SetAzimuthVelocity { velocity: 1.0 }))
            .times(1)
            .returning(|_| Ok(()));
        control
            .expect_send_command()
            .with(eq(RciCommand::SetElevationVelocity { velocity: -2.0 }))
            .times(1)
            .returning(|_| Ok(()));

        tokio_test::assert_ok!(control.set_azimuth_velocity(1.0).await);
        tokio_test::assert_ok!(control.set_elevation_velocity(-2.0).await);
    }

    #[tokio::test]
    async fn test_set_offsets_sends_azimuth_then_elevation() {
        // Arrange
        let mut seq = Sequence::new();
        let mut control = MockControlService::new();
        control
            .expect_send_command()
            .with(eq(RciCommand::SetAzimuthOffset { position: 0.5 }))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        control
            .expect_send_command()
            .with(eq(RciCommand::SetElevationOffset { position: -0.25 }))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        // Act / Assert
        tokio_test::assert_ok!(control.set_offsets(0.5, -0.25).await);
    }

    #[tokio::test]
    async fn test_set_offsets_stops_after_first_failure() {
        let mut control = MockControlService::new();
        control
            .expect_send_command()
            .times(1)
            .returning(|_| Err(ControlError::Disconnected));

        let result = control.set_offsets(1.0, 1.0).await;

        assert!(matches!(result, Err(ControlError::Disconnected)));
    }

    #[tokio::test]
    async fn test_stop_through_trait_object() {
        let mut control = MockControlService::new();
        control
            .expect_send_command()
            .with(eq(RciCommand::Stop))
            .times(1)
            .returning(|_| Ok(()));
        let control: &dyn ControlService = &control;

        tokio_test::assert_ok!(control.stop().await);
    }
}
