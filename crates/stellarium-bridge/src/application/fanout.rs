//! Delivery of position reports to every connected Stellarium session.
//!
//! Each session registers the sending half of its bounded outbound queue.
//! A status update is encoded once and the same [`Bytes`] frame is offered
//! to every queue with `try_send`, so one slow or dead peer never holds up
//! the others and no `.await` happens while the registry lock is held.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace};
use uuid::Uuid;

use stellarium_core::coords::CoordinateTransform;

use crate::application::bridge_service::{build_status_packet, BridgeError};
use crate::domain::status::StatusSnapshot;

/// Registry of live sessions plus the transform used to build reports.
pub struct StatusFanout {
    sessions: Mutex<HashMap<Uuid, mpsc::Sender<Bytes>>>,
    transform: Arc<dyn CoordinateTransform>,
}

impl StatusFanout {
    pub fn new(transform: Arc<dyn CoordinateTransform>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            transform,
        }
    }

    /// Adds a session's outbound queue.  Re-registering an id replaces the
    /// previous queue.
    pub async fn register(&self, id: Uuid, queue: mpsc::Sender<Bytes>) {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(id, queue);
        debug!("session {id} registered ({} active)", sessions.len());
    }

    /// Removes a session.  Returns `false` if it was not registered (for
    /// example because a broadcast already pruned its closed queue).
    pub async fn deregister(&self, id: Uuid) -> bool {
        let mut sessions = self.sessions.lock().await;
        let removed = sessions.remove(&id).is_some();
        debug!("session {id} deregistered ({} active)", sessions.len());
        removed
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Offers `frame` to every registered queue and returns how many accepted
    /// it.  Full queues drop the frame; closed queues are removed.
    pub async fn broadcast(&self, frame: Bytes) -> usize {
        let mut delivered = 0;
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|id, queue| match queue.try_send(frame.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("session {id}: outbound queue full, dropping position report");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("session {id}: outbound queue closed, pruning");
                false
            }
        });
        trace!("position report delivered to {delivered} session(s)");
        delivered
    }

    /// Builds one position report from `status` as seen at `now` and
    /// broadcasts it.
    ///
    /// # Errors
    ///
    /// Returns the [`BridgeError`] from building the report; nothing is sent
    /// in that case.
    pub async fn on_status_update(
        &self,
        status: &StatusSnapshot,
        now: DateTime<Utc>,
    ) -> Result<usize, BridgeError> {
        let frame = build_status_packet(status, self.transform.as_ref(), now)?.to_frame()?;
        Ok(self.broadcast(frame).await)
    }
}
