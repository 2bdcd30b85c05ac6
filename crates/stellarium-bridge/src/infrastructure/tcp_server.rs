//! Stellarium-facing TCP server: accept loop, status pump, and per-session
//! tasks.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Running the status pump: every snapshot from the control server is
//!    turned into one position report and handed to the [`StatusFanout`].
//! 3. Accepting Stellarium connections, one Tokio task per connection.
//! 4. Per session: sending the initial position report, decoding frames,
//!    executing gotos, and writing queued reports.
//! 5. Stopping the accept loop when the `running` flag is cleared.
//!
//! [`run_session`] is generic over the byte stream so tests can drive it
//! with `tokio::io::duplex` instead of real sockets.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use chrono::Utc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use stellarium_core::coords::CoordinateTransform;
use stellarium_core::protocol::frame::{FrameDecoder, ProtocolError};
use stellarium_core::protocol::packets::{decode_packet, InboundPacket};

use crate::application::bridge_service::{build_status_packet, handle_goto, BridgeError};
use crate::application::control::ControlService;
use crate::application::fanout::StatusFanout;
use crate::domain::config::BridgeConfig;
use crate::domain::status::StatusSnapshot;

/// How long `accept()` may block before the `running` flag is re-checked.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Size of each socket read.
const READ_CHUNK_SIZE: usize = 4096;

// ── Error type ────────────────────────────────────────────────────────────────

/// Reasons a Stellarium session ended abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer sent a length prefix outside the valid range.
    #[error("frame stream broken: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("session writer task failed: {0}")]
    Writer(String),
}

// ── Shared session state ──────────────────────────────────────────────────────

/// Everything a session task needs, shared across all sessions.
pub struct SessionContext {
    pub control: Arc<dyn ControlService>,
    pub transform: Arc<dyn CoordinateTransform>,
    pub fanout: Arc<StatusFanout>,
    pub queue_capacity: usize,
}

impl SessionContext {
    pub fn new(
        control: Arc<dyn ControlService>,
        transform: Arc<dyn CoordinateTransform>,
        queue_capacity: usize,
    ) -> Self {
        let fanout = Arc::new(StatusFanout::new(Arc::clone(&transform)));
        Self {
            control,
            transform,
            fanout,
            queue_capacity,
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.listen_addr` and serves Stellarium clients until `running`
/// is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(
    config: BridgeConfig,
    control: Arc<dyn ControlService>,
    transform: Arc<dyn CoordinateTransform>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind Stellarium listener on {}", config.listen_addr))?;

    info!("Stellarium bridge listening on {}", config.listen_addr);

    let ctx = Arc::new(SessionContext::new(
        control,
        transform,
        config.session_queue_capacity,
    ));
    run_listener(listener, ctx, running).await;
    Ok(())
}

/// Serves an already-bound listener.  Spawns the status pump for the
/// lifetime of the loop.
pub async fn run_listener(listener: TcpListener, ctx: Arc<SessionContext>, running: Arc<AtomicBool>) {
    let pump = tokio::spawn(run_status_pump(
        ctx.control.subscribe(),
        Arc::clone(&ctx.fanout),
    ));

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                info!("new Stellarium connection from {peer_addr}");
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    handle_peer_session(stream, peer_addr, ctx).await;
                });
            }
            Ok(Err(e)) => {
                error!("accept error: {e}");
            }
            Err(_) => {
                // Timed out; loop back to check `running`.
            }
        }
    }

    pump.abort();
}

// ── Status pump ───────────────────────────────────────────────────────────────

/// Forwards control-server snapshots to the fan-out until the control
/// server's broadcast channel closes, which happens when the connection to
/// the control server is lost.
///
/// When several snapshots are queued only the newest is reported.
pub async fn run_status_pump(
    mut updates: broadcast::Receiver<StatusSnapshot>,
    fanout: Arc<StatusFanout>,
) {
    loop {
        let status = match updates.recv().await {
            Ok(status) => newest(&mut updates, status),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("status pump lagged; skipped {skipped} snapshot(s)");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("lost connection to the control server; position reports stopped");
                break;
            }
        };

        if let Err(e) = fanout.on_status_update(&status, Utc::now()).await {
            warn!("skipping position report: {e}");
        }
    }
}

/// Drains any snapshots already queued behind `first` and returns the last.
fn newest(
    updates: &mut broadcast::Receiver<StatusSnapshot>,
    first: StatusSnapshot,
) -> StatusSnapshot {
    let mut status = first;
    loop {
        match updates.try_recv() {
            Ok(next) => status = next,
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => return status,
        }
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

async fn handle_peer_session(stream: TcpStream, peer_addr: SocketAddr, ctx: Arc<SessionContext>) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("session {peer_addr}: could not set TCP_NODELAY: {e}");
    }
    match run_session(stream, peer_addr.to_string(), ctx).await {
        Ok(()) => info!("session {peer_addr} closed normally"),
        Err(e) => warn!("session {peer_addr} closed with error: {e}"),
    }
}

/// Runs one Stellarium session to completion.
///
/// Queues the initial position report, registers with the fan-out, then
/// reads until EOF, an I/O error, or a desynchronized frame stream.  The
/// session is always deregistered on the way out.
///
/// # Errors
///
/// [`SessionError::Protocol`] when the peer breaks framing;
/// [`SessionError::Io`] / [`SessionError::Writer`] when the connection
/// fails.  A clean EOF returns `Ok(())`.
pub async fn run_session<S>(
    stream: S,
    peer: String,
    ctx: Arc<SessionContext>,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let session_id = Uuid::new_v4();
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut queue_rx = open_queue(&ctx, session_id, &peer).await;

    let peer_w = peer.clone();
    let mut writer_task = tokio::spawn(async move {
        while let Some(frame) = queue_rx.recv().await {
            writer.write_all(&frame).await?;
        }
        debug!("session {peer_w}: outbound queue closed");
        Ok::<(), std::io::Error>(())
    });

    let result = tokio::select! {
        read = read_loop(&mut reader, &peer, &ctx) => read,
        written = &mut writer_task => match written {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SessionError::Io(e)),
            Err(join) => Err(SessionError::Writer(join.to_string())),
        },
    };

    writer_task.abort();
    ctx.fanout.deregister(session_id).await;
    result
}

/// Creates the session's outbound queue and registers it with the fan-out.
///
/// The initial position report is queued before registration so no fan-out
/// frame can overtake it.
async fn open_queue(ctx: &SessionContext, session_id: Uuid, peer: &str) -> mpsc::Receiver<Bytes> {
    let (queue_tx, queue_rx) = mpsc::channel::<Bytes>(ctx.queue_capacity);
    push_initial_report(ctx, &queue_tx, peer);
    // The registry holds the only sender; deregistering closes the queue.
    ctx.fanout.register(session_id, queue_tx).await;
    queue_rx
}

fn push_initial_report(ctx: &SessionContext, queue: &mpsc::Sender<Bytes>, peer: &str) {
    let Some(status) = ctx.control.latest_status() else {
        debug!("session {peer}: no status yet; skipping initial position report");
        return;
    };
    let frame = build_status_packet(&status, ctx.transform.as_ref(), Utc::now())
        .and_then(|packet| packet.to_frame().map_err(BridgeError::from));
    match frame {
        Ok(frame) => {
            if queue.try_send(frame).is_err() {
                debug!("session {peer}: initial position report not queued");
            }
        }
        Err(e) => warn!("session {peer}: skipping initial position report: {e}"),
    }
}

async fn read_loop<R>(reader: &mut R, peer: &str, ctx: &SessionContext) -> Result<(), SessionError>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            debug!("session {peer}: EOF");
            return Ok(());
        }

        for payload in decoder.feed(&buf[..n]) {
            handle_payload(&payload, peer, ctx).await;
        }

        if let Some(e) = decoder.desync_error() {
            warn!("session {peer}: {e}; closing connection");
            return Err(SessionError::Protocol(e));
        }
    }
}

async fn handle_payload(payload: &[u8], peer: &str, ctx: &SessionContext) {
    match decode_packet(payload) {
        InboundPacket::Goto(goto) => {
            match handle_goto(&goto, ctx.control.as_ref(), ctx.transform.as_ref()).await {
                Ok(target) => info!(
                    "session {peer}: goto → az {:.3}° el {:.3}°",
                    target.azimuth_deg, target.elevation_deg
                ),
                Err(e) => warn!("session {peer}: goto failed: {e}"),
            }
        }
        InboundPacket::Unrecognized {
            packet_type,
            body_len,
        } => {
            debug!("session {peer}: ignoring packet type {packet_type:?} ({body_len} byte body)");
        }
    }
}
