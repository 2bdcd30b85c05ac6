//! WebSocket client for the RCI control server.
//!
//! The RCI server pushes a JSON status object on every change and accepts
//! JSON commands.  Commands are never acknowledged.
//!
//! [`RciClient`] owns two background tasks:
//!
//! - **Status reader**: parses each text frame into a [`StatusSnapshot`],
//!   stores it as the latest snapshot (`watch`) and publishes it to
//!   subscribers (`broadcast`).  Invalid JSON is logged and skipped.
//! - **Command writer**: drains an `mpsc` queue of serialized commands into
//!   the WebSocket sink, so concurrent callers never interleave frames.
//!
//! When the server goes away the reader stops and the status channel
//! closes, so subscribers see `RecvError::Closed`.  The last snapshot stays
//! readable and further commands fail with [`ControlError::Disconnected`].

use anyhow::Context;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::application::control::{ControlError, ControlService};
use crate::domain::{RciCommand, StatusSnapshot};

/// Number of status snapshots buffered for slow subscribers.
const STATUS_CHANNEL_CAPACITY: usize = 16;

/// Number of commands buffered ahead of the WebSocket writer.
const COMMAND_QUEUE_CAPACITY: usize = 64;

/// A live connection to the RCI control server.
pub struct RciClient {
    latest: watch::Receiver<Option<StatusSnapshot>>,
    // The reader task holds the only strong sender.
    updates: broadcast::WeakSender<StatusSnapshot>,
    commands: mpsc::Sender<String>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl RciClient {
    /// Connects to `url`, identifying as `client_name` and authenticating
    /// with `password` (sent as the WebSocket subprotocol) when present.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed, the password is not a valid
    /// header value, or the WebSocket handshake fails.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use stellarium_bridge::infrastructure::rci_conn::RciClient;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = RciClient::connect("ws://localhost:8502/api/ws", None, "Stellarium").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(
        url: &str,
        password: Option<&str>,
        client_name: &str,
    ) -> anyhow::Result<Self> {
        let url = with_client_query(url, client_name)?;

        let mut request = url
            .as_str()
            .into_client_request()
            .with_context(|| format!("invalid RCI WebSocket URL {url}"))?;
        if let Some(password) = password {
            let value = HeaderValue::from_str(password)
                .context("RCI password is not a valid WebSocket subprotocol value")?;
            request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
        }

        let (ws_stream, _response) = connect_async(request)
            .await
            .with_context(|| format!("failed to connect to RCI server at {url}"))?;

        info!("connected to RCI server at {url}");
        Ok(Self::from_stream(ws_stream))
    }

    /// Wraps an already-established WebSocket and starts the reader and
    /// writer tasks.
    pub fn from_stream<S>(ws_stream: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = ws_stream.split();
        let (latest_tx, latest_rx) = watch::channel(None);
        let (updates_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);

        let updates = updates_tx.downgrade();
        let reader_task = tokio::spawn(read_status(stream, latest_tx, updates_tx));
        let writer_task = tokio::spawn(write_commands(sink, commands_rx));

        Self {
            latest: latest_rx,
            updates,
            commands: commands_tx,
            reader_task,
            writer_task,
        }
    }
}

impl Drop for RciClient {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

#[async_trait]
impl ControlService for RciClient {
    fn latest_status(&self) -> Option<StatusSnapshot> {
        self.latest.borrow().clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<StatusSnapshot> {
        match self.updates.upgrade() {
            Some(updates) => updates.subscribe(),
            None => {
                // Reader already gone: hand out a receiver that is closed.
                let (_, closed) = broadcast::channel(1);
                closed
            }
        }
    }

    async fn send_command(&self, command: RciCommand) -> Result<(), ControlError> {
        let text = serde_json::to_string(&command)?;
        debug!("RCI command {}", command.name());
        self.commands
            .send(text)
            .await
            .map_err(|_| ControlError::Disconnected)
    }
}

// ── URL handling ──────────────────────────────────────────────────────────────

/// Appends `client=<name>` to the URL's query, keeping any existing query.
fn with_client_query(url: &str, client_name: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(url).with_context(|| format!("invalid RCI URL '{url}'"))?;
    url.query_pairs_mut().append_pair("client", client_name);
    Ok(url)
}

// ── Background tasks ──────────────────────────────────────────────────────────

async fn read_status<S>(
    mut stream: SplitStream<WebSocketStream<S>>,
    latest: watch::Sender<Option<StatusSnapshot>>,
    updates: broadcast::Sender<StatusSnapshot>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(message) = stream.next().await {
        match message {
            Ok(WsMessage::Text(text)) => match StatusSnapshot::from_json(&text) {
                Ok(status) => {
                    latest.send_replace(Some(status.clone()));
                    // No subscribers is fine; the watch still holds it.
                    let _ = updates.send(status);
                }
                Err(e) => warn!("invalid status JSON from RCI server: {e}"),
            },
            Ok(WsMessage::Close(_)) => {
                debug!("RCI server sent Close");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("RCI WebSocket read failed: {e}");
                break;
            }
        }
    }
    info!("RCI status stream ended");
}

async fn write_commands<S>(
    mut sink: SplitSink<WebSocketStream<S>, WsMessage>,
    mut commands: mpsc::Receiver<String>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(text) = commands.recv().await {
        if let Err(e) = sink.send(WsMessage::Text(text)).await {
            warn!("RCI command send failed: {e}");
            break;
        }
    }
    // Dropping the receiver makes later send_command calls fail fast.
    commands.close();
    debug!("RCI command writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_query_added_with_question_mark() {
        let url = with_client_query("ws://localhost:8502/api/ws", "Stellarium").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8502/api/ws?client=Stellarium");
    }

    #[test]
    fn test_client_query_appended_to_existing_query() {
        let url = with_client_query("ws://radar:8502/api/ws?debug=1", "Stellarium").unwrap();
        assert_eq!(url.as_str(), "ws://radar:8502/api/ws?debug=1&client=Stellarium");
    }

    #[test]
    fn test_client_name_is_escaped() {
        let url = with_client_query("ws://radar/api/ws", "my dome&co").unwrap();
        assert_eq!(url.query(), Some("client=my+dome%26co"));
    }

    #[test]
    fn test_malformed_url_is_rejected() {
        assert!(with_client_query("not a url", "x").is_err());
    }
}
