// WebSocket transport using tokio-tungstenite

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::transport::{Connector, TransportCommand, TransportEvent, TransportEvents, TransportHandle};

/// Opens one WebSocket per `open` call on the Tokio runtime it was created on
pub struct WsConnector {
    runtime: Handle,
}

impl WsConnector {
    pub fn new() -> Result<Self> {
        let runtime = Handle::try_current()
            .context("WebSocket connector must be created inside a Tokio runtime")?;

        Ok(Self { runtime })
    }
}

impl Connector for WsConnector {
    fn open(&self, endpoint: &str, events: TransportEvents) -> TransportHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let url = endpoint.to_string();

        self.runtime.spawn(async move {
            run_transport(url, events, rx).await;
        });

        TransportHandle::new(tx)
    }

    fn name(&self) -> &str {
        "WebSocket"
    }
}

/// Drive one connection from handshake to close.
///
/// Always finishes by emitting `Closed`, whatever the outcome.
async fn run_transport(
    url: String,
    events: TransportEvents,
    mut commands: mpsc::UnboundedReceiver<TransportCommand>,
) {
    let generation = events.generation();
    info!("Connecting to WebSocket at {} (transport #{})", url, generation);

    let connect = connect_async(url.as_str());
    tokio::pin!(connect);

    // A close request may arrive while the handshake is still pending
    let ws_stream = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok((stream, _)) => break stream,
                Err(e) => {
                    warn!("WebSocket connect to {} failed: {}", url, e);
                    events.emit(TransportEvent::Error(e.to_string()));
                    events.emit(TransportEvent::Closed);
                    return;
                }
            },
            command = commands.recv() => match command {
                Some(TransportCommand::Send(_)) => {
                    debug!("Dropping frame queued before the socket opened");
                }
                Some(TransportCommand::Close) | None => {
                    info!("Connect to {} cancelled", url);
                    events.emit(TransportEvent::Closed);
                    return;
                }
            },
        }
    };

    info!("WebSocket connected (transport #{})", generation);
    events.emit(TransportEvent::Opened);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    events.emit(TransportEvent::Frame(text));
                }
                Some(Ok(Message::Close(frame))) => {
                    info!("WebSocket closed by server: {:?}", frame);
                    break;
                }
                None => {
                    info!("WebSocket stream ended");
                    break;
                }
                Some(Err(e)) => {
                    warn!("WebSocket read error: {}", e);
                    events.emit(TransportEvent::Error(e.to_string()));
                    break;
                }
                // Binary, Ping/Pong frames handled by tungstenite
                Some(Ok(_)) => {}
            },
            command = commands.recv() => match command {
                Some(TransportCommand::Send(json)) => {
                    if let Err(e) = write.send(Message::Text(json)).await {
                        warn!("WebSocket send error: {}", e);
                        events.emit(TransportEvent::Error(e.to_string()));
                        break;
                    }
                }
                Some(TransportCommand::Close) | None => {
                    info!("Closing WebSocket (transport #{})", generation);
                    if let Err(e) = write.close().await {
                        debug!("WebSocket close handshake failed: {}", e);
                    }
                    break;
                }
            },
        }
    }

    info!("WebSocket disconnected (transport #{})", generation);
    events.emit(TransportEvent::Closed);
}
