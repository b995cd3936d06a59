use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::transport::{Connector, TaggedEvent, TransportEvent, TransportEvents, TransportHandle};
use crate::error::{FrameError, SessionError};
use crate::protocol::{InboundEvent, OutboundMessage};

/// Lifecycle of the duplex connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    /// Status string published to subscribers
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a socket state transition, for the session to publish
#[derive(Debug)]
pub enum SocketNotice {
    Status(ConnectionState),
    Inbound(InboundEvent),
    Error(SessionError),
    /// Inbound frame that was dropped; never surfaced to subscribers
    Dropped(FrameError),
}

/// Owns the single duplex connection and its state machine.
///
/// Transport callbacks arrive on the receiver returned by [`SessionSocket::new`]
/// and are fed back through [`SessionSocket::handle_event`]; the socket itself
/// never blocks or awaits.
pub struct SessionSocket {
    endpoint: String,
    connector: Arc<dyn Connector>,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    state: ConnectionState,
    transport: Option<TransportHandle>,
    /// Incremented per connect so events from replaced transports are ignored
    generation: u64,
}

impl SessionSocket {
    pub fn new(
        endpoint: impl Into<String>,
        connector: Arc<dyn Connector>,
    ) -> (Self, mpsc::UnboundedReceiver<TaggedEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let socket = Self {
            endpoint: endpoint.into(),
            connector,
            events_tx,
            state: ConnectionState::Disconnected,
            transport: None,
            generation: 0,
        };

        (socket, events_rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Start a connection attempt.
    ///
    /// Returns `false` when a connection is already live or in flight. The
    /// `connecting` status is delivered through the event channel, ahead of
    /// every event of the new transport.
    pub fn connect(&mut self) -> bool {
        if self.state != ConnectionState::Disconnected {
            debug!("Connect ignored: socket is {}", self.state);
            return false;
        }

        self.generation += 1;
        self.state = ConnectionState::Connecting;

        info!(
            "Opening {} transport #{} to {}",
            self.connector.name(),
            self.generation,
            self.endpoint
        );

        let events = TransportEvents::new(self.generation, self.events_tx.clone());
        events.emit(TransportEvent::Opening);
        self.transport = Some(self.connector.open(&self.endpoint, events));

        true
    }

    /// Request the live transport to close. Returns whether a close was requested.
    pub fn disconnect(&mut self) -> bool {
        match (&self.transport, self.state) {
            (Some(transport), ConnectionState::Connecting | ConnectionState::Connected) => {
                info!("Closing transport #{}", self.generation);
                transport.close();
                true
            }
            _ => false,
        }
    }

    /// Write one message as a single text frame.
    ///
    /// Returns `false` (message dropped) unless the socket is connected.
    pub fn send(&self, message: &OutboundMessage) -> bool {
        let transport = match (&self.transport, self.state) {
            (Some(transport), ConnectionState::Connected) => transport,
            _ => {
                debug!("Dropping outbound message: socket is {}", self.state);
                return false;
            }
        };

        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize outbound message: {}", e);
                return false;
            }
        };

        let bytes = json.len();
        if transport.send(json) {
            debug!("Queued outbound frame ({} bytes)", bytes);
            true
        } else {
            warn!("Transport #{} is gone, outbound message dropped", self.generation);
            false
        }
    }

    /// Apply one transport event to the state machine
    pub fn handle_event(&mut self, generation: u64, event: TransportEvent) -> Option<SocketNotice> {
        if generation != self.generation {
            debug!(
                "Ignoring event from stale transport #{} (current #{})",
                generation, self.generation
            );
            return None;
        }

        match event {
            TransportEvent::Opening => {
                if self.state != ConnectionState::Connecting {
                    debug!("Ignoring connect marker while {}", self.state);
                    return None;
                }
                Some(SocketNotice::Status(ConnectionState::Connecting))
            }

            TransportEvent::Opened => {
                if self.state != ConnectionState::Connecting {
                    debug!("Ignoring open while {}", self.state);
                    return None;
                }
                self.state = ConnectionState::Connected;
                info!("Session connected to {}", self.endpoint);
                Some(SocketNotice::Status(ConnectionState::Connected))
            }

            TransportEvent::Frame(text) => {
                if self.state != ConnectionState::Connected {
                    debug!("Ignoring frame while {}", self.state);
                    return None;
                }
                match InboundEvent::parse(&text) {
                    Ok(event) => Some(SocketNotice::Inbound(event)),
                    Err(FrameError::Ambiguous) => {
                        warn!("Protocol violation, dropping frame with both audio and interrupt");
                        Some(SocketNotice::Dropped(FrameError::Ambiguous))
                    }
                    Err(e) => {
                        debug!("Dropping inbound frame: {}", e);
                        Some(SocketNotice::Dropped(e))
                    }
                }
            }

            TransportEvent::Error(detail) => {
                warn!("Transport #{} error: {}", generation, detail);
                Some(SocketNotice::Error(SessionError::ConnectionFailed))
            }

            TransportEvent::Closed => {
                if self.state == ConnectionState::Disconnected {
                    return None;
                }
                self.state = ConnectionState::Disconnected;
                self.transport = None;
                info!("Session disconnected from {}", self.endpoint);
                Some(SocketNotice::Status(ConnectionState::Disconnected))
            }
        }
    }
}
