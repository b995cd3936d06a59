use tokio::sync::mpsc;
use tracing::debug;

/// Lifecycle and data callbacks of one transport, delivered as events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection attempt started. Queued by the socket ahead of anything the
    /// transport reports, so `connecting` is always published first.
    Opening,
    /// Handshake completed
    Opened,
    /// One inbound text frame
    Frame(String),
    /// Transport failure (detail is for logging only)
    Error(String),
    /// Transport is gone, either side closed it
    Closed,
}

/// Requests from the session to a live transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    /// Write one complete text frame
    Send(String),
    /// Close the connection
    Close,
}

/// Event tagged with the generation of the transport that produced it
pub type TaggedEvent = (u64, TransportEvent);

/// Sending half handed to a transport so it can report its events
#[derive(Debug, Clone)]
pub struct TransportEvents {
    generation: u64,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl TransportEvents {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn emit(&self, event: TransportEvent) {
        // The session has been dropped if the receiver is gone
        if self.tx.send((self.generation, event)).is_err() {
            debug!("Dropping transport event for closed session");
        }
    }
}

/// Exclusive handle on one live transport
#[derive(Debug)]
pub struct TransportHandle {
    commands: mpsc::UnboundedSender<TransportCommand>,
}

impl TransportHandle {
    pub fn new(commands: mpsc::UnboundedSender<TransportCommand>) -> Self {
        Self { commands }
    }

    /// Queue one whole frame for writing. Returns `false` if the transport task is gone.
    pub fn send(&self, frame: String) -> bool {
        self.commands.send(TransportCommand::Send(frame)).is_ok()
    }

    pub fn close(&self) {
        let _ = self.commands.send(TransportCommand::Close);
    }
}

/// Opens transports to an endpoint.
///
/// Implementations must return immediately and report progress through
/// `events`: `Opened` once connected, `Error` on failure, and always a final
/// `Closed`.
pub trait Connector: Send + Sync {
    fn open(&self, endpoint: &str, events: TransportEvents) -> TransportHandle;

    /// Get connector name for logging
    fn name(&self) -> &str;
}
