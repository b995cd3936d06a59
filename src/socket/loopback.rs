//! In-memory transport for driving a session without a network.
//!
//! Each `open` creates a [`LoopbackPeer`] that plays the remote side: it
//! decides when the handshake completes, pushes inbound frames, and records
//! what the session wrote.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::transport::{Connector, TransportCommand, TransportEvent, TransportEvents, TransportHandle};
use crate::lock_or_recover;

/// Remote side of one loopback transport
pub struct LoopbackPeer {
    endpoint: String,
    events: TransportEvents,
    commands: Mutex<mpsc::UnboundedReceiver<TransportCommand>>,
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl LoopbackPeer {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn generation(&self) -> u64 {
        self.events.generation()
    }

    /// Complete the handshake
    pub fn accept(&self) {
        self.events.emit(TransportEvent::Opened);
    }

    /// Deliver one inbound text frame to the session
    pub fn push_frame(&self, text: impl Into<String>) {
        self.events.emit(TransportEvent::Frame(text.into()));
    }

    /// Fail the transport: error followed by close
    pub fn fail(&self, detail: &str) {
        self.events.emit(TransportEvent::Error(detail.to_string()));
        self.close();
    }

    /// Close from the remote side
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.events.emit(TransportEvent::Closed);
        }
    }

    /// Process commands written by the session.
    ///
    /// Sent frames are recorded; a close request is answered with `Closed`.
    pub fn pump(&self) {
        let mut commands = lock_or_recover(&self.commands);
        while let Ok(command) = commands.try_recv() {
            match command {
                TransportCommand::Send(frame) => lock_or_recover(&self.sent).push(frame),
                TransportCommand::Close => self.close(),
            }
        }
    }

    /// Frames written by the session so far
    pub fn sent_frames(&self) -> Vec<String> {
        self.pump();
        lock_or_recover(&self.sent).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.pump();
        self.closed.load(Ordering::SeqCst)
    }
}

/// Connector that hands out [`LoopbackPeer`]s
#[derive(Default)]
pub struct LoopbackConnector {
    peers: Mutex<Vec<Arc<LoopbackPeer>>>,
}

impl LoopbackConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every transport opened so far, oldest first
    pub fn peers(&self) -> Vec<Arc<LoopbackPeer>> {
        lock_or_recover(&self.peers).clone()
    }

    pub fn last_peer(&self) -> Option<Arc<LoopbackPeer>> {
        lock_or_recover(&self.peers).last().cloned()
    }

    pub fn open_count(&self) -> usize {
        lock_or_recover(&self.peers).len()
    }
}

impl Connector for LoopbackConnector {
    fn open(&self, endpoint: &str, events: TransportEvents) -> TransportHandle {
        let (tx, rx) = mpsc::unbounded_channel();

        let peer = Arc::new(LoopbackPeer {
            endpoint: endpoint.to_string(),
            events,
            commands: Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });
        lock_or_recover(&self.peers).push(peer);

        TransportHandle::new(tx)
    }

    fn name(&self) -> &str {
        "loopback"
    }
}
