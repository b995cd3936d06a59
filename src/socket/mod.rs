//! Duplex connection to the voice backend
//!
//! - `SessionSocket`: connection state machine, framing and inbound dispatch
//! - `Connector` / `TransportHandle`: seam between the state machine and a transport
//! - `WsConnector`: WebSocket transport (tokio-tungstenite)
//! - `LoopbackConnector`: in-memory transport for tests and local runs

pub mod loopback;
pub mod session_socket;
pub mod transport;
pub mod ws;

pub use loopback::{LoopbackConnector, LoopbackPeer};
pub use session_socket::{ConnectionState, SessionSocket, SocketNotice};
pub use transport::{Connector, TaggedEvent, TransportCommand, TransportEvent, TransportEvents, TransportHandle};
pub use ws::WsConnector;
