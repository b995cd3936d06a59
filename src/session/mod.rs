//! Voice session management
//!
//! This module provides the `VoiceSession` facade that ties together:
//! - The duplex socket to the voice backend
//! - Local recording and segment submission
//! - Ordered playback of synthesized replies with interrupts
//! - Event subscriptions and session statistics

mod config;
mod events;
mod stats;
mod voice_session;

pub use config::{SessionConfig, DEFAULT_ENDPOINT_PATH};
pub use events::{EventBus, SubscriptionId};
pub use stats::SessionStats;
pub use voice_session::VoiceSession;
