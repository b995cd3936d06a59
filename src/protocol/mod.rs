pub mod encoder;
pub mod messages;

pub use encoder::SegmentEncoder;
pub use messages::{AudioReply, AudioSegment, InboundEvent, OutboundMessage};
