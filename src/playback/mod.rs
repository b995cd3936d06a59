pub mod coordinator;

pub use coordinator::{PlaybackCoordinator, PlaybackItem};
