pub mod backend;
pub mod convert;
pub mod file;
pub mod file_backend;
pub mod segment;
pub mod silence;

pub use backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
pub use file::AudioFile;
pub use file_backend::WavFileBackend;
pub use segment::{SegmentBuffer, SegmentFormat};
pub use silence::SilenceBackend;
