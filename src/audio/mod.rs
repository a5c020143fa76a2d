//! Audio capture and framing.

pub mod capture;
pub mod framer;
pub mod source;
pub mod wav;

pub use capture::{AudioDevice, CpalAudioSource, list_devices};
pub use framer::FrameAssembler;
pub use source::{AudioSource, MockAudioSource};
