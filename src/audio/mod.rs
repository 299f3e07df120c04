//! Audio output subsystem

pub mod buffer;
pub mod device;
pub mod gain;
pub mod playback;

pub use buffer::SampleRing;
pub use device::{list_output_devices, OutputDeviceInfo};
pub use gain::GainControl;
pub use playback::{AudioSink, CpalBackend, OutputBackend};
