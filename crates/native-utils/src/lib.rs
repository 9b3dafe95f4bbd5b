//! Native audio output for the companion: clip decoding, output device
//! discovery and a rodio-backed playback sink.

pub mod audio;
pub mod device;

pub use audio::{AudioError, RodioSink, SilentSink, decode_clip};
