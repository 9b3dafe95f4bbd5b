use crate::device;
use async_trait::async_trait;
use base64::Engine;
use companion_core::AudioClip;
use companion_core::playback::AudioSink;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const STOP_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("audio clip is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("audio clip is empty")]
    Empty,
    #[error("output device: {0}")]
    Device(String),
    #[error("failed to open output stream: {0}")]
    Stream(#[from] rodio::StreamError),
    #[error("failed to create playback sink: {0}")]
    Play(#[from] rodio::PlayError),
    #[error("unsupported audio data: {0}")]
    Format(#[from] rodio::decoder::DecoderError),
}

/// Decodes a base64 clip into the raw encoded audio (MP3) bytes.
pub fn decode_clip(clip: &AudioClip) -> Result<Vec<u8>, AudioError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(clip.as_base64().trim())?;
    if bytes.is_empty() {
        return Err(AudioError::Empty);
    }
    Ok(bytes)
}

/// Plays clips on a local output device through rodio.
///
/// rodio's output stream is not `Send`, so every clip opens the device on a
/// blocking thread and holds it until playback finishes. Dropping the `play`
/// future stops the clip.
#[derive(Debug, Clone, Default)]
pub struct RodioSink {
    device_name: Option<String>,
}

impl RodioSink {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    fn play_blocking(
        device_name: Option<&str>,
        bytes: Vec<u8>,
        stop: &AtomicBool,
    ) -> Result<(), AudioError> {
        let device = device::get_or_default_output(device_name)?;
        let (_stream, handle) = rodio::OutputStream::try_from_device(&device)?;
        let sink = rodio::Sink::try_new(&handle)?;
        let source = rodio::Decoder::new(Cursor::new(bytes))?;
        sink.append(source);
        while !sink.empty() {
            if stop.load(Ordering::Relaxed) {
                tracing::debug!("playback stopped early");
                sink.stop();
                break;
            }
            std::thread::sleep(STOP_POLL);
        }
        Ok(())
    }
}

#[async_trait]
impl AudioSink for RodioSink {
    async fn play(&self, clip: AudioClip) -> anyhow::Result<()> {
        let bytes = decode_clip(&clip)?;
        let device_name = self.device_name.clone();
        tracing::debug!("playing {} bytes of audio", bytes.len());

        let guard = StopOnDrop::default();
        let stop = guard.0.clone();
        tokio::task::spawn_blocking(move || {
            Self::play_blocking(device_name.as_deref(), bytes, &stop)
        })
        .await??;
        drop(guard);
        Ok(())
    }
}

/// Raises its flag when dropped, including when the owning future is aborted.
#[derive(Default)]
struct StopOnDrop(Arc<AtomicBool>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Accepts clips without playing them, for `--mute` and headless runs.
///
/// Clips are still decoded so a corrupt payload surfaces as a failed clip.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSink;

#[async_trait]
impl AudioSink for SilentSink {
    async fn play(&self, clip: AudioClip) -> anyhow::Result<()> {
        let bytes = decode_clip(&clip)?;
        tracing::debug!("muted clip of {} bytes", bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_standard_base64() {
        let clip = AudioClip::new("SUQzBA==");
        assert_eq!(decode_clip(&clip).unwrap(), b"ID3\x04");
    }

    #[test]
    fn rejects_garbage_and_empty_clips() {
        assert!(matches!(
            decode_clip(&AudioClip::new("not base64!")),
            Err(AudioError::Base64(_))
        ));
        assert!(matches!(
            decode_clip(&AudioClip::new("")),
            Err(AudioError::Empty)
        ));
    }

    #[test]
    fn stop_flag_is_raised_when_the_guard_drops() {
        let guard = StopOnDrop::default();
        let flag = guard.0.clone();
        assert!(!flag.load(Ordering::Relaxed));
        drop(guard);
        assert!(flag.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn silent_sink_finishes_immediately() {
        SilentSink.play(AudioClip::new("SUQzBA==")).await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_clip_fails_before_opening_a_device() {
        let sink = RodioSink::new(Some("does-not-matter".into()));
        let err = sink.play(AudioClip::new("%%%")).await.unwrap_err();
        assert!(err.to_string().contains("base64"), "{err}");
    }
}
