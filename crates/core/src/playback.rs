//! Serial playback of synthesized speech.
//!
//! [`PlaybackQueue`] is the bare state machine. [`spawn_playback`] runs it in a
//! task that owns an [`AudioSink`], reports lifecycle notices, and emits a late
//! `Ended` for replies that carry no audio so the avatar still returns to idle.

use crate::types::AudioClip;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Delay before a reply without audio reports the end of "speech".
pub const NO_AUDIO_FALLBACK: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackNotice {
    Started,
    Ended,
}

/// Something that can play one clip to completion.
#[async_trait]
pub trait AudioSink: Send + Sync + 'static {
    /// Resolves when the clip has finished playing.
    async fn play(&self, clip: AudioClip) -> Result<()>;
}

/// FIFO of clips with at most one playing.
///
/// Methods return the clip the caller should start playing now, if any.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    queue: VecDeque<AudioClip>,
    playing: bool,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, clip: AudioClip) -> Option<AudioClip> {
        self.queue.push_back(clip);
        self.play_next()
    }

    pub fn play_next(&mut self) -> Option<AudioClip> {
        if self.playing {
            return None;
        }
        let clip = self.queue.pop_front()?;
        self.playing = true;
        Some(clip)
    }

    /// The current clip finished, successfully or not.
    pub fn finish(&mut self) -> Option<AudioClip> {
        self.playing = false;
        self.play_next()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Clips waiting behind the one playing.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

enum Command {
    Push(AudioClip),
    Reply(Option<AudioClip>),
    Shutdown,
}

/// Handle to a running playback task. Dropping every handle tears the task
/// down.
#[derive(Clone)]
pub struct PlaybackHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl PlaybackHandle {
    /// Queues a clip behind whatever is playing.
    pub fn push(&self, clip: AudioClip) {
        self.send(Command::Push(clip));
    }

    /// An assistant reply was delivered. Without audio, `Ended` is reported
    /// after [`NO_AUDIO_FALLBACK`] unless real playback ends first.
    pub fn reply(&self, audio: Option<AudioClip>) {
        self.send(Command::Reply(audio));
    }

    /// Clears the queue, stops the current clip and ends the task.
    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("playback task already stopped");
        }
    }
}

/// Starts the playback task on the current tokio runtime.
pub fn spawn_playback<S: AudioSink>(
    sink: S,
) -> (PlaybackHandle, mpsc::UnboundedReceiver<PlaybackNotice>) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();

    let controller = PlaybackController {
        sink: Arc::new(sink),
        queue: PlaybackQueue::new(),
        current: None,
        fallback_deadline: None,
        notices: notice_tx,
    };
    tokio::spawn(controller.run(command_rx));

    (
        PlaybackHandle {
            commands: command_tx,
        },
        notice_rx,
    )
}

struct PlaybackController<S> {
    sink: Arc<S>,
    queue: PlaybackQueue,
    current: Option<AbortHandle>,
    fallback_deadline: Option<Instant>,
    notices: mpsc::UnboundedSender<PlaybackNotice>,
}

impl<S: AudioSink> PlaybackController<S> {
    async fn run(mut self, commands: mpsc::UnboundedReceiver<Command>) {
        self.drive(commands).await;
        if let Some(current) = self.current.take() {
            tracing::debug!("stopping the clip in progress");
            current.abort();
        }
    }

    async fn drive(&mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let (finished_tx, mut finished_rx) = mpsc::unbounded_channel::<Result<()>>();

        loop {
            let deadline = self.fallback_deadline;
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Push(clip)) => {
                        if let Some(clip) = self.queue.push(clip) {
                            self.start(clip, &finished_tx);
                        }
                    }
                    Some(Command::Reply(audio)) => {
                        self.fallback_deadline = None;
                        match audio {
                            Some(clip) => {
                                if let Some(clip) = self.queue.push(clip) {
                                    self.start(clip, &finished_tx);
                                }
                            }
                            None => {
                                self.fallback_deadline = Some(Instant::now() + NO_AUDIO_FALLBACK);
                            }
                        }
                    }
                    Some(Command::Shutdown) | None => {
                        tracing::debug!("playback shutting down, dropping {} clips", self.queue.len());
                        self.queue.clear();
                        break;
                    }
                },
                Some(result) = finished_rx.recv() => {
                    if let Err(e) = result {
                        tracing::warn!("audio clip failed to play: {:#}", e);
                    }
                    self.current = None;
                    self.fallback_deadline = None;
                    self.notify(PlaybackNotice::Ended);
                    if let Some(clip) = self.queue.finish() {
                        self.start(clip, &finished_tx);
                    }
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fallback_deadline = None;
                    self.notify(PlaybackNotice::Ended);
                }
            }
        }
    }

    fn start(&mut self, clip: AudioClip, finished: &mpsc::UnboundedSender<Result<()>>) {
        self.notify(PlaybackNotice::Started);
        let sink = self.sink.clone();
        let finished = finished.clone();
        let clip_task = tokio::spawn(async move { sink.play(clip).await });
        self.current = Some(clip_task.abort_handle());
        tokio::spawn(async move {
            // a panicking sink still counts as a finished clip
            let result = match clip_task.await {
                Ok(result) => result,
                Err(e) => Err(anyhow::anyhow!("audio clip task ended abnormally: {e}")),
            };
            let _ = finished.send(result);
        });
    }

    fn notify(&self, notice: PlaybackNotice) {
        if self.notices.send(notice).is_err() {
            tracing::debug!("nobody is listening for playback notices");
        }
    }
}
