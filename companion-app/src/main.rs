mod render;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use companion_client::{ChatSession, HttpTransport, OutgoingMessage};
use companion_core::avatar::AvatarState;
use companion_core::playback::{PlaybackHandle, PlaybackNotice, spawn_playback};
use companion_core::{ConversationEvent, Language};
use companion_native_utils::{RodioSink, SilentSink, device};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::Level;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LanguageArg {
    En,
    Zh,
}

impl From<LanguageArg> for Language {
    fn from(arg: LanguageArg) -> Self {
        match arg {
            LanguageArg::En => Language::En,
            LanguageArg::Zh => Language::Zh,
        }
    }
}

/// Chat with the judge companion from the terminal. Each line on stdin is
/// sent as one message; `/quit` or end of input exits.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Base URL of the chat server
    #[arg(long, default_value = "http://localhost:3000")]
    server: String,
    /// Name shown next to your messages
    #[arg(long)]
    username: Option<String>,
    #[arg(long, value_enum, default_value = "en")]
    language: LanguageArg,
    /// Wallet address; scopes the server's rate limit to you
    #[arg(long)]
    wallet: Option<String>,
    /// Output device name (see --list-devices)
    #[arg(long)]
    output_device: Option<String>,
    /// Do not play synthesized speech
    #[arg(long)]
    mute: bool,
    /// Print the available output devices and exit
    #[arg(long)]
    list_devices: bool,
    #[arg(long, default_value = "WARN")]
    log_level: Level,
}

impl Cli {
    fn message(&self, content: &str) -> OutgoingMessage {
        let mut message = OutgoingMessage::new(content).with_language(self.language.into());
        if let Some(username) = &self.username {
            message = message.with_username(username);
        }
        if let Some(wallet) = &self.wallet {
            message = message.with_wallet_address(wallet);
        }
        message
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    if cli.list_devices {
        for info in device::available_outputs().context("Failed to list output devices")? {
            println!("{info}");
        }
        return Ok(());
    }

    let (playback, notices) = if cli.mute {
        spawn_playback(SilentSink)
    } else {
        spawn_playback(RodioSink::new(cli.output_device.clone()))
    };

    let transport = Arc::new(HttpTransport::new(&cli.server));
    tracing::info!("Sending messages to {}", transport.endpoint());
    let (session, events) = ChatSession::start(transport);

    run(&cli, session, events, &playback, notices).await?;

    playback.shutdown();
    Ok(())
}

async fn run(
    cli: &Cli,
    session: ChatSession,
    mut events: mpsc::UnboundedReceiver<ConversationEvent>,
    playback: &PlaybackHandle,
    mut notices: mpsc::UnboundedReceiver<PlaybackNotice>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut avatar = AvatarState::new();
    // dropped at end of input so the event stream closes once in-flight replies land
    let mut session = Some(session);

    loop {
        tokio::select! {
            line = lines.next_line(), if session.is_some() => {
                let line = line.context("Failed to read stdin")?;
                match line.as_deref().map(str::trim) {
                    None | Some("/quit") => {
                        session = None;
                    }
                    Some("") => {}
                    Some(text) => {
                        if avatar.on_send() {
                            println!("{}", render::avatar_line(avatar.current()));
                        }
                        if let Some(session) = session.as_mut() {
                            session.send(cli.message(text));
                        }
                    }
                }
            }
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                println!("{}", render::event_line(&event));
                if let ConversationEvent::AssistantReply { audio, .. } = &event {
                    playback.reply(audio.clone());
                }
                if avatar.on_event(&event) {
                    println!("{}", render::avatar_line(avatar.current()));
                }
            }
            Some(notice) = notices.recv() => {
                tracing::debug!("playback {:?}", notice);
                if avatar.on_playback(&notice) {
                    println!("{}", render::avatar_line(avatar.current()));
                }
            }
        }
    }

    Ok(())
}
