use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use talkmate_client::{
    AudioBackendFactory, AudioSource, Config, PlaybackItem, StillImageFile, ToggleOutcome,
    VoiceSession, WsConnector,
};

#[derive(Parser, Debug)]
#[command(name = "talkmate", about = "Push-to-talk voice client")]
struct Args {
    /// Config file (extension optional)
    #[arg(long, default_value = "config/talkmate")]
    config: String,

    /// Record from a WAV file instead of silence
    #[arg(long, conflicts_with = "silence_secs")]
    wav: Option<PathBuf>,

    /// Seconds of silence to record when no WAV file is given
    #[arg(long, default_value_t = 5)]
    silence_secs: u64,

    /// Still image attached to each segment
    #[arg(long)]
    image: Option<PathBuf>,

    /// Directory replies are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;
    info!("{} starting", cfg.service.name);

    let session_config = cfg.session_config();
    let source = match &args.wav {
        Some(path) => AudioSource::File(path.clone()),
        None => AudioSource::Silence(Duration::from_secs(args.silence_secs)),
    };
    let audio = AudioBackendFactory::create(source, session_config.backend_config(true))?;
    let connector = Arc::new(WsConnector::new()?);

    let session = Arc::new(VoiceSession::new(session_config, connector, audio)?);

    let image = args
        .image
        .clone()
        .or_else(|| cfg.camera.image_path.as_ref().map(PathBuf::from));
    if let Some(path) = image {
        info!("Attaching still image {}", path.display());
        session.attach_camera(Arc::new(StillImageFile::new(path)));
    }

    session.on_status_change(|state| info!("Connection: {}", state));
    session.on_recording_state_change(|state| info!("Recording: {}", state));
    session.on_interrupt(|| warn!("Playback interrupted by server"));
    session.on_error(|e| error!("Session error: {}", e));

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&cfg.playback.output_dir));
    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let player = tokio::spawn(play_replies(Arc::clone(&session), output_dir));

    session.connect();
    info!("Commands: <enter> toggle recording, c connect, d disconnect, s stats, q quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => match session.toggle_recording().await {
                Ok(ToggleOutcome::Started) => info!("Recording started"),
                Ok(ToggleOutcome::Stopped(report)) => info!(
                    "Segment of {} ms ({} bytes, image: {}) {}",
                    report.duration_ms,
                    report.audio_bytes,
                    report.with_image,
                    if report.sent { "sent" } else { "dropped" }
                ),
                Ok(ToggleOutcome::Ignored(state)) => info!("Busy ({}), try again", state),
                Err(e) => error!("Recording failed: {}", e),
            },
            "c" => session.connect(),
            "d" => session.disconnect(),
            "s" => println!("{}", serde_json::to_string_pretty(&session.stats())?),
            "q" => break,
            other => warn!("Unknown command: {}", other),
        }
    }

    session.shutdown().await;
    player.abort();
    info!("Bye");

    Ok(())
}

/// Write replies to `dir` in arrival order
async fn play_replies(session: Arc<VoiceSession>, dir: PathBuf) {
    loop {
        match session.wait_playback().await {
            Some(item) => {
                if let Err(e) = write_reply(&dir, &item).await {
                    error!("Failed to write reply {}: {:#}", item.sequence, e);
                }
                if !session.finish_playback(item.sequence) {
                    info!("Reply {} was interrupted", item.sequence);
                }
            }
            None => tokio::time::sleep(Duration::from_millis(250)).await,
        }
    }
}

async fn write_reply(dir: &Path, item: &PlaybackItem) -> Result<()> {
    let ext = if item.audio.starts_with(b"RIFF") { "wav" } else { "bin" };
    let path = dir.join(format!("reply-{:04}.{}", item.sequence, ext));

    tokio::fs::write(&path, &item.audio)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Reply {} ({} bytes) -> {}", item.sequence, item.audio.len(), path.display());
    Ok(())
}
