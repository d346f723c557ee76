use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tempo_core::{init_logging, AppDirs, Config, TrackMetadata};
use tempo_media::SimulatedMediaProvider;
use tempo_session::{
    platform_reply, DirectoryAssetStore, ErrorPayload, HostCommand, PlayRequest, PlaybackSession,
    SessionEvent, SessionInbox, TokioScheduler,
};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How far the simulated playhead moves per driver step.
const PLAYHEAD_STEP: Duration = Duration::from_millis(50);

#[derive(Debug, Parser)]
#[command(name = "tempo", version, about = "Headless playback session controller")]
struct Cli {
    /// Keep config, cache and logs under this directory instead of the platform defaults
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Length every simulated source reports once it has loaded
    #[arg(long, global = true, default_value_t = 180_000)]
    duration_ms: u64,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read host commands as JSON lines on stdin and write replies and notifications to stdout (default)
    Serve,
    /// Play a single source until it completes, printing notifications
    Play(PlayCommand),
    /// Print the platform string returned for successful host commands
    Platform,
}

#[derive(Debug, Parser, Clone)]
struct PlayCommand {
    /// Source url; relative paths resolve against file:///
    url: String,
    /// Track title shown on the now-playing surface
    #[arg(long, default_value = "")]
    track: String,
    #[arg(long, default_value = "")]
    album: String,
    #[arg(long, default_value = "")]
    artist: String,
    /// Cover image file name inside the cover directory
    #[arg(long)]
    cover: Option<String>,
}

impl PlayCommand {
    fn request(&self) -> PlayRequest {
        let mut track = TrackMetadata::new(&self.track, &self.album, &self.artist);
        if let Some(cover) = &self.cover {
            track = track.with_cover(cover);
        }
        PlayRequest {
            url: self.url.clone(),
            track,
        }
    }
}

/// Line written back for every host command.
#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Reply {
    Result(String),
    Error(ErrorPayload),
}

fn reply_to(session: &mut PlaybackSession, line: &str) -> Reply {
    match HostCommand::from_json(line).and_then(|command| session.handle_command(command)) {
        Ok(()) => Reply::Result(platform_reply()),
        Err(err) => {
            warn!(error = %err, "host command rejected");
            Reply::Error(ErrorPayload::from(&err))
        }
    }
}

/// A session wired to the simulated backend and the current runtime.
struct Driver {
    session: PlaybackSession,
    inbox: SessionInbox,
    provider: Arc<SimulatedMediaProvider>,
    events: UnboundedReceiver<SessionEvent>,
}

impl Driver {
    fn new(config: &Config, dirs: &AppDirs, source_length: Duration) -> Result<Self> {
        let provider = Arc::new(SimulatedMediaProvider::with_auto_resolve(source_length));
        let (listener, events) = mpsc::unbounded_channel::<SessionEvent>();
        let scheduler =
            TokioScheduler::try_current().context("session driver needs a tokio runtime")?;
        let assets = DirectoryAssetStore::new(config.playback.cover_dir(dirs).to_path_buf());
        debug!(cover_dir = %assets.root().display(), "cover art directory");

        let (session, inbox) =
            PlaybackSession::builder(provider.clone(), Arc::new(listener), Arc::new(scheduler))
                .assets(Arc::new(assets))
                .config(config.playback.clone())
                .build();

        Ok(Self {
            session,
            inbox,
            provider,
            events,
        })
    }

    /// Writes out whatever notifications are already queued.
    async fn flush_events<W: AsyncWrite + Unpin>(&mut self, out: &mut W) -> Result<()> {
        while let Ok(event) = self.events.try_recv() {
            write_line(out, &event).await?;
        }
        Ok(())
    }
}

async fn write_line<W, T>(out: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_string(value).context("failed to encode bridge message")?;
    line.push('\n');
    out.write_all(line.as_bytes())
        .await
        .context("failed to write to stdout")?;
    out.flush().await.context("failed to flush stdout")?;
    Ok(())
}

fn playhead_clock() -> time::Interval {
    let mut clock = time::interval(PLAYHEAD_STEP);
    clock.set_missed_tick_behavior(MissedTickBehavior::Skip);
    clock
}

async fn serve(mut driver: Driver) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut clock = playhead_clock();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read host command")? else {
                    info!("host closed stdin");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let reply = reply_to(&mut driver.session, &line);
                write_line(&mut stdout, &reply).await?;
            }
            _ = clock.tick() => driver.provider.advance(PLAYHEAD_STEP),
            Some(input) = driver.inbox.recv() => driver.session.handle_input(input),
            Some(event) = driver.events.recv() => write_line(&mut stdout, &event).await?,
        }
    }

    driver.session.stop();
    driver.flush_events(&mut stdout).await
}

async fn play_once(mut driver: Driver, request: PlayRequest) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut clock = playhead_clock();
    driver
        .session
        .handle_command(HostCommand::Play(request))
        .context("play request rejected")?;

    loop {
        tokio::select! {
            _ = clock.tick() => driver.provider.advance(PLAYHEAD_STEP),
            Some(input) = driver.inbox.recv() => driver.session.handle_input(input),
            Some(event) = driver.events.recv() => {
                let finished = matches!(event, SessionEvent::Completed | SessionEvent::Error(_));
                write_line(&mut stdout, &event).await?;
                if finished {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    driver.session.stop();
    driver.flush_events(&mut stdout).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = match &cli.root {
        Some(root) => AppDirs::rooted(root),
        None => AppDirs::discover()?,
    };
    let config = Config::load_or_default(&dirs)?;
    let _logging = init_logging(&config.logging, &dirs)?;
    let source_length = Duration::from_millis(cli.duration_ms);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Platform => println!("{}", platform_reply()),
        Command::Serve => {
            info!(
                "Serving host bridge (config dir: {})",
                dirs.config_dir().display()
            );
            serve(Driver::new(&config, &dirs, source_length)?).await?;
        }
        Command::Play(play) => {
            let request = play.request();
            info!(url = %request.url, track = %request.track.track_name, "Play request");
            play_once(Driver::new(&config, &dirs, source_length)?, request).await?;
        }
    }

    Ok(())
}
