/// Soul Transport - headless playlist runner
///
/// Plays a track list through the in-process virtual output, logging every
/// transport event. Useful for checking play order and transport timing
/// without an audio device.
use anyhow::Context;
use clap::{Parser, ValueEnum};
use soul_transport::virtual_output::{VirtualContext, VirtualTransport};
use soul_transport::{
    util::format_time, EngineInput, EventKind, LoadOptions, LoopMode, MediaSignal, Player,
    PlayerConfig, Track, TransportEvent, UniformShuffle, WeightedArtistShuffle,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Virtual clock tick period
const TICK: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "soul-transport")]
#[command(about = "Run a playlist through the Soul Player transport", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SOUL_TRANSPORT_CONFIG")]
    config: Option<PathBuf>,

    /// JSON file holding an array of tracks
    #[arg(short, long)]
    playlist: Option<PathBuf>,

    /// Loop mode (overrides configuration)
    #[arg(short, long, value_enum)]
    loop_mode: Option<LoopArg>,

    /// Shuffle strategy used in random mode
    #[arg(short, long, value_enum, default_value_t = ShuffleArg::Artist)]
    shuffle: ShuffleArg,

    /// Simulated duration of every track in seconds
    #[arg(long, default_value_t = 3.0)]
    track_secs: f64,

    /// Stop after this many seconds
    #[arg(long, default_value_t = 60)]
    max_secs: u64,

    /// Advance to the next track when one ends
    #[arg(long)]
    auto_next: bool,

    /// Print the play order and exit
    #[arg(long)]
    order_only: bool,

    /// Track sources
    tracks: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LoopArg {
    List,
    Single,
    Random,
}

impl From<LoopArg> for LoopMode {
    fn from(arg: LoopArg) -> Self {
        match arg {
            LoopArg::List => LoopMode::List,
            LoopArg::Single => LoopMode::Single,
            LoopArg::Random => LoopMode::Random,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ShuffleArg {
    Uniform,
    Artist,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "soul_transport=info,soul_transport_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = PlayerConfig::load(cli.config.as_deref())?;
    if let Some(mode) = cli.loop_mode {
        config.loop_mode = mode.into();
    }
    config.auto_next |= cli.auto_next;

    let tracks = collect_tracks(&cli)?;
    anyhow::ensure!(!tracks.is_empty(), "no tracks given");

    let transport = VirtualTransport::new();
    for track in &tracks {
        transport.set_duration(track.src.clone(), cli.track_secs);
    }

    let player = Player::from_config(
        &config,
        Box::new(transport.clone()),
        VirtualContext::new().factory(),
    );
    let mut player = match cli.shuffle {
        ShuffleArg::Uniform => player.with_shuffle(UniformShuffle),
        ShuffleArg::Artist => player.with_shuffle(WeightedArtistShuffle::new()),
    }
    .with_track_list(tracks);

    if cli.order_only {
        for (position, track) in player.ordered_tracks().iter().enumerate() {
            let artist = track.artist.as_deref().unwrap_or("unknown");
            println!("{:>3}  {}  {}", position, artist, track.src);
        }
        return Ok(());
    }

    log_events(&mut player);

    let clock = tokio::spawn(transport.clone().run_clock(TICK));
    let total = player.track_list().len();

    tracing::info!("Playing {} tracks ({:?} mode)", total, config.loop_mode);
    if !player.load_track(Some(0), LoadOptions::autoplay()).await {
        clock.abort();
        anyhow::bail!("failed to start playback");
    }

    let deadline = tokio::time::sleep(Duration::from_secs(cli.max_secs));
    tokio::pin!(deadline);
    let mut finished = 0;

    loop {
        tokio::select! {
            input = player.next_input() => {
                let Some(input) = input else { break };
                let ended = input == EngineInput::Signal(MediaSignal::Ended);
                player.process(input).await;

                if ended {
                    finished += 1;
                    if finished >= total || !player.engine().is_playing() {
                        break;
                    }
                }
            }
            () = &mut deadline => {
                tracing::info!("Time limit reached");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    tracing::info!(
        "Finished {} of {} tracks at {}",
        finished,
        total,
        format_time(player.engine().current_time())
    );

    player.destroy().await;
    clock.abort();
    Ok(())
}

fn collect_tracks(cli: &Cli) -> anyhow::Result<Vec<Track>> {
    let mut tracks = Vec::new();

    if let Some(path) = &cli.playlist {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read playlist {}", path.display()))?;
        let list: Vec<Track> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid playlist {}", path.display()))?;
        tracks.extend(list);
    }

    tracks.extend(cli.tracks.iter().map(Track::new));
    Ok(tracks)
}

fn log_events(player: &mut Player) {
    player.on(EventKind::LoadTrack, |event| {
        if let TransportEvent::LoadTrack { index, track } = event {
            let title = track.title.as_deref().unwrap_or(&track.src);
            tracing::info!("[{}] {}", index, title);
        }
    });

    player.on(EventKind::Error, |event| {
        if let TransportEvent::Error { code, error } = event {
            tracing::error!(code = code.as_i8(), "{}", error);
        }
    });

    for kind in [
        EventKind::Play,
        EventKind::Pause,
        EventKind::Stop,
        EventKind::Ended,
        EventKind::Reorder,
    ] {
        player.on(kind, move |_| tracing::debug!("{}", kind));
    }
}
