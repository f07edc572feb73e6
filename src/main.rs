use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use linecam::config::ViewerConfig;
use linecam::playback::PlaybackController;
use linecam::source::{ready_gate, LiveInput, LiveReader, RecordedSource};
use linecam::strip::Caption;

/// How long `--dump` waits for a live frame before giving up.
const LIVE_DUMP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(name = "linecam")]
#[command(about = "KJunior robot linear camera analyzer")]
#[command(version, long_version = env!("LINECAM_LONG_VERSION"))]
struct Cli {
    /// Capture file, one frame of 102 values per line. With --live, `-` reads stdin.
    file: PathBuf,
    /// Milliseconds between frames during playback [default: 40]
    #[arg(allow_negative_numbers = true, value_parser = clap::value_parser!(i64).range(1..))]
    frame_rate_ms: Option<i64>,
    /// Treat FILE as a live stream that keeps growing
    #[arg(long)]
    live: bool,
    /// Open paused on the first frame
    #[arg(long)]
    paused: bool,
    /// Draw the LEFT/MIDDLE/RIGHT boundaries
    #[arg(long)]
    show_delimiters: bool,
    /// YAML viewer settings; flags override it
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Validate the capture file and print its frame count
    #[arg(long, conflicts_with_all = ["live", "dump"])]
    check: bool,
    /// Print --check output as JSON
    #[arg(long, requires = "check")]
    json: bool,
    /// Print the first FRAMES frames as text instead of opening a window
    #[arg(long, value_name = "FRAMES")]
    dump: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    if cli.check {
        return run_check(&cli.file, cli.json);
    }
    if let Some(frames) = cli.dump {
        return if cli.live {
            run_live_dump(&cli.file, &config, frames)
        } else {
            run_dump(&cli.file, &config, frames)
        };
    }
    run_viewer(&cli, &config)
}

fn resolve_config(cli: &Cli) -> Result<ViewerConfig> {
    let mut config = match &cli.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };
    if let Some(rate) = cli.frame_rate_ms {
        config.interval_ms = rate as u64;
    }
    config.show_delimiters |= cli.show_delimiters;
    config.start_paused |= cli.paused;
    config.validate()?;
    Ok(config)
}

fn run_check(path: &Path, json: bool) -> Result<()> {
    let source = RecordedSource::open(path)
        .with_context(|| format!("the file : {} could not be opened", path.display()))?;

    if json {
        let report = serde_json::json!({
            "ok": true,
            "path": path.display().to_string(),
            "frames": source.total_frames(),
        });
        println!("{report}");
    } else {
        println!("OK: {} ({} frames)", path.display(), source.total_frames());
    }
    Ok(())
}

fn run_dump(path: &Path, config: &ViewerConfig, frames: usize) -> Result<()> {
    let source = RecordedSource::open(path)
        .with_context(|| format!("the file : {} could not be opened", path.display()))?;
    let mut playback = PlaybackController::recorded(source, config.interval(), true)?;

    for shown in 0..frames {
        if shown > 0 {
            playback.tick()?;
        }
        let caption = Caption::new(playback.frame(), playback.index(), playback.total_frames());
        println!("{}", caption.to_text());
    }
    Ok(())
}

fn run_live_dump(path: &Path, config: &ViewerConfig, frames: usize) -> Result<()> {
    let input = LiveInput::from_arg(path);
    let (ready, wait) = ready_gate();
    let reader = LiveReader::spawn(&input, config.poll_interval(), wait, || {})
        .with_context(|| format!("failed to start live reader on {}", input.describe()))?;
    ready.signal();

    let mut feed = reader.feed;
    for index in 1..=frames {
        let Some(frame) = feed.recv_timeout(LIVE_DUMP_TIMEOUT) else {
            if feed.is_closed() {
                break;
            }
            bail!("no live frame within {:?}", LIVE_DUMP_TIMEOUT);
        };
        println!("{}", Caption::new(&frame, index, None).to_text());
    }
    Ok(())
}

#[cfg(feature = "play")]
fn run_viewer(cli: &Cli, config: &ViewerConfig) -> Result<()> {
    use linecam::play::{run_play, PlayInput};

    let input = if cli.live {
        PlayInput::Live(LiveInput::from_arg(&cli.file))
    } else {
        PlayInput::Recorded(cli.file.clone())
    };
    run_play(input, config)
}

#[cfg(not(feature = "play"))]
fn run_viewer(_cli: &Cli, _config: &ViewerConfig) -> Result<()> {
    bail!("linecam was built without the `play` feature; use --check or --dump")
}
