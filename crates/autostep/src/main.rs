//! autostep - record mouse and keyboard steps and replay them
//!
//! Recording and real playback need the `native` feature. Without it the CLI
//! can still list, inspect and dry-run recordings.

use anyhow::{bail, Result};
use autostep_recorder::prelude::*;
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[cfg(feature = "native")]
mod native;

#[derive(Parser)]
#[command(name = "autostep")]
#[command(about = "Record mouse and keyboard steps and replay them on any screen size")]
#[command(version)]
struct Cli {
    /// Recordings directory
    #[arg(long, global = true, default_value = "recordings")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record until Esc is pressed (F9 pauses and resumes)
    Record {
        /// File name, timestamped if omitted
        #[arg(short, long)]
        name: Option<String>,

        /// Seconds before capture starts
        #[arg(long, default_value = "5")]
        countdown: u64,
    },

    /// Replay a recording
    Play(PlayArgs),

    /// List saved recordings
    List,

    /// Show recording info
    Show {
        /// Recording file
        file: String,

        /// Print every event
        #[arg(long)]
        all: bool,
    },

    /// Delete a recording
    Delete {
        /// Recording file
        file: String,
    },
}

#[derive(Args)]
struct PlayArgs {
    /// Recording file, in the recordings directory or a path
    file: String,

    /// Number of full passes
    #[arg(short, long, default_value = "1")]
    repeat: u32,

    /// Seconds between passes
    #[arg(short, long, default_value = "1.0")]
    delay: f64,

    /// Playback speed (1.0 = realtime, 2.0 = 2x)
    #[arg(short, long, default_value = "1.0")]
    speed: f64,

    /// Seconds before the first event
    #[arg(long, default_value = "5")]
    countdown: u64,

    /// Play on a different screen size without asking
    #[arg(short, long)]
    yes: bool,

    /// Log actions instead of injecting them
    #[arg(long)]
    dry_run: bool,

    /// Screen size to pretend for a dry run, e.g. 1920x1080
    #[arg(long, value_parser = parse_resolution)]
    screen: Option<Resolution>,
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let result = RecordingStorage::with_dir(&cli.dir)
        .map_err(anyhow::Error::from)
        .and_then(|storage| match cli.command {
            Commands::Record { name, countdown } => record(&storage, name.as_deref(), countdown),
            Commands::Play(args) => play(&storage, args),
            Commands::List => list(&storage),
            Commands::Show { file, all } => show(&storage, &file, all),
            Commands::Delete { file } => delete(&storage, &file),
        });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        if let Some(err) = e.downcast_ref::<Error>() {
            for s in &err.suggestions {
                eprintln!("  hint: {}", s);
            }
        }
        std::process::exit(1);
    }
}

fn parse_resolution(s: &str) -> std::result::Result<Resolution, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let w: u32 = w.trim().parse().map_err(|_| format!("bad width '{}'", w))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("bad height '{}'", h))?;
    let r = Resolution::new(w, h);
    if !r.is_valid() {
        return Err("width and height must be positive".into());
    }
    Ok(r)
}

/// A bare name is looked up in the recordings directory, anything else is a path
fn load_recording(storage: &RecordingStorage, file: &str) -> Result<RecordingMetadata> {
    let recording = if storage.path().join(file).is_file() {
        storage.load(file)?
    } else {
        storage.load_path(Path::new(file))?
    };
    Ok(recording)
}

// ── Backends ────────────────────────────────────────────────────────────────

#[cfg(feature = "native")]
fn native_hook() -> Result<(Arc<dyn ScreenMetrics>, Box<dyn InputHook>)> {
    Ok((Arc::new(native::Screen), Box::new(native::Hook::new())))
}

#[cfg(not(feature = "native"))]
fn native_hook() -> Result<(Arc<dyn ScreenMetrics>, Box<dyn InputHook>)> {
    Err(native_missing("recording").into())
}

#[cfg(feature = "native")]
fn native_injector() -> Result<(Arc<dyn ScreenMetrics>, Box<dyn InputInjector>)> {
    Ok((Arc::new(native::Screen), Box::new(native::Injector)))
}

#[cfg(not(feature = "native"))]
fn native_injector() -> Result<(Arc<dyn ScreenMetrics>, Box<dyn InputInjector>)> {
    Err(native_missing("playback").into())
}

#[cfg(not(feature = "native"))]
fn native_missing(what: &str) -> Error {
    Error::unsupported(format!("{} needs a build with the `native` feature", what)).with_suggestions(vec![
        "cargo install autostep --features native".into(),
        "use `play --dry-run` to preview a recording".into(),
    ])
}

// ── Commands ────────────────────────────────────────────────────────────────

fn record(storage: &RecordingStorage, name: Option<&str>, countdown: u64) -> Result<()> {
    let (screen, mut hook) = native_hook()?;
    let config = RecorderConfig {
        countdown: Duration::from_secs(countdown),
        ..Default::default()
    };
    let session = RecordingSession::with_config(screen, config);
    let updates = session.updates();

    session.arm()?;
    let s = session.clone();
    ctrlc::set_handler(move || {
        if s.cancel_countdown().is_err() {
            let _ = s.stop();
        }
    })?;

    session.attach(hook.as_mut())?;
    println!(
        "Recording starts in {} seconds. Esc stops, F9 pauses, Ctrl+C aborts.",
        countdown
    );
    if !session.wait_countdown()? {
        hook.stop();
        tracing::info!("recording countdown cancelled");
        println!("Recording cancelled.");
        return Ok(());
    }

    let recording = loop {
        match updates.recv_timeout(Duration::from_millis(250)) {
            Ok(RecordingUpdate::Finished(m)) => break m,
            Ok(RecordingUpdate::State(RecordingState::Active)) => println!("Recording..."),
            Ok(RecordingUpdate::State(RecordingState::Paused)) => println!("\nPaused (F9 to resume)"),
            Ok(RecordingUpdate::State(RecordingState::Idle)) => {
                hook.stop();
                println!("\nRecording discarded.");
                return Ok(());
            }
            Ok(_) => {}
            Err(RecvTimeoutError::Timeout) => {
                print!("\r{} events", session.event_count());
                io::stdout().flush()?;
            }
            Err(RecvTimeoutError::Disconnected) => bail!("recording session went away"),
        }
    };
    hook.stop();

    println!("\n{} events recorded", recording.events.len());
    let path = storage.save(&recording, name)?;
    println!("Saved: {}", path.display());
    Ok(())
}

fn play(storage: &RecordingStorage, args: PlayArgs) -> Result<()> {
    let recording = load_recording(storage, &args.file)?;
    let options = PlaybackOptions::new(args.repeat, args.delay).speed(args.speed);
    let config = PlaybackConfig {
        countdown: Duration::from_secs(args.countdown),
        ..Default::default()
    };

    let (screen, injector): (Arc<dyn ScreenMetrics>, Box<dyn InputInjector>) = if args.dry_run {
        let resolution = args.screen.unwrap_or_else(|| recording.resolution());
        (Arc::new(FixedScreen(resolution)), Box::new(LogInjector::new()))
    } else {
        native_injector()?
    };

    let session = Arc::new(PlaybackSession::with_config(recording, options, screen, config)?);
    let updates = session.updates();
    println!(
        "Playing {} ({} events, {:.1}s) x{} at {}x speed",
        args.file,
        session.recording().events.len(),
        session.recording().duration(),
        args.repeat,
        args.speed
    );

    let yes = args.yes;
    if let Err(e) = session.start(injector, |m| yes || confirm_mismatch(m)) {
        if e.code == ErrorCode::ResolutionMismatch {
            tracing::info!(file = %args.file, "playback declined on resolution mismatch");
            println!("Playback cancelled.");
            return Ok(());
        }
        return Err(e.into());
    }
    println!("Starting in {} seconds... (p + Enter pauses, q + Enter stops)", args.countdown);

    let s = session.clone();
    ctrlc::set_handler(move || {
        let _ = s.cancel();
    })?;
    spawn_controls(session.clone());

    for update in updates.iter() {
        match update {
            PlaybackUpdate::State(PlaybackState::Paused) => println!("Paused"),
            PlaybackUpdate::State(PlaybackState::Playing) => println!("Playing"),
            PlaybackUpdate::CycleStarted { cycle, total } => println!("Cycle {}/{}", cycle, total),
            PlaybackUpdate::WaitingBetweenCycles { seconds } => {
                println!("Next cycle in {:.1}s", seconds)
            }
            PlaybackUpdate::Finished(_) | PlaybackUpdate::Cancelled(_) => break,
            _ => {}
        }
    }

    let outcome = session.wait()?;
    let stats = outcome.stats;
    tracing::info!(
        state = ?outcome.state,
        cycles = stats.cycles_completed,
        failures = stats.failures,
        dry_run = args.dry_run,
        "playback ended"
    );
    match outcome.state {
        PlaybackState::Finished => println!("Done!"),
        _ => println!("Playback cancelled."),
    }
    println!(
        "{} moves, {} clicks, {} keys, {} failed, {}/{} cycles",
        stats.moves, stats.buttons, stats.keys, stats.failures, stats.cycles_completed, args.repeat
    );
    Ok(())
}

fn confirm_mismatch(m: &ResolutionMismatch) -> bool {
    print!(
        "Recorded at {} but this screen is {}. Positions will be scaled. Continue? [y/N] ",
        m.recorded, m.current
    );
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

/// `p` toggles pause, `q` cancels. The thread dies with the process.
fn spawn_controls(session: Arc<PlaybackSession>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "p" => {
                    if let Err(e) = session.toggle_pause() {
                        eprintln!("{}", e);
                    }
                }
                "q" => {
                    let _ = session.cancel();
                    break;
                }
                _ => {}
            }
        }
    });
}

fn list(storage: &RecordingStorage) -> Result<()> {
    let files = storage.list()?;

    if files.is_empty() {
        println!("No recordings saved.");
    } else {
        for f in files {
            println!("{}", f);
        }
    }

    Ok(())
}

fn show(storage: &RecordingStorage, file: &str, all: bool) -> Result<()> {
    let recording = load_recording(storage, file)?;
    let summary = recording.summary();

    println!("File: {}", file);
    println!("Screen: {}", recording.resolution());
    println!("Duration: {:.2}s", recording.duration());
    println!("Events: {}", recording.events.len());

    println!("\nSummary:");
    println!("  Moves: {}", summary.moves);
    println!("  Clicks: {}", summary.buttons);
    println!("  Key presses: {}", summary.key_downs);
    println!("  Key releases: {}", summary.key_ups);

    if all {
        println!("\nEvents:");
        for (i, e) in recording.events.iter().enumerate() {
            println!("{}: {}", i, serde_json::to_string(e)?);
        }
    }

    Ok(())
}

fn delete(storage: &RecordingStorage, file: &str) -> Result<()> {
    storage.delete(file)?;
    println!("Deleted: {}", file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_screen_sizes() {
        assert_eq!(parse_resolution("1920x1080").unwrap(), Resolution::new(1920, 1080));
        assert_eq!(parse_resolution("800X600").unwrap(), Resolution::new(800, 600));
        assert!(parse_resolution("1920").is_err());
        assert!(parse_resolution("0x600").is_err());
        assert!(parse_resolution("axb").is_err());
    }

    #[test]
    fn cli_parses_play_flags() {
        let cli = Cli::try_parse_from([
            "autostep", "--dir", "/tmp/r", "play", "a.json", "-r", "3", "-d", "0.5", "--dry-run",
            "--screen", "1280x720",
        ])
        .unwrap();
        assert_eq!(cli.dir, PathBuf::from("/tmp/r"));
        match cli.command {
            Commands::Play(args) => {
                assert_eq!(args.repeat, 3);
                assert_eq!(args.delay, 0.5);
                assert!(args.dry_run);
                assert_eq!(args.screen, Some(Resolution::new(1280, 720)));
                assert_eq!(args.countdown, 5);
            }
            _ => panic!("expected play"),
        }
    }
}
