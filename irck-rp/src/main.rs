//! irck-rp - IR record/playback service entry point
//!
//! Records infrared remote codes into a persisted library and plays them
//! back as carrier-modulated waveforms. Hardware access goes through the
//! hal capability traits; this binary wires in the deterministic `sim`
//! backend, with real GPIO backends plugging into the same seams.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use irck_common::events::{EventBus, IrEvent};
use irck_rp::config::{ConfigOverrides, TomlConfig};
use irck_rp::hal::mock::{demo_gaps, press, MockEdgeSource, MockOutputLine};
use irck_rp::{normalize, store, CommandOutcome, Session};

/// Command-line arguments for irck-rp
#[derive(Parser, Debug)]
#[command(name = "irck-rp")]
#[command(about = "IR remote code recorder and player")]
#[command(version)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "irck.toml", env = "IRCK_CONFIG")]
    config: PathBuf,

    /// Override the code library path
    #[arg(short, long, env = "IRCK_LIBRARY")]
    library: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record one code per command name, in order
    Record {
        /// Command names to record
        #[arg(required = true)]
        commands: Vec<String>,
    },

    /// Play back a recorded command
    Play {
        command: String,

        /// Delay before emission, milliseconds
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,
    },

    /// Re-run cross-library normalization on the stored library
    Tidy,

    /// List the commands stored in the library
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load_or_default(&args.config)
        .await
        .context("Failed to load configuration")?
        .apply(ConfigOverrides {
            library_path: args.library,
        });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "irck_rp={0},irck_common={0}",
                    config.logging.level
                ))
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match args.command {
        Command::Record { commands } => record(config, commands).await,
        Command::Play { command, delay_ms } => play(config, &command, delay_ms).await,
        Command::Tidy => tidy(config).await,
        Command::List => list(config).await,
    }
}

async fn record(config: TomlConfig, commands: Vec<String>) -> Result<()> {
    let events = EventBus::new(128);
    spawn_prompt_printer(&events);

    let edges = sim_edge_source(commands.len());
    let output = MockOutputLine::new();
    let mut session = Session::new(config, Box::new(edges), Box::new(output), events)
        .context("Failed to initialize session")?;

    info!("Recording {} commands", commands.len());
    tokio::select! {
        outcomes = session.record(&commands) => {
            for outcome in outcomes.context("Recording failed")? {
                match outcome {
                    CommandOutcome::Captured { command, pulses } => {
                        info!(%command, pulses, "captured");
                    }
                    CommandOutcome::Cancelled { command } => {
                        warn!(%command, "not captured");
                    }
                }
            }
        }
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, recording cancelled");
        }
    }
    Ok(())
}

async fn play(config: TomlConfig, command: &str, delay_ms: u64) -> Result<()> {
    let events = EventBus::new(128);
    let edges = MockEdgeSource::with_bursts(Vec::new());
    let output = MockOutputLine::busy_for(3);
    let mut session = Session::new(config, Box::new(edges), Box::new(output), events)
        .context("Failed to initialize session")?;

    let emit_at =
        (delay_ms > 0).then(|| tokio::time::Instant::now() + Duration::from_millis(delay_ms));
    session
        .play(command, emit_at)
        .await
        .with_context(|| format!("Playback of '{command}' failed"))?;

    println!("Played '{command}'");
    Ok(())
}

async fn tidy(config: TomlConfig) -> Result<()> {
    let mut library = store::load(&config.library_path)
        .await
        .context("Failed to load library")?;
    normalize::normalize_library(&mut library, config.capture.tolerance());
    store::save(&config.library_path, &library)
        .await
        .context("Failed to save library")?;
    println!("Normalized {} commands", library.len());
    Ok(())
}

async fn list(config: TomlConfig) -> Result<()> {
    let library = store::load(&config.library_path)
        .await
        .context("Failed to load library")?;
    if library.is_empty() {
        println!("Library is empty");
    }
    for (name, code) in library.iter() {
        println!(
            "{name}  ({} pulses, {})",
            code.len(),
            irck_common::time::format_micros(code.total_micros())
        );
    }
    Ok(())
}

/// Mirror session events as operator prompts on stdout.
fn spawn_prompt_printer(events: &EventBus) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                IrEvent::AwaitingPress { command, .. } => {
                    println!("Press the key for '{command}'");
                }
                IrEvent::CodeCaptured { command, pulses, .. } => {
                    println!("Okay: '{command}' ({pulses} pulses)");
                }
                IrEvent::ShortCodeRetry { .. } => {
                    println!("Short code, probably a repeat, try again");
                }
                IrEvent::LibrarySaved { commands, .. } => {
                    println!("Library saved ({commands} commands)");
                }
                _ => {}
            }
        }
    });
}

/// Scripted edge source standing in for capture hardware: one
/// deterministic key press per requested command.
fn sim_edge_source(presses: usize) -> MockEdgeSource {
    let bursts = (0..presses)
        .map(|i| press(250_000, &demo_gaps(0x20DF_10EF ^ i as u32)))
        .collect();
    MockEdgeSource::with_bursts(bursts)
}
