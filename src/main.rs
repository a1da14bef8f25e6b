// src/main.rs - Typewriter host: plays word timings and pulses motors in sync
use std::path::PathBuf;

use clap::Parser;
use kinetype::config::{Config, load_config};
use kinetype::hardware::{HardwareSink, LoggingSink, NullSink};
use kinetype::playback::{self, CharacterFeed, Playback};
use kinetype::scheduler::Scheduler;
use kinetype::scheduler::time_interface::MonotonicClock;
use kinetype::timings;

#[derive(Parser, Debug)]
#[command(name = "typewriter-host", version, about = "Pulse typewriter motors in time with word timecodes")]
struct Args {
    /// JSON file with word timecodes
    #[arg(long)]
    words: PathBuf,

    /// TOML configuration file; defaults are used if it does not exist
    #[arg(long, default_value = "typewriter.toml")]
    config: PathBuf,

    /// Drive the motor boards instead of the silent sink
    #[arg(long)]
    motors: bool,

    /// Suppress retriggers within the configured cooldown window
    #[arg(long)]
    debounce: bool,

    /// Scheduler ticks per second
    #[arg(long)]
    tick_hz: Option<f64>,

    /// Stop after this many seconds of playback
    #[arg(long)]
    duration: Option<f64>,

    /// Seed for activation hold times
    #[arg(long)]
    seed: Option<u64>,

    /// Print the flattened character timings and exit
    #[arg(long)]
    print_timings: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    tracing::info!("Starting typewriter host {}", env!("CARGO_PKG_VERSION"));

    let chars = timings::load_timings(&args.words).map_err(|e| {
        tracing::error!("Failed to load word timings from '{}': {}", args.words.display(), e);
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;

    if args.print_timings {
        for timed in &chars {
            println!("{:>9.3}  {:?}", timed.time, timed.ch);
        }
        return Ok(());
    }

    let mut config = if args.config.exists() {
        tracing::info!("Loading configuration from: {}", args.config.display());
        load_config(&args.config).map_err(|e| {
            tracing::error!("Failed to load config from '{}': {}", args.config.display(), e);
            Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
        })?
    } else {
        tracing::info!("No configuration at {}, using defaults", args.config.display());
        Config::default()
    };

    if args.debounce {
        config.scheduler.debounce = true;
    }
    if let Some(seed) = args.seed {
        config.scheduler.seed = Some(seed);
    }
    if let Some(tick_hz) = args.tick_hz {
        config.playback.tick_hz = tick_hz;
    }
    if let Some(duration) = args.duration {
        config.playback.duration = Some(duration);
    }
    config.validate().map_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;

    let sink: Box<dyn HardwareSink> = if args.motors {
        Box::new(LoggingSink::new(config.hardware.layout()))
    } else {
        tracing::info!("Motor output disabled, scheduling without hardware");
        Box::new(NullSink)
    };

    let scheduler = Scheduler::new(config.scheduler.clone(), sink)?;
    let mut typewriter = Playback::new(CharacterFeed::new(chars), scheduler);
    let clock = MonotonicClock::start();

    let summary = playback::run(&mut typewriter, &clock, &config.playback).await;

    let stats = summary.stats;
    tracing::info!(
        "Played {:.1}s in {} ticks: {} chars, {} activations ({} retriggers, {} debounced), {} deactivations",
        summary.playback_time,
        summary.ticks,
        summary.revealed,
        stats.activations,
        stats.extended,
        stats.debounced,
        stats.deactivations
    );
    if stats.hardware_faults > 0 {
        tracing::warn!("{} motor hardware faults during playback", stats.hardware_faults);
    }
    if stats.overflowed + stats.invalid_time > 0 {
        tracing::warn!(
            "Dropped {} activations ({} queue overflow, {} invalid time)",
            stats.overflowed + stats.invalid_time,
            stats.overflowed,
            stats.invalid_time
        );
    }

    Ok(())
}
