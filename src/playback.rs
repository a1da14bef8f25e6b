//! Playback-time character dispatch.
//!
//! [`CharacterFeed`] reveals characters as the playback clock passes their
//! timecodes; [`Playback::step`] hands each newly revealed character to the
//! scheduler and ticks it. [`run`] drives `step` from a tokio interval until
//! the text has played out or Ctrl-C arrives.

use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::config::PlaybackConfig;
use crate::hardware::HardwareSink;
use crate::scheduler::time_interface::PlaybackClock;
use crate::scheduler::{Scheduler, SchedulerStats, TickReport};
use crate::timings::TimedChar;

/// Seconds between progress log lines in [`run`].
const REPORT_INTERVAL: f64 = 5.0;
/// Loop rate used when the configured one cannot be turned into a period.
const FALLBACK_TICK_HZ: f64 = 15.0;

/// Time-sorted characters with a cursor marking how far playback has got.
#[derive(Debug, Clone, Default)]
pub struct CharacterFeed {
    chars: Vec<TimedChar>,
    cursor: usize,
    revealed: String,
}

impl CharacterFeed {
    /// Characters with non-finite times are dropped; the rest are stably
    /// sorted by time.
    pub fn new(mut chars: Vec<TimedChar>) -> Self {
        chars.retain(|c| c.time.is_finite());
        chars.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self {
            chars,
            cursor: 0,
            revealed: String::new(),
        }
    }

    /// Returns every character not yet revealed whose time is at or before
    /// `now`. Each character is returned exactly once.
    pub fn advance(&mut self, now: f64) -> &[TimedChar] {
        let start = self.cursor;
        while let Some(next) = self.chars.get(self.cursor) {
            if next.time > now {
                break;
            }
            self.revealed.push(next.ch);
            self.cursor += 1;
        }
        &self.chars[start..self.cursor]
    }

    /// Text revealed so far.
    pub fn revealed(&self) -> &str {
        &self.revealed
    }

    pub fn last_revealed(&self) -> Option<TimedChar> {
        self.cursor.checked_sub(1).map(|i| self.chars[i])
    }

    pub fn revealed_count(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.chars.len() - self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.cursor == self.chars.len()
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn last_time(&self) -> Option<f64> {
        self.chars.last().map(|c| c.time)
    }

    /// Time of the last character plus `tail`; `None` when there are no
    /// characters.
    pub fn end_time(&self, tail: f64) -> Option<f64> {
        self.last_time().map(|last| last + tail)
    }
}

/// Outcome of one [`Playback::step`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub revealed: usize,
    pub queued: usize,
    pub tick: TickReport,
}

/// A character feed wired to a scheduler.
pub struct Playback<S: HardwareSink> {
    feed: CharacterFeed,
    scheduler: Scheduler<S>,
}

impl<S: HardwareSink> Playback<S> {
    pub fn new(feed: CharacterFeed, scheduler: Scheduler<S>) -> Self {
        Self { feed, scheduler }
    }

    /// Queues the characters revealed by `now`, then ticks the scheduler.
    pub fn step(&mut self, now: f64) -> StepReport {
        let newly = self.feed.advance(now);
        let revealed = newly.len();
        let queued = self
            .scheduler
            .enqueue_batch(newly.iter().map(|timed| (timed.ch, timed.time)));
        if revealed > 0 {
            tracing::trace!("Revealed {} chars at {:.3}", revealed, now);
        }
        let tick = self.scheduler.tick(now);
        StepReport {
            revealed,
            queued,
            tick,
        }
    }

    pub fn feed(&self) -> &CharacterFeed {
        &self.feed
    }

    pub fn scheduler(&self) -> &Scheduler<S> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler<S> {
        &mut self.scheduler
    }

    pub fn into_parts(self) -> (CharacterFeed, Scheduler<S>) {
        (self.feed, self.scheduler)
    }
}

/// How a call to [`run`] ended.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub ticks: u64,
    pub playback_time: f64,
    pub revealed: usize,
    pub interrupted: bool,
    pub stats: SchedulerStats,
}

/// Playback time at which [`run`] stops: the configured `duration` if set,
/// else the last character plus `tail`, else `idle_duration` for an empty feed.
pub fn end_time(feed: &CharacterFeed, config: &PlaybackConfig) -> f64 {
    config
        .duration
        .or_else(|| feed.end_time(config.tail))
        .unwrap_or(config.idle_duration)
}

/// Steps `playback` at `config.tick_hz` until the end time or Ctrl-C, then
/// shuts the scheduler down so every motor is left off.
pub async fn run<S, C>(playback: &mut Playback<S>, clock: &C, config: &PlaybackConfig) -> RunSummary
where
    S: HardwareSink,
    C: PlaybackClock,
{
    let end_time = end_time(playback.feed(), config);
    if playback.feed().is_empty() && config.duration.is_none() {
        tracing::warn!("No characters to play, running for {:.1}s", end_time);
    }
    let period = config.tick_period().unwrap_or_else(|e| {
        tracing::warn!("{}, falling back to {} Hz", e, FALLBACK_TICK_HZ);
        Duration::from_secs_f64(1.0 / FALLBACK_TICK_HZ)
    });
    tracing::info!(
        "Playing {} characters until {:.1}s at {} Hz",
        playback.feed().len(),
        end_time,
        config.tick_hz
    );

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut listening = true;

    let mut ticks = 0u64;
    let mut interrupted = false;
    let mut now = clock.now();
    let mut last_report = now;
    let mut ticks_since_report = 0u64;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            result = &mut shutdown, if listening => {
                match result {
                    Ok(()) => {
                        tracing::info!("Interrupted at {:.3}s", clock.now());
                        interrupted = true;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Cannot listen for Ctrl-C: {}", e);
                        listening = false;
                        continue;
                    }
                }
            }
        }

        now = clock.now();
        let step = playback.step(now);
        ticks += 1;
        ticks_since_report += 1;
        if !step.tick.is_empty() {
            tracing::trace!(
                "t={:.3} on={:?} off={:?} debounced={:?}",
                now,
                step.tick.energized,
                step.tick.de_energized,
                step.tick.debounced
            );
        }

        if now - last_report >= REPORT_INTERVAL {
            let scheduler = playback.scheduler();
            tracing::info!(
                "t={:.1}s: {:.1} ticks/s, {}/{} chars, {} pending, {} active",
                now,
                ticks_since_report as f64 / (now - last_report),
                playback.feed().revealed_count(),
                playback.feed().len(),
                scheduler.pending(),
                scheduler.active_count()
            );
            last_report = now;
            ticks_since_report = 0;
        }

        if now >= end_time {
            tracing::info!("Playback complete at {:.3}s", now);
            break;
        }
    }

    playback.scheduler_mut().shutdown();
    RunSummary {
        ticks,
        playback_time: now,
        revealed: playback.feed().revealed_count(),
        interrupted,
        stats: playback.scheduler().stats(),
    }
}
