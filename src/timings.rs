// src/timings.rs - Word timecode ingestion
//
// Accepts either a bare array of segments or an object with a `segments`
// array. Each segment carries `words: [{ word, start, end }]`. Characters of a
// word are spread evenly over `[start, end)` and followed by a space at `end`.

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unknown timing format: expected a segment array or an object with `segments`")]
    UnknownFormat,
}

/// One character and the playback time it appears at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedChar {
    pub ch: char,
    pub time: f64,
}

impl TimedChar {
    pub fn new(ch: char, time: f64) -> Self {
        Self { ch, time }
    }
}

#[derive(Debug, Deserialize)]
struct WordTiming {
    #[serde(default)]
    word: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
}

#[derive(Debug, Deserialize)]
struct Segment {
    #[serde(default)]
    words: Vec<WordTiming>,
}

/// Flattens word timecodes into a time-sorted character stream.
pub fn parse_timings(json: &str) -> Result<Vec<TimedChar>, TimingsError> {
    let document: Value = serde_json::from_str(json)?;
    let segments = match document {
        Value::Array(segments) => Value::Array(segments),
        Value::Object(mut object) => object
            .remove("segments")
            .ok_or(TimingsError::UnknownFormat)?,
        _ => return Err(TimingsError::UnknownFormat),
    };
    let segments: Vec<Segment> = serde_json::from_value(segments)?;

    let mut chars = Vec::new();
    let mut skipped = 0usize;
    for word in segments.iter().flat_map(|segment| &segment.words) {
        let len = word.word.chars().count();
        if len == 0 || !word.start.is_finite() || !word.end.is_finite() || word.end <= word.start {
            skipped += 1;
            continue;
        }
        let step = (word.end - word.start) / len as f64;
        for (i, ch) in word.word.chars().enumerate() {
            chars.push(TimedChar::new(ch, word.start + i as f64 * step));
        }
        chars.push(TimedChar::new(' ', word.end));
    }
    if skipped > 0 {
        tracing::debug!("Skipped {} words with empty text or no duration", skipped);
    }

    chars.sort_by(|a, b| a.time.total_cmp(&b.time));
    Ok(chars)
}

pub fn load_timings<P: AsRef<Path>>(path: P) -> Result<Vec<TimedChar>, TimingsError> {
    let path = path.as_ref();
    tracing::info!("Loading word timings from {}", path.display());
    let contents = std::fs::read_to_string(path)?;
    let chars = parse_timings(&contents)?;
    tracing::info!("Loaded {} characters", chars.len());
    Ok(chars)
}
