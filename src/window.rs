//! Trailing time-window reads over the series store.

use chrono::{DateTime, Duration, Utc};

use crate::error::{EngineError, Result};
use crate::model::{Sample, MAX_LOOKBACK_MINUTES};
use crate::storage::SeriesStore;

/// A validated lookback, in whole minutes, within `1..=MAX_LOOKBACK_MINUTES`.
///
/// Anything longer cannot be served faithfully since older samples have
/// already been evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lookback(u32);

impl Lookback {
    pub fn new(minutes: i64) -> Result<Self> {
        if minutes <= 0 || minutes > MAX_LOOKBACK_MINUTES {
            return Err(EngineError::InvalidWindow(minutes.to_string()));
        }
        Ok(Self(minutes as u32))
    }

    /// Parses a raw query value such as `"15"`.
    pub fn parse(raw: &str) -> Result<Self> {
        let minutes = raw
            .trim()
            .parse::<i64>()
            .map_err(|_| EngineError::InvalidWindow(raw.to_string()))?;
        Self::new(minutes)
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(i64::from(self.0) * 60)
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }
}

/// Samples of `symbol` with `timestamp >= now - lookback`, oldest first.
///
/// Filters the whole snapshot rather than trimming a prefix, so a clock step
/// backwards during ingestion cannot leak stale samples into the window.
pub fn read(store: &SeriesStore, symbol: &str, lookback: Lookback, now: DateTime<Utc>) -> Result<Vec<Sample>> {
    let cutoff = lookback.cutoff(now);
    let mut samples = store.snapshot(symbol)?;
    samples.retain(|s| s.timestamp >= cutoff);
    Ok(samples)
}
