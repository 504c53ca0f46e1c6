use chrono::{DateTime, Utc};
use serde::Serialize;

// Retention: 360 samples at one tick every 10s covers the last hour
pub const DEFAULT_CAPACITY: usize = 360;
pub const DEFAULT_TICK_SECS: u64 = 10;
pub const MAX_LOOKBACK_MINUTES: i64 = 60;

pub const DEFAULT_SYMBOLS: [&str; 5] = ["AAPL", "GOOGL", "TSLA", "MSFT", "AMZN"];

/// A single observation of a series. Immutable once appended.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    #[serde(rename = "price")]
    pub value: f64,

    #[serde(rename = "lastUpdatedAt")]
    pub timestamp: DateTime<Utc>,
}

impl Sample {
    pub fn new(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self { value, timestamp }
    }
}

/// Mean over a trailing window, together with the window it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowAverage {
    pub average: f64,
    pub series: Vec<Sample>,
}

/// Pearson correlation of two series after timestamp alignment.
///
/// `aligned_a` and `aligned_b` hold one sample per common timestamp, in
/// chronological order. In the degenerate case (fewer than two common
/// timestamps) everything is zeroed and both projections are empty.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationResult {
    pub correlation: f64,
    pub mean_a: f64,
    pub mean_b: f64,
    pub aligned_a: Vec<Sample>,
    pub aligned_b: Vec<Sample>,
}

impl CorrelationResult {
    pub fn degenerate() -> Self {
        Self {
            correlation: 0.0,
            mean_a: 0.0,
            mean_b: 0.0,
            aligned_a: Vec::new(),
            aligned_b: Vec::new(),
        }
    }
}

/// Mean and sample standard deviation of one series over a window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SeriesSummary {
    pub mean: f64,
    pub std_dev: f64,
}

/// Square correlation matrix over a fixed symbol set.
///
/// Rows and columns follow the order of `symbols`.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub symbols: Vec<String>,
    pub values: Vec<Vec<f64>>,
    pub summaries: Vec<SeriesSummary>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.index_of(a)?;
        let j = self.index_of(b)?;
        Some(self.values[i][j])
    }

    pub fn summary(&self, symbol: &str) -> Option<SeriesSummary> {
        self.index_of(symbol).map(|i| self.summaries[i])
    }

    fn index_of(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }
}
