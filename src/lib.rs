pub mod error;
pub mod model;
pub mod storage;
pub mod window;
pub mod stats;
pub mod matrix;
pub mod manager;
pub mod server;
pub mod parser;

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{EngineError, Result};
use crate::model::{CorrelationMatrix, CorrelationResult, Sample, WindowAverage, DEFAULT_CAPACITY, DEFAULT_SYMBOLS};
use crate::storage::SeriesStore;
use crate::window::Lookback;

/// In-memory store of recent prices for a fixed set of symbols, with
/// trailing-window statistics on top.
///
/// Safe to share behind an `Arc`: the ingestion thread appends while request
/// handlers query. Queries only ever work on copies of the series.
pub struct TickDb {
    store: SeriesStore,
}

impl fmt::Debug for TickDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickDb")
        .field("symbols", &self.store.symbols())
        .field("capacity", &self.store.capacity())
        .finish()
    }
}

impl Default for TickDb {
    fn default() -> Self {
        Self::new(DEFAULT_SYMBOLS, DEFAULT_CAPACITY)
    }
}

impl TickDb {
    pub fn new<I, S>(symbols: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            store: SeriesStore::new(symbols, capacity),
        }
    }

    pub fn symbols(&self) -> &[String] {
        self.store.symbols()
    }

    pub fn store(&self) -> &SeriesStore {
        &self.store
    }

    pub fn append(&self, symbol: &str, value: f64, timestamp: DateTime<Utc>) -> Result<()> {
        self.store.append(symbol, value, timestamp)
    }

    pub fn snapshot(&self, symbol: &str) -> Result<Vec<Sample>> {
        self.store.snapshot(symbol)
    }

    // --- QUERIES ---

    /// Mean price of `symbol` over the last `minutes`, with the window itself.
    /// An empty window averages to 0.
    pub fn window_average(&self, symbol: &str, minutes: i64, now: DateTime<Utc>) -> Result<WindowAverage> {
        let lookback = Lookback::new(minutes)?;
        let series = window::read(&self.store, symbol, lookback, now)?;

        let average = match stats::mean(&series) {
            Ok(mean) => stats::round_to(mean, stats::SUMMARY_DECIMALS),
            Err(EngineError::EmptyWindow) => 0.0,
            Err(e) => return Err(e),
        };

        Ok(WindowAverage { average, series })
    }

    pub fn correlation(&self, a: &str, b: &str, minutes: i64, now: DateTime<Utc>) -> Result<CorrelationResult> {
        let lookback = Lookback::new(minutes)?;
        let window_a = window::read(&self.store, a, lookback, now)?;
        let window_b = window::read(&self.store, b, lookback, now)?;
        Ok(stats::correlate(&window_a, &window_b))
    }

    /// Matrix over every registered symbol.
    pub fn correlation_matrix(&self, minutes: i64, now: DateTime<Utc>) -> Result<CorrelationMatrix> {
        let lookback = Lookback::new(minutes)?;
        matrix::build_matrix(&self.store, self.store.symbols(), lookback, now)
    }
}
