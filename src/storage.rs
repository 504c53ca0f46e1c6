use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::error::{EngineError, Result};
use crate::model::Sample;

/// Capacity-bounded, append-only history of one symbol.
#[derive(Debug, Clone)]
pub struct Series {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl Series {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a sample. Once full, the oldest sample is evicted and returned.
    pub fn push(&mut self, sample: Sample) -> Option<Sample> {
        self.samples.push_back(sample);
        if self.samples.len() > self.capacity {
            self.samples.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }
}

/// Fixed set of series, each behind its own lock.
///
/// The symbol map is built once and never changes, so only the per-series
/// locks are ever taken. Readers get copies, never references into a series.
pub struct SeriesStore {
    symbols: Vec<String>,
    series: HashMap<String, RwLock<Series>>,
    capacity: usize,
}

impl SeriesStore {
    pub fn new<I, S>(symbols: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered = Vec::new();
        let mut series = HashMap::new();

        for symbol in symbols {
            let symbol = symbol.into();
            if series.contains_key(&symbol) {
                continue;
            }
            series.insert(symbol.clone(), RwLock::new(Series::new(capacity)));
            ordered.push(symbol);
        }

        Self {
            symbols: ordered,
            series,
            capacity: capacity.max(1),
        }
    }

    /// Registered symbols, in registration order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.series.contains_key(symbol)
    }

    /// Appends one sample. NaN and infinite prices are rejected before the lock is taken.
    pub fn append(&self, symbol: &str, value: f64, timestamp: DateTime<Utc>) -> Result<()> {
        let lock = self.lookup(symbol)?;
        if !value.is_finite() {
            return Err(EngineError::InvalidPrice(value));
        }
        let mut series = lock.write().map_err(|_| EngineError::Poisoned(symbol.to_string()))?;
        series.push(Sample::new(value, timestamp));
        Ok(())
    }

    /// Point-in-time copy of the full history of `symbol`.
    pub fn snapshot(&self, symbol: &str) -> Result<Vec<Sample>> {
        let lock = self.lookup(symbol)?;
        let series = lock.read().map_err(|_| EngineError::Poisoned(symbol.to_string()))?;
        Ok(series.to_vec())
    }

    pub fn latest(&self, symbol: &str) -> Result<Option<Sample>> {
        let lock = self.lookup(symbol)?;
        let series = lock.read().map_err(|_| EngineError::Poisoned(symbol.to_string()))?;
        Ok(series.last().copied())
    }

    fn lookup(&self, symbol: &str) -> Result<&RwLock<Series>> {
        self.series
            .get(symbol)
            .ok_or_else(|| EngineError::UnknownSymbol(symbol.to_string()))
    }
}

impl std::fmt::Debug for SeriesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeriesStore")
            .field("symbols", &self.symbols)
            .field("capacity", &self.capacity)
            .finish()
    }
}
