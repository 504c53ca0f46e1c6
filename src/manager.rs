use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::stats::round_to;
use crate::TickDb;

/// Where new prices come from on every tick.
///
/// Returning `None` means the source has nothing for `symbol` this tick
/// (slow or failed fetch). The tick simply skips that symbol.
pub trait PriceSource {
    fn next_price(&mut self, symbol: &str, last: Option<f64>) -> Option<f64>;
}

/// Mock feed: a uniform random walk with steps in [-10, 10).
///
/// The first price of a symbol is drawn uniformly from [0, 1000).
pub struct RandomWalk {
    rng: StdRng,
}

impl RandomWalk {
    pub fn new() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl Default for RandomWalk {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceSource for RandomWalk {
    fn next_price(&mut self, _symbol: &str, last: Option<f64>) -> Option<f64> {
        let base = last.unwrap_or_else(|| self.rng.gen::<f64>() * 1000.0);
        let change = (self.rng.gen::<f64>() - 0.5) * 20.0;
        Some(round_to(base + change, 4))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub appended: usize,
    pub skipped: usize,
}

/// Pushes one sample per symbol, all stamped with the same `now`.
///
/// A shared timestamp per tick is what lets independently updated series
/// line up exactly when correlated.
pub fn ingest_tick<S: PriceSource + ?Sized>(db: &TickDb, source: &mut S, now: DateTime<Utc>) -> TickReport {
    let mut report = TickReport::default();

    for symbol in db.symbols() {
        let last = match db.store().latest(symbol) {
            Ok(sample) => sample.map(|s| s.value),
            Err(e) => {
                warn!("[INGEST] Could not read last price of {}: {}", symbol, e);
                report.skipped += 1;
                continue;
            }
        };

        let Some(price) = source.next_price(symbol, last) else {
            debug!("[INGEST] No price for {} this tick", symbol);
            report.skipped += 1;
            continue;
        };

        match db.append(symbol, price, now) {
            Ok(()) => report.appended += 1,
            Err(EngineError::InvalidPrice(price)) => {
                debug!("[INGEST] Dropping non-finite price {} for {}", price, symbol);
                report.skipped += 1;
            }
            Err(e) => {
                warn!("[INGEST] Append to {} failed: {}", symbol, e);
                report.skipped += 1;
            }
        }
    }
    report
}

/// Starts the background ingestion thread.
/// Sleeps `interval` then ingests one tick, forever.
pub fn start_ingest_thread<S>(db: Arc<TickDb>, mut source: S, interval: Duration) -> JoinHandle<()>
where
    S: PriceSource + Send + 'static,
{
    thread::spawn(move || {
        info!("[INGEST] Background ingestion thread started ({}s interval).", interval.as_secs_f64());
        loop {
            thread::sleep(interval);

            let report = ingest_tick(&db, &mut source, Utc::now());
            debug!(appended = report.appended, skipped = report.skipped, "[INGEST] Tick complete");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn db() -> TickDb {
        TickDb::new(["AAPL", "MSFT", "TSLA"], 3)
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    /// Replays fixed prices; symbols without an entry report no sample.
    struct Scripted(HashMap<&'static str, f64>);

    impl PriceSource for Scripted {
        fn next_price(&mut self, symbol: &str, _last: Option<f64>) -> Option<f64> {
            self.0.get(symbol).copied()
        }
    }

    #[test]
    fn test_tick_appends_one_sample_per_symbol_with_shared_timestamp() {
        let db = db();
        let mut source = RandomWalk::seeded(7);

        let report = ingest_tick(&db, &mut source, ts(0));
        assert_eq!(report, TickReport { appended: 3, skipped: 0 });

        for symbol in ["AAPL", "MSFT", "TSLA"] {
            let snap = db.snapshot(symbol).unwrap();
            assert_eq!(snap.len(), 1);
            assert_eq!(snap[0].timestamp, ts(0));
        }
    }

    #[test]
    fn test_ticks_respect_capacity() {
        let db = db();
        let mut source = RandomWalk::seeded(1);
        for i in 0..5 {
            ingest_tick(&db, &mut source, ts(i * 10));
        }
        let snap = db.snapshot("AAPL").unwrap();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].timestamp, ts(20));
    }

    #[test]
    fn test_missing_price_skips_symbol() {
        let db = db();
        let mut source = Scripted(HashMap::from([("AAPL", 10.0), ("TSLA", 30.0)]));

        let report = ingest_tick(&db, &mut source, ts(0));
        assert_eq!(report, TickReport { appended: 2, skipped: 1 });
        assert!(db.snapshot("MSFT").unwrap().is_empty());
        assert_eq!(db.snapshot("TSLA").unwrap()[0].value, 30.0);
    }

    #[test]
    fn test_non_finite_price_skips_symbol() {
        let db = db();
        let mut source = Scripted(HashMap::from([("AAPL", 1.0), ("MSFT", 2.0), ("TSLA", 3.0)]));
        ingest_tick(&db, &mut source, ts(0));

        let mut source = Scripted(HashMap::from([("AAPL", f64::NAN), ("MSFT", f64::INFINITY), ("TSLA", 5.0)]));
        let report = ingest_tick(&db, &mut source, ts(10));
        assert_eq!(report, TickReport { appended: 1, skipped: 2 });

        let mut source = Scripted(HashMap::from([("AAPL", 3.0), ("MSFT", 4.0), ("TSLA", 7.0)]));
        ingest_tick(&db, &mut source, ts(20));

        let aapl = db.snapshot("AAPL").unwrap();
        assert_eq!(aapl.iter().map(|s| s.value).collect::<Vec<_>>(), vec![1.0, 3.0]);

        let avg = db.window_average("AAPL", 5, ts(20)).unwrap();
        assert_eq!(avg.average, 2.0);

        let m = db.correlation_matrix(5, ts(20)).unwrap();
        for symbol in ["AAPL", "MSFT", "TSLA"] {
            let s = m.summary(symbol).unwrap();
            assert!(s.mean.is_finite() && s.std_dev.is_finite(), "{}", symbol);
        }
        assert_eq!(m.summary("AAPL").unwrap().mean, 2.0);
    }

    #[test]
    fn test_random_walk_steps_are_bounded() {
        let mut walk = RandomWalk::seeded(42);
        let first = walk.next_price("AAPL", None).unwrap();
        assert!((-10.0..1010.0).contains(&first));

        let mut last = first;
        for _ in 0..1_000 {
            let next = walk.next_price("AAPL", Some(last)).unwrap();
            assert!((next - last).abs() <= 10.0 + 1e-4);
            assert_eq!(next, round_to(next, 4));
            last = next;
        }
    }

    #[test]
    fn test_random_walk_seed_is_reproducible() {
        let mut a = RandomWalk::seeded(99);
        let mut b = RandomWalk::seeded(99);
        for _ in 0..10 {
            assert_eq!(a.next_price("X", Some(100.0)), b.next_price("X", Some(100.0)));
        }
    }
}
