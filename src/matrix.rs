use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::Result;
use crate::model::{CorrelationMatrix, Sample};
use crate::stats;
use crate::storage::SeriesStore;
use crate::window::{self, Lookback};

/// Correlation of every symbol pair plus per-symbol mean and standard deviation.
///
/// Each symbol's window is read once, so the whole matrix reflects a single
/// snapshot per series. Each unordered pair is correlated once and mirrored;
/// `correlate(a, b)` and `correlate(b, a)` align on the same chronological
/// timestamps and multiply the same terms, so the result is bit-identical to
/// computing both orders. The diagonal is fixed at 1.0.
pub fn build_matrix(
    store: &SeriesStore,
    symbols: &[String],
    lookback: Lookback,
    now: DateTime<Utc>,
) -> Result<CorrelationMatrix> {
    let windows = symbols
        .iter()
        .map(|symbol| window::read(store, symbol, lookback, now))
        .collect::<Result<Vec<Vec<Sample>>>>()?;

    let n = symbols.len();
    let mut values = vec![vec![0.0; n]; n];

    for i in 0..n {
        values[i][i] = 1.0;
        for j in (i + 1)..n {
            let r = stats::correlate(&windows[i], &windows[j]).correlation;
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    let summaries = windows.iter().map(|w| stats::summarize(w)).collect();

    debug!(
        symbols = n,
        lookback = lookback.minutes(),
        samples = windows.iter().map(Vec::len).sum::<usize>(),
        "built correlation matrix"
    );

    Ok(CorrelationMatrix {
        symbols: symbols.to_vec(),
        values,
        summaries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::model::SeriesSummary;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_003_600, 0).unwrap()
    }

    fn symbols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    /// Appends `rows[k][i]` to symbol `i` at tick `k`, ticks 10s apart ending at `now`.
    fn store_with(names: &[&str], rows: &[Vec<f64>]) -> SeriesStore {
        let store = SeriesStore::new(names.iter().copied(), 360);
        let ticks = rows.len() as i64;
        for (k, row) in rows.iter().enumerate() {
            let ts = now() - Duration::seconds((ticks - 1 - k as i64) * 10);
            for (name, v) in names.iter().zip(row) {
                store.append(name, *v, ts).unwrap();
            }
        }
        store
    }

    fn sample_store() -> SeriesStore {
        store_with(
            &["AAPL", "MSFT", "TSLA"],
            &[
                vec![1.0, 2.0, 9.0],
                vec![3.0, 4.0, 4.0],
                vec![5.0, 6.0, 7.0],
                vec![4.0, 5.0, 1.0],
                vec![6.0, 7.0, 3.0],
            ],
        )
    }

    #[test]
    fn test_diagonal_is_one() {
        let names = symbols(&["AAPL", "MSFT", "TSLA"]);
        let m = build_matrix(&sample_store(), &names, Lookback::new(60).unwrap(), now()).unwrap();
        for s in &names {
            assert_eq!(m.get(s, s), Some(1.0));
        }
    }

    #[test]
    fn test_diagonal_is_one_even_without_data() {
        let store = SeriesStore::new(["AAPL", "MSFT"], 10);
        let names = symbols(&["AAPL", "MSFT"]);
        let m = build_matrix(&store, &names, Lookback::new(5).unwrap(), now()).unwrap();
        assert_eq!(m.values, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(m.summaries, vec![SeriesSummary::default(); 2]);
    }

    #[test]
    fn test_matches_pairwise_correlate() {
        let store = sample_store();
        let names = symbols(&["AAPL", "MSFT", "TSLA"]);
        let lookback = Lookback::new(60).unwrap();
        let m = build_matrix(&store, &names, lookback, now()).unwrap();

        for a in &names {
            for b in &names {
                if a == b {
                    continue;
                }
                let wa = window::read(&store, a, lookback, now()).unwrap();
                let wb = window::read(&store, b, lookback, now()).unwrap();
                assert_eq!(m.get(a, b), Some(stats::correlate(&wa, &wb).correlation));
            }
        }
        // AAPL and MSFT move in lockstep
        assert_eq!(m.get("AAPL", "MSFT"), Some(1.0));
    }

    #[test]
    fn test_summaries() {
        let m = build_matrix(
            &sample_store(),
            &symbols(&["AAPL", "MSFT", "TSLA"]),
            Lookback::new(60).unwrap(),
            now(),
        )
        .unwrap();

        let aapl = m.summary("AAPL").unwrap();
        assert_eq!(aapl.mean, 3.8);
        assert_eq!(aapl.std_dev, stats::round_to(1.9235384061671346, 6));
        assert_eq!(m.summary("NFLX"), None);
    }

    #[test]
    fn test_respects_lookback() {
        // ticks are 10s apart; a 1 minute window keeps the last 7 of 10
        let rows: Vec<Vec<f64>> = (0..10).map(|k| vec![k as f64, if k < 3 { 100.0 } else { 5.0 }]).collect();
        let store = store_with(&["AAPL", "MSFT"], &rows);
        let names = symbols(&["AAPL", "MSFT"]);

        let wide = build_matrix(&store, &names, Lookback::new(60).unwrap(), now()).unwrap();
        let narrow = build_matrix(&store, &names, Lookback::new(1).unwrap(), now()).unwrap();

        assert!(wide.get("AAPL", "MSFT").unwrap() < 0.0);
        // MSFT is constant inside the narrow window
        assert_eq!(narrow.get("AAPL", "MSFT"), Some(0.0));
        assert_eq!(narrow.summary("MSFT").unwrap(), SeriesSummary { mean: 5.0, std_dev: 0.0 });
    }

    #[test]
    fn test_unknown_symbol() {
        let names = symbols(&["AAPL", "NFLX"]);
        assert_eq!(
            build_matrix(&sample_store(), &names, Lookback::new(10).unwrap(), now()),
            Err(EngineError::UnknownSymbol("NFLX".into()))
        );
    }
}
