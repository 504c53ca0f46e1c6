//! Mean, sample standard deviation and Pearson correlation over windowed reads.
//!
//! All estimators use Bessel's correction (`n - 1`). Results are rounded only
//! when they leave this module; intermediate sums are kept at full precision.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::{EngineError, Result};
use crate::model::{CorrelationResult, Sample, SeriesSummary};

pub const CORRELATION_DECIMALS: u32 = 4;
pub const SUMMARY_DECIMALS: u32 = 6;

/// Rounds half away from zero to `decimals` places. Never returns `-0.0`.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Arithmetic mean of the sample values, unrounded.
pub fn mean(samples: &[Sample]) -> Result<f64> {
    if samples.is_empty() {
        return Err(EngineError::EmptyWindow);
    }
    Ok(samples.iter().map(|s| s.value).sum::<f64>() / samples.len() as f64)
}

fn mean_of(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation around a precomputed mean. Needs `len >= 2`.
fn std_dev_around(values: &[f64], mean: f64) -> f64 {
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Rounded mean and standard deviation; both zero for fewer than two samples.
pub fn summarize(samples: &[Sample]) -> SeriesSummary {
    if samples.len() < 2 {
        return SeriesSummary::default();
    }
    let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    let mean = mean_of(&values);
    let std_dev = std_dev_around(&values, mean);

    SeriesSummary {
        mean: round_to(mean, SUMMARY_DECIMALS),
        std_dev: round_to(std_dev, SUMMARY_DECIMALS),
    }
}

/// Index samples by exact timestamp. A repeated timestamp keeps its last value.
fn index_by_time(samples: &[Sample]) -> BTreeMap<DateTime<Utc>, f64> {
    samples.iter().map(|s| (s.timestamp, s.value)).collect()
}

/// Projects both series onto the timestamps they share, oldest first.
pub fn align(a: &[Sample], b: &[Sample]) -> (Vec<Sample>, Vec<Sample>) {
    let index_a = index_by_time(a);
    let index_b = index_by_time(b);

    index_a
        .iter()
        .filter_map(|(ts, va)| index_b.get(ts).map(|vb| (Sample::new(*va, *ts), Sample::new(*vb, *ts))))
        .unzip()
}

/// Pearson correlation of `a` and `b` over their common timestamps.
///
/// Fewer than two common timestamps gives the zeroed degenerate result. A
/// constant side (zero standard deviation) gives correlation 0 with the means
/// and aligned series still reported.
pub fn correlate(a: &[Sample], b: &[Sample]) -> CorrelationResult {
    let (aligned_a, aligned_b) = align(a, b);
    let n = aligned_a.len();
    if n < 2 {
        return CorrelationResult::degenerate();
    }

    let xs: Vec<f64> = aligned_a.iter().map(|s| s.value).collect();
    let ys: Vec<f64> = aligned_b.iter().map(|s| s.value).collect();

    let mean_a = mean_of(&xs);
    let mean_b = mean_of(&ys);

    let covariance = xs
        .iter()
        .zip(&ys)
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum::<f64>()
        / (n - 1) as f64;
    let std_a = std_dev_around(&xs, mean_a);
    let std_b = std_dev_around(&ys, mean_b);

    let correlation = if std_a == 0.0 || std_b == 0.0 {
        0.0
    } else {
        let r = covariance / (std_a * std_b);
        if r.is_finite() { r.clamp(-1.0, 1.0) } else { 0.0 }
    };

    CorrelationResult {
        correlation: round_to(correlation, CORRELATION_DECIMALS),
        mean_a: round_to(mean_a, SUMMARY_DECIMALS),
        mean_b: round_to(mean_b, SUMMARY_DECIMALS),
        aligned_a,
        aligned_b,
    }
}
