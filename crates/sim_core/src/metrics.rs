//! Scalar summaries extracted from trajectories.

use serde::Serialize;
use std::collections::BTreeMap;

/// Decimal places used for headline metric values in summaries.
pub const VALUE_DECIMALS: usize = 4;
/// Decimal places used for times in summaries.
pub const TIME_DECIMALS: usize = 2;

/// Named scalar metrics plus a one-line summary. Keys are kept sorted so the
/// serialized form is stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    values: BTreeMap<String, f64>,
    summary: String,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn summarized(mut self, summary: String) -> Self {
        self.summary = summary;
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn values(&self) -> &BTreeMap<String, f64> {
        &self.values
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn into_parts(self) -> (BTreeMap<String, f64>, String) {
        (self.values, self.summary)
    }
}

/// Index of the largest value; ties go to the first occurrence, NaNs are skipped.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some(b) if values[b] >= v => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Index of the smallest value; ties go to the first occurrence, NaNs are skipped.
pub fn argmin(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some(b) if values[b] <= v => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Index of the value closest to `target` (first occurrence on ties).
pub fn nearest(values: &[f64], target: f64) -> Option<usize> {
    let distances: Vec<f64> = values.iter().map(|v| (v - target).abs()).collect();
    argmin(&distances)
}

pub fn max(values: &[f64]) -> f64 {
    argmax(values).map_or(f64::NAN, |i| values[i])
}

pub fn min(values: &[f64]) -> f64 {
    argmin(values).map_or(f64::NAN, |i| values[i])
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Percentile with linear interpolation between closest ranks.
/// `sorted` must be in ascending order.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = (q / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}
