//! Resolution of declarative time spans into concrete output grids.
//!
//! Preview mode caps the number of output points but never moves the
//! window: a previewed run covers exactly the same `[start, end]` as the
//! full-resolution run, only more sparsely.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Default cap on output points when `preview_mode` is set.
pub const PREVIEW_CAP: usize = 100;

/// Default number of output points.
pub const DEFAULT_STEPS: usize = 400;

fn default_steps() -> usize {
    DEFAULT_STEPS
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: f64,
    pub end: f64,
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default)]
    pub preview_mode: bool,
}

impl TimeSpan {
    pub fn new(start: f64, end: f64, steps: usize) -> Self {
        Self {
            start,
            end,
            steps,
            preview_mode: false,
        }
    }

    pub fn preview(mut self) -> Self {
        self.preview_mode = true;
        self
    }
}

/// Evenly spaced output times, inclusive of both endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    times: Vec<f64>,
    requested_steps: usize,
}

impl TimeGrid {
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn start(&self) -> f64 {
        self.times[0]
    }

    pub fn end(&self) -> f64 {
        self.times[self.times.len() - 1]
    }

    pub fn requested_steps(&self) -> usize {
        self.requested_steps
    }

    /// True when preview mode reduced the number of points.
    pub fn decimated(&self) -> bool {
        self.times.len() < self.requested_steps
    }
}

/// Number of output points after applying the preview policy.
pub fn resolved_steps(span: &TimeSpan, preview_cap: usize) -> usize {
    if span.preview_mode {
        span.steps.min(preview_cap.max(2))
    } else {
        span.steps
    }
}

pub fn resolve(span: &TimeSpan, preview_cap: usize) -> EngineResult<TimeGrid> {
    if !span.start.is_finite() || !span.end.is_finite() {
        return Err(EngineError::InvalidTimeSpan(format!(
            "time span bounds must be finite (start={}, end={})",
            span.start, span.end
        )));
    }
    if span.start >= span.end {
        return Err(EngineError::InvalidTimeSpan(format!(
            "time span start must be before end (start={}, end={})",
            span.start, span.end
        )));
    }
    if span.steps < 2 {
        return Err(EngineError::InvalidTimeSpan(format!(
            "steps must be >= 2 (got {})",
            span.steps
        )));
    }

    let count = resolved_steps(span, preview_cap);
    let times = linspace(span.start, span.end, count);
    if times.windows(2).any(|pair| pair[1] <= pair[0]) {
        return Err(EngineError::InvalidTimeSpan(format!(
            "time span [{}, {}] is too narrow to hold {} distinct points",
            span.start, span.end, count
        )));
    }

    Ok(TimeGrid {
        times,
        requested_steps: span.steps,
    })
}

fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    let step = (end - start) / (count - 1) as f64;
    let mut times: Vec<f64> = (0..count).map(|i| start + i as f64 * step).collect();
    times[count - 1] = end;
    times
}
