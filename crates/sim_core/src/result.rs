//! Caller-facing result shape.
//!
//! `columns` is always `["t", <state names in model order>]` and every data
//! record carries exactly those keys in that order.

use crate::error::EngineError;
use crate::metrics::Metrics;
use crate::trajectory::Trajectory;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

pub const SUCCESS_MESSAGE: &str = "Simulation completed";
pub const TIME_COLUMN: &str = "t";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Rendered chart. `FileExporter` never writes one; external exporters may.
    Plot,
    Csv,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// One row of output: `t` followed by each state value, serialized as a map
/// whose key order matches `columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    entries: Vec<(String, f64)>,
}

impl DataPoint {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|(_, v)| *v)
    }
}

impl Serialize for DataPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

pub fn columns(trajectory: &Trajectory) -> Vec<String> {
    std::iter::once(TIME_COLUMN.to_string())
        .chain(trajectory.names().iter().cloned())
        .collect()
}

pub fn data_points(trajectory: &Trajectory) -> Vec<DataPoint> {
    let names = trajectory.names();
    trajectory
        .times()
        .iter()
        .enumerate()
        .map(|(step, &t)| {
            let mut entries = Vec::with_capacity(names.len() + 1);
            entries.push((TIME_COLUMN.to_string(), t));
            for (var, name) in names.iter().enumerate() {
                entries.push((name.clone(), trajectory.value(var, step)));
            }
            DataPoint { entries }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub artifacts: Vec<Artifact>,
    pub metrics: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<DataPoint>>,
}

impl SimulationResult {
    pub fn success(
        trajectory: &Trajectory,
        metrics: Metrics,
        artifacts: Vec<Artifact>,
        return_data: bool,
    ) -> Self {
        let (metrics, summary) = metrics.into_parts();
        Self {
            status: Status::Success,
            message: SUCCESS_MESSAGE.to_string(),
            summary: Some(summary),
            artifacts,
            metrics,
            columns: Some(columns(trajectory)),
            data: return_data.then(|| data_points(trajectory)),
        }
    }

    pub fn failure(error: &EngineError) -> Self {
        Self {
            status: Status::Error,
            message: error.describe(),
            summary: None,
            artifacts: Vec::new(),
            metrics: BTreeMap::new(),
            columns: None,
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}
