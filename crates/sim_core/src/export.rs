//! Artifact persistence.
//!
//! The engine hands finished tables to an [`ArtifactExporter`]; what it does
//! with them (disk, object storage, nothing) is up to the host.

use crate::result::{Artifact, ArtifactKind, DataPoint};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

pub trait ArtifactExporter: Send + Sync {
    fn export(&self, columns: &[String], rows: &[DataPoint], run_id: &str) -> Result<Vec<Artifact>>;
}

/// `<model_type lowercase>_<UTC %Y%m%dT%H%M%S>_<8 hex chars>`.
pub fn new_run_id(model_type: &str) -> String {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", model_type.to_lowercase(), stamp, &suffix[..8])
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Writes `<run_id>.csv` and `<run_id>.json` into a storage directory.
#[derive(Debug, Clone)]
pub struct FileExporter {
    dir: PathBuf,
}

#[derive(Serialize)]
struct JsonTable<'a> {
    run_id: &'a str,
    columns: &'a [String],
    data: &'a [DataPoint],
}

impl FileExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write(&self, name: String, kind: ArtifactKind, bytes: &[u8]) -> Result<Artifact> {
        let path = self.dir.join(name);
        fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
        Ok(Artifact {
            kind,
            path: path.display().to_string(),
            sha256: Some(sha256_hex(bytes)),
        })
    }
}

fn csv_table(columns: &[String], rows: &[DataPoint]) -> String {
    let mut out = columns.join(",");
    out.push('\n');
    for row in rows {
        for (i, value) in row.values().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&format!("{value}"));
        }
        out.push('\n');
    }
    out
}

impl ArtifactExporter for FileExporter {
    fn export(&self, columns: &[String], rows: &[DataPoint], run_id: &str) -> Result<Vec<Artifact>> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating storage directory {}", self.dir.display()))?;

        let csv = csv_table(columns, rows);
        let json = serde_json::to_vec_pretty(&JsonTable {
            run_id,
            columns,
            data: rows,
        })?;

        Ok(vec![
            self.write(format!("{run_id}.csv"), ArtifactKind::Csv, csv.as_bytes())?,
            self.write(format!("{run_id}.json"), ArtifactKind::Json, &json)?,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{columns, data_points};
    use crate::trajectory::Trajectory;
    use nalgebra::DMatrix;

    fn table() -> (Vec<String>, Vec<DataPoint>) {
        let traj = Trajectory::from_names(
            &["x", "y"],
            vec![0.0, 1.0],
            DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 0.5, 0.25]),
        );
        (columns(&traj), data_points(&traj))
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sim_core_export_{tag}_{}", uuid::Uuid::new_v4().simple()))
    }

    #[test]
    fn run_id_has_expected_shape() {
        let id = new_run_id("LotkaVolterra");
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3, "{id}");
        assert_eq!(parts[0], "lotkavolterra");
        assert_eq!(parts[1].len(), 15);
        assert_eq!(&parts[1][8..9], "T");
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn csv_has_header_and_one_line_per_row() {
        let (cols, rows) = table();
        assert_eq!(csv_table(&cols, &rows), "t,x,y\n0,1,0.5\n1,2,0.25\n");
    }

    #[test]
    fn file_exporter_writes_and_digests() {
        let dir = scratch_dir("write");
        let exporter = FileExporter::new(&dir);
        let (cols, rows) = table();
        let artifacts = exporter.export(&cols, &rows, "sir_test").expect("export");
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].kind, ArtifactKind::Csv);
        assert_eq!(artifacts[1].kind, ArtifactKind::Json);

        for artifact in &artifacts {
            let bytes = fs::read(&artifact.path).expect("read back");
            assert_eq!(artifact.sha256.as_deref(), Some(sha256_hex(&bytes).as_str()));
        }
        let json: serde_json::Value =
            serde_json::from_slice(&fs::read(dir.join("sir_test.json")).unwrap()).unwrap();
        assert_eq!(json["columns"], serde_json::json!(["t", "x", "y"]));
        assert_eq!(json["data"][1]["y"], 0.25);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn sha256_matches_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
