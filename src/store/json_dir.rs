// src/store/json_dir.rs

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::trace;

use super::{Repository, StoreResult};
use crate::errors::StoreError;
use crate::record::{Agent, Cluster, ExecutionRecord, Scheduling, Script};

/// Repository backed by a directory of JSON documents:
///
/// ```text
/// <root>/records/<id>.json
/// <root>/agents/<id>.json
/// <root>/scripts/<id>.json
/// <root>/clusters/<id>.json
/// <root>/schedulings/<id>.json
/// ```
///
/// Every write goes to its own uniquely named temp file in the target
/// directory and is renamed into place, so a reader never observes a
/// half-written document and concurrent writers of one id never share a temp
/// file. The last rename wins.
///
/// Full saves are fsynced before the rename. Output snapshots
/// ([`Repository::save_output`]) skip the fsync: a later snapshot or the
/// final save supersedes them.
#[derive(Debug, Clone)]
pub struct JsonDirRepository {
    root: PathBuf,
}

impl JsonDirRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn save_script(&self, script: &Script) -> StoreResult<()> {
        self.write("scripts", &script.id, script, Durability::Synced)
    }

    pub fn save_cluster(&self, cluster: &Cluster) -> StoreResult<()> {
        self.write("clusters", &cluster.id, cluster, Durability::Synced)
    }

    pub fn save_scheduling(&self, scheduling: &Scheduling) -> StoreResult<()> {
        self.write("schedulings", &scheduling.id, scheduling, Durability::Synced)
    }

    fn path_for(&self, table: &str, id: &str) -> io::Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid entity id {id:?}"),
            ));
        }
        Ok(self.root.join(table).join(format!("{id}.json")))
    }

    fn read<T: DeserializeOwned>(&self, table: &str, kind: &'static str, id: &str) -> StoreResult<T> {
        let path = self.path_for(table, id)?;
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    kind,
                    id: id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    fn write<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        value: &T,
        durability: Durability,
    ) -> StoreResult<()> {
        let path = self.path_for(table, id)?;
        let dir = path.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(dir)?;

        let body = serde_json::to_vec_pretty(value)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&body)?;
        if durability == Durability::Synced {
            tmp.as_file().sync_all()?;
        }
        tmp.persist(&path).map_err(|e| e.error)?;

        trace!(path = %path.display(), bytes = body.len(), ?durability, "wrote document");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Durability {
    Synced,
    Buffered,
}

impl Repository for JsonDirRepository {
    fn load_record(&self, id: &str) -> StoreResult<ExecutionRecord> {
        self.read("records", "record", id)
    }

    fn save_record(&self, record: &ExecutionRecord) -> StoreResult<()> {
        self.write("records", &record.id, record, Durability::Synced)
    }

    fn save_output(&self, record: &ExecutionRecord) -> StoreResult<()> {
        self.write("records", &record.id, record, Durability::Buffered)
    }

    fn load_agent(&self, id: &str) -> StoreResult<Agent> {
        self.read("agents", "agent", id)
    }

    fn save_agent(&self, agent: &Agent) -> StoreResult<()> {
        self.write("agents", &agent.id, agent, Durability::Synced)
    }

    fn load_script(&self, id: &str) -> StoreResult<Script> {
        self.read("scripts", "script", id)
    }

    fn load_cluster(&self, id: &str) -> StoreResult<Cluster> {
        self.read("clusters", "cluster", id)
    }

    fn load_scheduling(&self, id: &str) -> StoreResult<Scheduling> {
        self.read("schedulings", "scheduling", id)
    }
}
