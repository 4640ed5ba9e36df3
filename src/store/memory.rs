// src/store/memory.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Repository, StoreResult};
use crate::errors::StoreError;
use crate::record::{Agent, Cluster, ExecutionRecord, Scheduling, Script};

#[derive(Debug, Default)]
struct Tables {
    records: HashMap<String, ExecutionRecord>,
    agents: HashMap<String, Agent>,
    scripts: HashMap<String, Script>,
    clusters: HashMap<String, Cluster>,
    schedulings: HashMap<String, Scheduling>,
    record_saves: usize,
}

/// In-memory repository.
///
/// Cloning shares the underlying tables, so a test can keep a handle while
/// the runner owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_record(&self, record: ExecutionRecord) {
        self.lock().records.insert(record.id.clone(), record);
    }

    pub fn insert_agent(&self, agent: Agent) {
        self.lock().agents.insert(agent.id.clone(), agent);
    }

    pub fn insert_script(&self, script: Script) {
        self.lock().scripts.insert(script.id.clone(), script);
    }

    pub fn insert_cluster(&self, cluster: Cluster) {
        self.lock().clusters.insert(cluster.id.clone(), cluster);
    }

    pub fn insert_scheduling(&self, scheduling: Scheduling) {
        self.lock().schedulings.insert(scheduling.id.clone(), scheduling);
    }

    /// Latest stored copy of a record, if any.
    pub fn record(&self, id: &str) -> Option<ExecutionRecord> {
        self.lock().records.get(id).cloned()
    }

    pub fn agent(&self, id: &str) -> Option<Agent> {
        self.lock().agents.get(id).cloned()
    }

    /// Number of `save_record` calls seen so far.
    pub fn record_saves(&self) -> usize {
        self.lock().record_saves
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panicking test thread must not wedge every other handle.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn lookup<T: Clone>(
    map: &HashMap<String, T>,
    kind: &'static str,
    id: &str,
) -> StoreResult<T> {
    map.get(id).cloned().ok_or_else(|| StoreError::NotFound {
        kind,
        id: id.to_string(),
    })
}

impl Repository for MemoryRepository {
    fn load_record(&self, id: &str) -> StoreResult<ExecutionRecord> {
        lookup(&self.lock().records, "record", id)
    }

    fn save_record(&self, record: &ExecutionRecord) -> StoreResult<()> {
        let mut tables = self.lock();
        tables.record_saves += 1;
        tables.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn load_agent(&self, id: &str) -> StoreResult<Agent> {
        lookup(&self.lock().agents, "agent", id)
    }

    fn save_agent(&self, agent: &Agent) -> StoreResult<()> {
        self.insert_agent(agent.clone());
        Ok(())
    }

    fn load_script(&self, id: &str) -> StoreResult<Script> {
        lookup(&self.lock().scripts, "script", id)
    }

    fn load_cluster(&self, id: &str) -> StoreResult<Cluster> {
        lookup(&self.lock().clusters, "cluster", id)
    }

    fn load_scheduling(&self, id: &str) -> StoreResult<Scheduling> {
        lookup(&self.lock().schedulings, "scheduling", id)
    }
}
