// src/store/mod.rs

//! Persistence seam for records and catalog entries.
//!
//! The runner only needs narrow load/save contracts, so storage is a trait:
//! - [`JsonDirRepository`] keeps one JSON document per entity on disk and is
//!   what the `remoterun` binary uses.
//! - [`MemoryRepository`] keeps everything in a map; tests and embedders use
//!   it directly.
//!
//! Saves are whole-document upserts. There is no partial-field update and no
//! transaction; the runner partitions fields by writer instead.

use std::fmt::Debug;

use crate::errors::StoreError;
use crate::record::{Agent, Cluster, ExecutionRecord, Scheduling, Script};

pub mod json_dir;
pub mod memory;

pub use json_dir::JsonDirRepository;
pub use memory::MemoryRepository;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Key-value access to everything the runner reads or writes.
pub trait Repository: Send + Sync + Debug {
    fn load_record(&self, id: &str) -> StoreResult<ExecutionRecord>;
    fn save_record(&self, record: &ExecutionRecord) -> StoreResult<()>;

    /// Save an intermediate output snapshot of a running record.
    ///
    /// Same contract as [`save_record`](Self::save_record) but may trade
    /// durability for speed, since a later save supersedes it.
    fn save_output(&self, record: &ExecutionRecord) -> StoreResult<()> {
        self.save_record(record)
    }

    fn load_agent(&self, id: &str) -> StoreResult<Agent>;
    fn save_agent(&self, agent: &Agent) -> StoreResult<()>;

    fn load_script(&self, id: &str) -> StoreResult<Script>;
    fn load_cluster(&self, id: &str) -> StoreResult<Cluster>;
    fn load_scheduling(&self, id: &str) -> StoreResult<Scheduling>;
}
