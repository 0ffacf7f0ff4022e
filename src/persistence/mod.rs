//! Persistence layer for run history and the cache index

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteStore;

pub use crate::core::ExecutionStatus;
use crate::execution::WorkflowRun;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary of one workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    pub workflow_name: String,

    pub branch: String,

    pub event: String,

    /// Overall status (failed if any entry failed)
    pub status: ExecutionStatus,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run completed (if complete)
    pub completed_at: Option<DateTime<Utc>>,

    /// Per-entry outcomes
    pub entries: Vec<EntrySummary>,
}

/// Outcome of one matrix entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySummary {
    pub name: String,
    pub target: String,
    pub status: ExecutionStatus,
    pub completed_steps: usize,
    pub failed_steps: usize,
    pub skipped_steps: usize,
    pub total_steps: usize,
}

impl RunSummary {
    /// Fraction of entries that completed successfully
    pub fn progress(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let done = self
            .entries
            .iter()
            .filter(|e| e.status == ExecutionStatus::Completed)
            .count();
        done as f64 / self.entries.len() as f64
    }
}

/// Index entry for a saved cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub key: String,

    /// Where the cached tree is stored
    pub stored_path: String,

    pub size_bytes: u64,

    pub created_at: DateTime<Utc>,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a workflow run
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// List all runs of a workflow, newest first
    async fn list_runs(&self, workflow_name: &str) -> Result<Vec<RunSummary>>;

    /// List all workflow names
    async fn list_workflows(&self) -> Result<Vec<String>>;

    /// Look up a cache by exact key
    async fn lookup_cache(&self, key: &str) -> Result<Option<CacheRecord>>;

    /// Record (or replace) a cache entry
    async fn record_cache(&self, record: &CacheRecord) -> Result<()>;

    /// Drop a cache entry from the index; unknown keys are ignored
    async fn forget_cache(&self, key: &str) -> Result<()>;
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    runs: tokio::sync::RwLock<std::collections::HashMap<Uuid, RunSummary>>,
    caches: tokio::sync::RwLock<std::collections::HashMap<String, CacheRecord>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            runs: tokio::sync::RwLock::new(std::collections::HashMap::new()),
            caches: tokio::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        self.runs.write().await.insert(run.run_id, run.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        Ok(self.runs.read().await.get(&run_id).cloned())
    }

    async fn list_runs(&self, workflow_name: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut result: Vec<RunSummary> = runs
            .values()
            .filter(|r| r.workflow_name == workflow_name)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(result)
    }

    async fn list_workflows(&self) -> Result<Vec<String>> {
        let runs = self.runs.read().await;
        let mut names: Vec<String> = runs.values().map(|r| r.workflow_name.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn lookup_cache(&self, key: &str) -> Result<Option<CacheRecord>> {
        Ok(self.caches.read().await.get(key).cloned())
    }

    async fn record_cache(&self, record: &CacheRecord) -> Result<()> {
        self.caches
            .write()
            .await
            .insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn forget_cache(&self, key: &str) -> Result<()> {
        self.caches.write().await.remove(key);
        Ok(())
    }
}

/// Create a summary from a finished run
pub fn create_summary(run: &WorkflowRun) -> RunSummary {
    RunSummary {
        run_id: run.run_id,
        workflow_name: run.workflow_name.clone(),
        branch: run.branch.clone(),
        event: run.event.to_string(),
        status: run.status,
        started_at: run.started_at,
        completed_at: run.completed_at,
        entries: run
            .entries
            .iter()
            .map(|p| EntrySummary {
                name: p.entry.name.clone(),
                target: p.entry.target(),
                status: p.state.status,
                completed_steps: p.state.completed_steps,
                failed_steps: p.state.failed_steps,
                skipped_steps: p.state.skipped_steps,
                total_steps: p.state.total_steps,
            })
            .collect(),
    }
}
