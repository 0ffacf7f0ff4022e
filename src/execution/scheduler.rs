//! Execution scheduler - bounds how many matrix entries run at once

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Strategy for scheduling matrix entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// One entry at a time, in matrix order
    Sequential,

    /// Every entry at once
    #[default]
    Parallel,

    /// Limited parallelism (max N concurrent entries)
    LimitedParallel(usize),
}

impl SchedulingStrategy {
    /// Strategy implied by a workflow's `max_parallel`
    pub fn from_max_parallel(max_parallel: Option<usize>) -> Self {
        match max_parallel {
            Some(1) => SchedulingStrategy::Sequential,
            Some(n) => SchedulingStrategy::LimitedParallel(n),
            None => SchedulingStrategy::Parallel,
        }
    }
}

impl FromStr for SchedulingStrategy {
    type Err = String;

    /// Parses `sequential`, `parallel`, or a positive entry limit
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(SchedulingStrategy::Sequential),
            "parallel" => Ok(SchedulingStrategy::Parallel),
            n => match n.parse::<usize>() {
                Ok(0) => Err("parallelism limit must be at least 1".to_string()),
                Ok(n) => Ok(SchedulingStrategy::LimitedParallel(n)),
                Err(_) => Err(format!(
                    "unknown strategy '{}' (expected sequential, parallel or a number)",
                    s
                )),
            },
        }
    }
}

impl fmt::Display for SchedulingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulingStrategy::Sequential => f.write_str("sequential"),
            SchedulingStrategy::Parallel => f.write_str("parallel"),
            SchedulingStrategy::LimitedParallel(n) => write!(f, "{}", n),
        }
    }
}

/// Hands out run slots to matrix entries
#[derive(Debug, Clone)]
pub struct ExecutionScheduler {
    slots: Arc<Semaphore>,
}

impl ExecutionScheduler {
    pub fn new(strategy: SchedulingStrategy, entry_count: usize) -> Self {
        let permits = Self::concurrency(strategy, entry_count);
        Self {
            slots: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Number of entries allowed to run at once
    pub fn concurrency(strategy: SchedulingStrategy, entry_count: usize) -> usize {
        let limit = match strategy {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => entry_count,
            SchedulingStrategy::LimitedParallel(max) => max.min(entry_count),
        };
        limit.max(1)
    }

    /// Wait for a free slot; the slot is released when the permit drops
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        self.slots.clone().acquire_owned().await
    }
}
