//! Workflow execution engine

pub mod cache;
pub mod engine;
pub mod executor;
pub mod runner;
pub mod scheduler;

pub use cache::CacheManager;
pub use engine::{EventHandler, ExecutionEngine, ExecutionEvent, WorkflowRun};
pub use executor::{ExecutionResult, StepExecutor};
pub use runner::{
    CommandInvocation, CommandOutput, CommandRunner, DryRunRunner, RunnerError, ShellRunner,
};
pub use scheduler::{ExecutionScheduler, SchedulingStrategy};
