//! crossci - cross-compile profiles and a matrix CI runner for runtime packages

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod profile;
pub mod registry;

// Re-export commonly used types
pub use crate::core::{EntryPipeline, ExecutionStatus, RunContext, Step, StepState, TriggerEvent, Workflow};
pub use crate::execution::{ExecutionEngine, ExecutionEvent, SchedulingStrategy, StepExecutor, WorkflowRun};
pub use crate::profile::{Language, ProfileStore, Stage, ToolchainProfile};
pub use crate::registry::{prune_versions, PackageRegistry};
