//! Core domain models for workflows
//!
//! This module defines the workflow configuration, matrix entries, steps,
//! conditions and the runtime state they carry.

pub mod condition;
pub mod config;
pub mod context;
pub mod matrix;
pub mod pipeline;
pub mod state;
pub mod step;
pub mod template;

pub use context::*;
pub use matrix::MatrixEntry;
pub use pipeline::*;
pub use state::*;
pub use step::*;
