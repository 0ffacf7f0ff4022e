//! Scenario-based tests for crossci

mod branch_gating;
mod cache_reuse;
mod failure_handling;
mod matrix_isolation;
mod packaging;
mod profiles;
mod retention;
