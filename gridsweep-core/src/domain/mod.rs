//! Core domain types
//!
//! These types describe one sweep run and are shared between the
//! orchestrator (which drives the sweep) and the CLI (which reports on it).

pub mod grid;
pub mod job;
pub mod metrics;
pub mod sweep;
