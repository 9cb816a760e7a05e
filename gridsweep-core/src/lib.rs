//! Gridsweep Core
//!
//! Core types shared by the Gridsweep hyperparameter sweep tooling.
//!
//! This crate contains:
//! - Domain types: grids, job descriptors, metrics and sweep results
//! - DTOs: payloads exchanged with the cluster scheduler and serving platform

pub mod domain;
pub mod dto;
