//! Data Transfer Objects for collaborator communication
//!
//! Payloads sent to the cluster scheduler (job manifests) and to the
//! model serving platform (REST request and response bodies).

pub mod manifest;
pub mod serving;
