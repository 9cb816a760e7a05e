//! Metrics domain types

use serde::{Deserialize, Serialize};

/// Quality metrics reported by one training job
///
/// Persisted by the worker as `{"rmse": float, "mse": float}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub rmse: f64,
    pub mse: f64,
}

impl MetricsRecord {
    pub fn new(rmse: f64, mse: f64) -> Self {
        Self { rmse, mse }
    }

    /// Parses a persisted metrics file
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Serializes the record in the persisted layout
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// A record can only compete for best if its RMSE is comparable
    pub fn is_comparable(&self) -> bool {
        !self.rmse.is_nan()
    }
}
