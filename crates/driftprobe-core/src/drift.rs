//! Numerical drift between paired output vectors.
//!
//! Two forward passes over identical weights should be mathematically
//! equivalent; drift quantifies how far apart they actually land.

use serde::{Deserialize, Serialize};

/// Drift between the CPU-path and GPU-path outputs for one probe sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftMetrics {
    pub digit: u8,
    pub idx: usize,
    /// Largest absolute element-wise difference.
    pub max_abs: f64,
    /// Mean absolute error across elements.
    pub mae: f64,
}

/// Compute `(max_abs, mae)` over a pair of equal-length vectors.
///
/// Degenerate inputs (empty, or length mismatch) yield `(0, 0)`.
pub fn drift_pair(a: &[f64], b: &[f64]) -> (f64, f64) {
    if a.is_empty() || a.len() != b.len() {
        return (0.0, 0.0);
    }
    let mut max_abs = 0.0f64;
    let mut sum_abs = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let d = (x - y).abs();
        if d > max_abs {
            max_abs = d;
        }
        sum_abs += d;
    }
    (max_abs, sum_abs / a.len() as f64)
}

impl DriftMetrics {
    /// Build a drift record for one `(digit, idx)` probe pair.
    pub fn between(digit: u8, idx: usize, cpu: &[f64], gpu: &[f64]) -> Self {
        let (max_abs, mae) = drift_pair(cpu, gpu);
        Self {
            digit,
            idx,
            max_abs,
            mae,
        }
    }
}
