//! Telemetry report schema, version 1.2.0.
//!
//! Producers must not rename fields within a minor version; consumers must
//! tolerate unknown fields. Records are composed once per pipeline invocation
//! and are immutable after their stage completes.

use serde::{Deserialize, Serialize};

use crate::adhd::AdhdScore;
use crate::drift::DriftMetrics;
use crate::sysinfo::SystemInfo;

/// Report schema version emitted by the native pipeline.
pub const REPORT_VERSION: &str = "1.2.0";

/// One entry of the host's model manifest. Manifest order defines
/// evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub filename: String,
}

/// Client runtime environment tag carried in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceTag {
    #[serde(rename = "native")]
    Native,
    #[serde(rename = "wasm-bun")]
    WasmBun,
    #[serde(rename = "wasm-ionic")]
    WasmIonic,
    #[serde(rename = "web")]
    Web,
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::WasmBun => write!(f, "wasm-bun"),
            Self::WasmIonic => write!(f, "wasm-ionic"),
            Self::Web => write!(f, "web"),
        }
    }
}

impl std::str::FromStr for SourceTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(Self::Native),
            "wasm-bun" => Ok(Self::WasmBun),
            "wasm-ionic" => Ok(Self::WasmIonic),
            "web" => Ok(Self::Web),
            other => Err(format!(
                "unknown source tag '{other}' (expected native, wasm-bun, wasm-ionic, or web)"
            )),
        }
    }
}

/// One timed forward pass on one execution path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleTiming {
    pub digit: u8,
    pub idx: usize,
    /// Wall-clock time for forward + output extraction, in milliseconds.
    pub elapsed_ms: f64,
    pub pred: u8,
    pub top1_score: f64,
    /// Full output vector, rounded to 6 decimal places.
    pub output: Vec<f64>,
}

/// Everything measured for one model: twin-path timings, drift, ADHD10.
///
/// `cpu`, `gpu`, and `drift` are positionally aligned: the same `(digit,
/// idx)` pair sits at each index, and all three have equal length (≤ 10).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRun {
    pub model_file: String,
    pub webgpu_init_ok: bool,
    pub webgpu_init_time_ms: f64,
    pub cpu: Vec<SampleTiming>,
    pub gpu: Vec<SampleTiming>,
    pub drift: Vec<DriftMetrics>,
    pub adhd10: AdhdScore,
}

/// The composite telemetry report uploaded to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReport {
    pub version: String,
    pub source: SourceTag,
    pub machine_id: String,
    pub system: SystemInfo,
    /// Base URL of the host the artifacts came from.
    pub from_host: String,
    pub models_used: Vec<String>,
    /// Digit classes the probe covered, ascending.
    pub samples: Vec<u8>,
    /// RFC3339 UTC.
    pub started_at: String,
    /// RFC3339 UTC.
    pub ended_at: String,
    pub per_model: Vec<ModelRun>,
}

/// Round to 6 decimal places, the precision report outputs carry.
///
/// Drift is always computed on unrounded vectors; rounding applies only when
/// embedding outputs in [`SampleTiming`].
pub fn round6(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}

/// Round a whole output vector to report precision.
pub fn round6_vec(v: &[f64]) -> Vec<f64> {
    v.iter().map(|&x| round6(x)).collect()
}
