//! # driftprobe-core
//!
//! **Does the same model answer the same way on every chip?**
//!
//! `driftprobe-core` is the shared library of the driftprobe harness: the
//! machine identity probe, MNIST IDX loading, drift metrics, the ADHD10
//! diagnostic rollup, and the versioned telemetry report schema.
//!
//! ## Quick Start
//!
//! ```no_run
//! use driftprobe_core::{machine_id, probe_system};
//!
//! let system = probe_system();
//! println!("{} on {}", system.cpu_model, system.os_version);
//! println!("machine id: {}", machine_id(&system));
//! ```
//!
//! ## Architecture
//!
//! Probe → Dataset → (twin forward passes, elsewhere) → Drift → ADHD10 → Report
//!
//! The heavy lifting (model execution, HTTP) lives in the sibling crates;
//! everything here is deterministic, synchronous, and testable in isolation.

pub mod adhd;
pub mod dataset;
pub mod drift;
pub mod paths;
pub mod report;
pub mod sysinfo;

pub use adhd::{AdhdBuckets, AdhdSample, AdhdScore, Agreement, Bucket, bucket_for, score_probe};
pub use dataset::{
    DatasetError, Image, Label, MNIST_SHARDS, SampleIndex, build_sample_index, label_digit,
    load_mnist,
};
pub use drift::{DriftMetrics, drift_pair};
pub use paths::{DATA_DIR_ENV, resolve_public_dir};
pub use report::{
    ManifestEntry, ModelRun, REPORT_VERSION, SampleTiming, SourceTag, TelemetryReport, round6,
    round6_vec,
};
pub use sysinfo::{GpuAdapter, SystemInfo, machine_id, probe_system};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
