//! # driftprobe-client
//!
//! The client half of the driftprobe harness: pull the model catalog and
//! MNIST shards from a host, run every model through twin CPU/GPU probes,
//! score the ADHD10 diagnostics, and push the telemetry report back.
//!
//! The pipeline is strictly sequential within one invocation — models run in
//! manifest order, digits run 0..9 — because concurrent inference would
//! pollute the latency and GPU readings the harness exists to collect.
//!
//! ## Quick Start
//!
//! ```no_run
//! use driftprobe_client::{PipelineConfig, run_pipeline};
//! use driftprobe_core::SourceTag;
//!
//! # async fn demo() {
//! let config = PipelineConfig {
//!     host_base: "http://192.168.1.20:8080".to_string(),
//!     source: SourceTag::Native,
//!     public_dir: "public".into(),
//! };
//! let outcome = run_pipeline(&config).await.unwrap();
//! println!("uploaded {} model runs", outcome.report.per_model.len());
//! # }
//! ```

pub mod fetch;
pub mod pipeline;
pub mod probe;
pub mod report_io;
pub mod twin;

pub use fetch::{Fetcher, HostError};
pub use pipeline::{PipelineConfig, PipelineError, PipelineOutcome, run_pipeline};
pub use probe::{ProbeOutcome, argmax, run_probe};
pub use report_io::{UploadError, report_filename, upload_report, write_report_local};
pub use twin::TwinHandles;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
