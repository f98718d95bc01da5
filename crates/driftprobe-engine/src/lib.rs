//! # driftprobe-engine
//!
//! The inference engine behind the driftprobe harness: loads persisted
//! float32 layered networks, evaluates them forward on a CPU path or a GPU
//! path, and round-trips weight state between handles.
//!
//! The capability surface is deliberately small — load, topology, fresh,
//! export/import state, GPU lifecycle, forward, extract — because the
//! harness built on top needs *twin* handles with identical weights more
//! than it needs a training framework.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use driftprobe_engine::Network;
//!
//! let mut net = Network::load(Path::new("public/models/mnist_S1.json"))?;
//! net.forward(&vec![vec![0.0; 28]; 28])?;
//! let output = net.extract_output();
//! # Ok::<(), driftprobe_engine::EngineError>(())
//! ```

pub mod forward;
pub mod gpu;
pub mod model;

pub use forward::Activation;
pub use gpu::GpuContext;
pub use model::{
    DTYPE_FLOAT32, EngineError, LayerFile, Network, NetworkFile, StateBlob, Topology,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
