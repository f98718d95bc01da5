//! Persisted network format and the runtime [`Network`] handle.
//!
//! A model file is JSON: a `dtype` tag (only `float32` is accepted) and an
//! ordered list of layers. The first layer is the input grid and carries no
//! weights; every later layer stores one weight row per neuron (dense against
//! the previous layer, row-major) plus a bias per neuron.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::forward::Activation;
use crate::gpu::GpuContext;

/// The only weight dtype this engine executes.
pub const DTYPE_FLOAT32: &str = "float32";

/// Errors raised by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("model file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("model file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("model file {path} has dtype '{found}', expected '{DTYPE_FLOAT32}'")]
    WrongDtype { path: PathBuf, found: String },

    #[error("unknown activation '{0}'")]
    UnknownActivation(String),

    #[error("bad network topology: {0}")]
    Shape(String),

    #[error("forward input is {found_rows}x{found_cols}, input layer expects {want_rows}x{want_cols}")]
    InputShape {
        found_rows: usize,
        found_cols: usize,
        want_rows: usize,
        want_cols: usize,
    },

    #[error("GPU init failed: {0}")]
    GpuInit(String),

    #[error("GPU dispatch failed: {0}")]
    Gpu(String),
}

/// One layer as persisted on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerFile {
    pub width: u32,
    pub height: u32,
    pub activation: String,
    pub trainable: bool,
    #[serde(default)]
    pub weights: Vec<Vec<f32>>,
    #[serde(default)]
    pub biases: Vec<f32>,
}

/// A network as persisted on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkFile {
    pub dtype: String,
    pub layers: Vec<LayerFile>,
}

/// Per-layer shape/activation/trainability description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// `(width, height)` per layer.
    pub shapes: Vec<(u32, u32)>,
    pub activations: Vec<Activation>,
    pub trainable: Vec<bool>,
}

/// Opaque, round-trippable weight snapshot of a network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateBlob {
    layers: Vec<LayerState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LayerState {
    weights: Vec<Vec<f32>>,
    biases: Vec<f32>,
}

/// Runtime layer.
#[derive(Debug, Clone)]
pub(crate) struct Layer {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) activation: Activation,
    pub(crate) trainable: bool,
    /// One row per neuron, each row dense against the previous layer.
    pub(crate) weights: Vec<Vec<f32>>,
    pub(crate) biases: Vec<f32>,
}

impl Layer {
    pub(crate) fn neurons(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// A loaded network: the engine's handle type.
///
/// Execution path selection is two-step: `set_gpu(true)` requests the GPU,
/// `init_gpu` actually acquires it. A handle whose GPU was requested but
/// never initialized (or later cleaned up) runs on the CPU.
#[derive(Debug)]
pub struct Network {
    pub(crate) layers: Vec<Layer>,
    pub(crate) gpu_requested: bool,
    pub(crate) gpu: Option<GpuContext>,
    pub(crate) last_output: Vec<f64>,
}

impl Network {
    /// Load a network from a JSON model file, rejecting non-float32 files.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: NetworkFile =
            serde_json::from_str(&raw).map_err(|source| EngineError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if file.dtype != DTYPE_FLOAT32 {
            return Err(EngineError::WrongDtype {
                path: path.to_path_buf(),
                found: file.dtype,
            });
        }
        Self::from_file(file)
    }

    /// Persist this network as a JSON model file.
    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let file = NetworkFile {
            dtype: DTYPE_FLOAT32.to_string(),
            layers: self
                .layers
                .iter()
                .map(|l| LayerFile {
                    width: l.width,
                    height: l.height,
                    activation: l.activation.to_string(),
                    trainable: l.trainable,
                    weights: l.weights.clone(),
                    biases: l.biases.clone(),
                })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|source| EngineError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_file(file: NetworkFile) -> Result<Self, EngineError> {
        if file.layers.len() < 2 {
            return Err(EngineError::Shape(format!(
                "network needs an input layer and at least one dense layer, found {}",
                file.layers.len()
            )));
        }
        let mut layers = Vec::with_capacity(file.layers.len());
        let mut prev_neurons = 0usize;
        for (i, lf) in file.layers.into_iter().enumerate() {
            let activation = Activation::parse(&lf.activation)?;
            let neurons = lf.width as usize * lf.height as usize;
            if neurons == 0 {
                return Err(EngineError::Shape(format!("layer {i} has zero neurons")));
            }
            if i > 0 {
                if lf.weights.len() != neurons {
                    return Err(EngineError::Shape(format!(
                        "layer {i} declares {neurons} neurons but carries {} weight rows",
                        lf.weights.len()
                    )));
                }
                if let Some(bad) = lf.weights.iter().position(|row| row.len() != prev_neurons) {
                    return Err(EngineError::Shape(format!(
                        "layer {i} weight row {bad} has {} inputs, previous layer has {prev_neurons} neurons",
                        lf.weights[bad].len()
                    )));
                }
                if lf.biases.len() != neurons {
                    return Err(EngineError::Shape(format!(
                        "layer {i} declares {neurons} neurons but carries {} biases",
                        lf.biases.len()
                    )));
                }
            }
            layers.push(Layer {
                width: lf.width,
                height: lf.height,
                activation,
                trainable: lf.trainable,
                weights: if i == 0 { Vec::new() } else { lf.weights },
                biases: if i == 0 { Vec::new() } else { lf.biases },
            });
            prev_neurons = neurons;
        }
        Ok(Self {
            layers,
            gpu_requested: false,
            gpu: None,
            last_output: Vec::new(),
        })
    }

    /// Per-layer shapes, activations, and trainability flags.
    pub fn topology(&self) -> Topology {
        Topology {
            shapes: self.layers.iter().map(|l| (l.width, l.height)).collect(),
            activations: self.layers.iter().map(|l| l.activation).collect(),
            trainable: self.layers.iter().map(|l| l.trainable).collect(),
        }
    }

    /// Construct an uninitialized (zero-weight) network with this topology.
    pub fn fresh(topology: &Topology) -> Result<Self, EngineError> {
        if topology.shapes.len() != topology.activations.len()
            || topology.shapes.len() != topology.trainable.len()
        {
            return Err(EngineError::Shape(
                "topology arrays have mismatched lengths".to_string(),
            ));
        }
        let file = NetworkFile {
            dtype: DTYPE_FLOAT32.to_string(),
            layers: topology
                .shapes
                .iter()
                .enumerate()
                .map(|(i, &(width, height))| {
                    let neurons = width as usize * height as usize;
                    let prev = if i == 0 {
                        0
                    } else {
                        let (w, h) = topology.shapes[i - 1];
                        w as usize * h as usize
                    };
                    LayerFile {
                        width,
                        height,
                        activation: topology.activations[i].to_string(),
                        trainable: topology.trainable[i],
                        weights: if i == 0 {
                            Vec::new()
                        } else {
                            vec![vec![0.0; prev]; neurons]
                        },
                        biases: if i == 0 { Vec::new() } else { vec![0.0; neurons] },
                    }
                })
                .collect(),
        };
        Self::from_file(file)
    }

    /// Export all weights as an opaque, round-trippable blob.
    pub fn export_state(&self) -> StateBlob {
        StateBlob {
            layers: self
                .layers
                .iter()
                .map(|l| LayerState {
                    weights: l.weights.clone(),
                    biases: l.biases.clone(),
                })
                .collect(),
        }
    }

    /// Import a weight blob exported from a topology-identical network.
    pub fn import_state(&mut self, state: &StateBlob) -> Result<(), EngineError> {
        if state.layers.len() != self.layers.len() {
            return Err(EngineError::Shape(format!(
                "state has {} layers, network has {}",
                state.layers.len(),
                self.layers.len()
            )));
        }
        for (i, (layer, ls)) in self.layers.iter().zip(&state.layers).enumerate() {
            if layer.weights.len() != ls.weights.len() || layer.biases.len() != ls.biases.len() {
                return Err(EngineError::Shape(format!(
                    "state layer {i} does not match the network's layer shape"
                )));
            }
        }
        for (layer, ls) in self.layers.iter_mut().zip(&state.layers) {
            layer.weights = ls.weights.clone();
            layer.biases = ls.biases.clone();
        }
        Ok(())
    }

    /// Request (or withdraw) GPU execution for subsequent forwards.
    ///
    /// Requesting alone does not acquire the device; see [`Self::init_gpu`].
    pub fn set_gpu(&mut self, enabled: bool) {
        self.gpu_requested = enabled;
    }

    /// Acquire the GPU backend. Idempotent per handle.
    pub fn init_gpu(&mut self) -> Result<(), EngineError> {
        if self.gpu.is_some() {
            return Ok(());
        }
        let ctx = GpuContext::new()?;
        log::debug!("GPU backend ready: {}", ctx.device_name());
        self.gpu = Some(ctx);
        Ok(())
    }

    /// Release the GPU backend. Safe to call repeatedly or without init.
    pub fn cleanup_gpu(&mut self) {
        self.gpu = None;
    }

    /// Whether forwards currently dispatch to the GPU.
    pub fn gpu_active(&self) -> bool {
        self.gpu_requested && self.gpu.is_some()
    }

    /// The output vector of the most recent forward pass.
    pub fn extract_output(&self) -> Vec<f64> {
        self.last_output.clone()
    }
}
