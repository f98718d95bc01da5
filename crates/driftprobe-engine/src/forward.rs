//! Forward evaluation.
//!
//! All arithmetic runs in `f32` (the engine's weight dtype); only the final
//! extracted output widens to `f64`. The CPU path and the GPU path compute
//! the same dense sums with different accumulation orders, which is exactly
//! the divergence the drift harness exists to measure.

use serde::{Deserialize, Serialize};

use crate::model::{EngineError, Layer, Network};

/// Per-layer activation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    #[serde(rename = "linear")]
    Linear,
    #[serde(rename = "relu")]
    Relu,
    #[serde(rename = "sigmoid")]
    Sigmoid,
    #[serde(rename = "tanh")]
    Tanh,
    #[serde(rename = "softmax")]
    Softmax,
}

impl Activation {
    /// Parse the on-disk activation name.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        match raw.to_ascii_lowercase().as_str() {
            "linear" | "" => Ok(Self::Linear),
            "relu" => Ok(Self::Relu),
            "sigmoid" => Ok(Self::Sigmoid),
            "tanh" => Ok(Self::Tanh),
            "softmax" => Ok(Self::Softmax),
            other => Err(EngineError::UnknownActivation(other.to_string())),
        }
    }
}

impl std::fmt::Display for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Relu => write!(f, "relu"),
            Self::Sigmoid => write!(f, "sigmoid"),
            Self::Tanh => write!(f, "tanh"),
            Self::Softmax => write!(f, "softmax"),
        }
    }
}

fn cpu_dense(layer: &Layer, input: &[f32]) -> Vec<f32> {
    let mut out = Vec::with_capacity(layer.neurons());
    for (row, &bias) in layer.weights.iter().zip(&layer.biases) {
        let mut acc = bias;
        for (&w, &x) in row.iter().zip(input) {
            acc += w * x;
        }
        out.push(acc);
    }
    out
}

fn apply_activation(activation: Activation, mut values: Vec<f32>) -> Vec<f32> {
    match activation {
        Activation::Linear => values,
        Activation::Relu => {
            for v in &mut values {
                if *v < 0.0 {
                    *v = 0.0;
                }
            }
            values
        }
        Activation::Sigmoid => {
            for v in &mut values {
                *v = 1.0 / (1.0 + (-*v).exp());
            }
            values
        }
        Activation::Tanh => {
            for v in &mut values {
                *v = v.tanh();
            }
            values
        }
        Activation::Softmax => {
            let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let mut sum = 0.0f32;
            for v in &mut values {
                *v = (*v - max).exp();
                sum += *v;
            }
            if sum > 0.0 {
                for v in &mut values {
                    *v /= sum;
                }
            }
            values
        }
    }
}

impl Network {
    /// Run one forward pass over a 2-D input grid.
    ///
    /// The grid must match the input layer's `height × width`. The result is
    /// retrievable via [`Network::extract_output`] until the next forward.
    pub fn forward(&mut self, input: &[Vec<f64>]) -> Result<(), EngineError> {
        let want_rows = self.layers[0].height as usize;
        let want_cols = self.layers[0].width as usize;
        let found_rows = input.len();
        let found_cols = input.first().map(Vec::len).unwrap_or(0);
        if found_rows != want_rows || input.iter().any(|row| row.len() != want_cols) {
            return Err(EngineError::InputShape {
                found_rows,
                found_cols,
                want_rows,
                want_cols,
            });
        }

        let mut current: Vec<f32> = input
            .iter()
            .flat_map(|row| row.iter().map(|&v| v as f32))
            .collect();

        let gpu = if self.gpu_requested {
            self.gpu.as_ref()
        } else {
            None
        };
        for layer in &self.layers[1..] {
            let raw = match gpu {
                Some(ctx) => {
                    let flat: Vec<f32> = layer.weights.iter().flatten().copied().collect();
                    ctx.dense_forward(&flat, &layer.biases, &current, layer.neurons())?
                }
                None => cpu_dense(layer, &current),
            };
            current = apply_activation(layer.activation, raw);
        }

        self.last_output = current.into_iter().map(f64::from).collect();
        Ok(())
    }
}
