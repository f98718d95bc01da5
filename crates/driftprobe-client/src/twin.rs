//! Twin-instance protocol.
//!
//! For each model the pipeline builds two engine handles from one exported
//! weight state: a CPU-only handle and a GPU-enabled handle. When GPU
//! acquisition fails the GPU handle keeps running on the CPU — the report
//! still carries a full twin comparison, flagged `webgpu_init_ok = false`,
//! so aggregators can tell a real GPU run from a degenerate one.

use std::path::Path;
use std::time::Instant;

use driftprobe_core::dataset::Image;
use driftprobe_engine::{EngineError, Network};

/// The two handles for one model, plus the GPU acquisition outcome.
#[derive(Debug)]
pub struct TwinHandles {
    pub cpu: Network,
    pub gpu: Network,
    pub webgpu_init_ok: bool,
    pub webgpu_init_time_ms: f64,
}

impl TwinHandles {
    /// Load a model and construct both execution handles from its weights.
    ///
    /// `warmup` is the digit-0 probe image; one forward pass on it after a
    /// successful GPU init amortizes pipeline JIT out of the measurements.
    pub fn build(model_path: &Path, warmup: Option<&Image>) -> Result<Self, EngineError> {
        let cpu = Network::load(model_path)?;
        let state = cpu.export_state();
        let mut gpu = Network::fresh(&cpu.topology())?;
        gpu.import_state(&state)?;
        gpu.set_gpu(true);

        let t0 = Instant::now();
        let init = gpu.init_gpu();
        let webgpu_init_time_ms = t0.elapsed().as_secs_f64() * 1000.0;

        let webgpu_init_ok = match init {
            Ok(()) => {
                if let Some(image) = warmup
                    && let Err(e) = gpu.forward(image)
                {
                    log::warn!("GPU warm-up forward failed: {e}");
                }
                true
            }
            Err(e) => {
                log::warn!(
                    "GPU init failed for {}: {e}; GPU handle falls back to CPU execution",
                    model_path.display()
                );
                gpu.set_gpu(false);
                false
            }
        };

        Ok(Self {
            cpu,
            gpu,
            webgpu_init_ok,
            webgpu_init_time_ms,
        })
    }
}

impl Drop for TwinHandles {
    // GPU release must happen before the model's scope is left, on every path.
    fn drop(&mut self) {
        self.gpu.cleanup_gpu();
        self.cpu.cleanup_gpu();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_test_model;

    #[test]
    fn twins_share_identical_weights() {
        let (_dir, path) = write_test_model();
        let twin = TwinHandles::build(&path, None).unwrap();
        assert_eq!(twin.cpu.export_state(), twin.gpu.export_state());
        assert_eq!(twin.cpu.topology(), twin.gpu.topology());
        assert!(twin.webgpu_init_time_ms >= 0.0);
    }

    #[test]
    fn failed_gpu_init_falls_back_to_cpu() {
        let (_dir, path) = write_test_model();
        let mut twin = TwinHandles::build(&path, None).unwrap();
        if !twin.webgpu_init_ok {
            // The GPU handle must produce CPU-identical outputs.
            let input = vec![vec![0.25, 0.75]];
            twin.cpu.forward(&input).unwrap();
            twin.gpu.forward(&input).unwrap();
            assert_eq!(twin.cpu.extract_output(), twin.gpu.extract_output());
            assert!(!twin.gpu.gpu_active());
        }
    }

    #[test]
    fn missing_model_file_is_an_engine_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TwinHandles::build(&dir.path().join("nope.json"), None).unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }
}
