//! GPU execution backend.
//!
//! On macOS the dense layer sums are dispatched to Metal, one thread per
//! output neuron, over shared-mode buffers (unified memory, no copies). On
//! every other platform `GpuContext::new` fails and callers are expected to
//! fall back to CPU execution — the harness treats that as a first-class,
//! reportable outcome rather than an abort.

#[cfg(target_os = "macos")]
mod backend {
    use metal::{
        CommandQueue, CompileOptions, ComputePipelineState, Device, MTLResourceOptions, MTLSize,
    };

    use crate::model::EngineError;

    /// An acquired Metal device with the dense-forward pipeline compiled.
    #[derive(Debug)]
    pub struct GpuContext {
        device: Device,
        queue: CommandQueue,
        pipeline: ComputePipelineState,
    }

    impl GpuContext {
        pub fn new() -> Result<Self, EngineError> {
            let device = Device::system_default()
                .ok_or_else(|| EngineError::GpuInit("no Metal device available".to_string()))?;
            let queue = device.new_command_queue();
            let source = include_str!("shaders/forward.metal");
            let library = device
                .new_library_with_source(source, &CompileOptions::new())
                .map_err(|e| EngineError::GpuInit(format!("shader compile failed: {e}")))?;
            let function = library
                .get_function("dense_forward", None)
                .map_err(|e| EngineError::GpuInit(format!("kernel lookup failed: {e}")))?;
            let pipeline = device
                .new_compute_pipeline_state_with_function(&function)
                .map_err(|e| EngineError::GpuInit(format!("pipeline creation failed: {e}")))?;
            Ok(Self {
                device,
                queue,
                pipeline,
            })
        }

        pub fn device_name(&self) -> String {
            self.device.name().to_string()
        }

        /// One dense layer: `out[n] = bias[n] + Σ_i weights[n*in_len + i] * input[i]`.
        pub fn dense_forward(
            &self,
            weights: &[f32],
            biases: &[f32],
            input: &[f32],
            out_len: usize,
        ) -> Result<Vec<f32>, EngineError> {
            if weights.len() != out_len * input.len() || biases.len() != out_len || out_len == 0 {
                return Err(EngineError::Gpu(format!(
                    "buffer shape mismatch: {} weights, {} biases, {} inputs, {out_len} outputs",
                    weights.len(),
                    biases.len(),
                    input.len()
                )));
            }

            let make_buffer = |data: &[f32]| {
                self.device.new_buffer_with_data(
                    data.as_ptr() as *const std::ffi::c_void,
                    std::mem::size_of_val(data) as u64,
                    MTLResourceOptions::StorageModeShared,
                )
            };
            let weights_buf = make_buffer(weights);
            let biases_buf = make_buffer(biases);
            let input_buf = make_buffer(input);
            let output_buf = self.device.new_buffer(
                (out_len * std::mem::size_of::<f32>()) as u64,
                MTLResourceOptions::StorageModeShared,
            );
            let dims: [u32; 2] = [input.len() as u32, out_len as u32];
            let dims_buf = self.device.new_buffer_with_data(
                dims.as_ptr() as *const std::ffi::c_void,
                std::mem::size_of_val(&dims) as u64,
                MTLResourceOptions::StorageModeShared,
            );

            let command_buffer = self.queue.new_command_buffer();
            let encoder = command_buffer.new_compute_command_encoder();
            encoder.set_compute_pipeline_state(&self.pipeline);
            encoder.set_buffer(0, Some(&weights_buf), 0);
            encoder.set_buffer(1, Some(&biases_buf), 0);
            encoder.set_buffer(2, Some(&input_buf), 0);
            encoder.set_buffer(3, Some(&output_buf), 0);
            encoder.set_buffer(4, Some(&dims_buf), 0);

            let threadgroup = MTLSize {
                width: self
                    .pipeline
                    .max_total_threads_per_threadgroup()
                    .min(out_len as u64),
                height: 1,
                depth: 1,
            };
            let grid = MTLSize {
                width: out_len as u64,
                height: 1,
                depth: 1,
            };
            encoder.dispatch_threads(grid, threadgroup);
            encoder.end_encoding();

            command_buffer.commit();
            command_buffer.wait_until_completed();

            // SAFETY: output_buf is shared-mode and exactly out_len floats long.
            let out = unsafe {
                std::slice::from_raw_parts(output_buf.contents() as *const f32, out_len)
            };
            Ok(out.to_vec())
        }
    }
}

#[cfg(not(target_os = "macos"))]
mod backend {
    use crate::model::EngineError;

    /// Placeholder backend: acquisition always fails on this platform.
    #[derive(Debug)]
    pub struct GpuContext {
        _private: (),
    }

    impl GpuContext {
        pub fn new() -> Result<Self, EngineError> {
            Err(EngineError::GpuInit(
                "no GPU backend on this platform".to_string(),
            ))
        }

        pub fn device_name(&self) -> String {
            String::new()
        }

        pub fn dense_forward(
            &self,
            _weights: &[f32],
            _biases: &[f32],
            _input: &[f32],
            _out_len: usize,
        ) -> Result<Vec<f32>, EngineError> {
            Err(EngineError::Gpu("GPU backend not initialized".to_string()))
        }
    }
}

pub use backend::GpuContext;
