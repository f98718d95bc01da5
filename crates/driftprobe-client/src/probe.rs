//! The 10-digit probe: timed twin forward passes per digit.
//!
//! Digits run in ascending order. A digit missing from the dataset, or a
//! forward failure on either path, skips that digit and keeps going — the
//! three output arrays always stay positionally aligned.

use std::time::Instant;

use driftprobe_core::dataset::{Image, SampleIndex};
use driftprobe_core::drift::DriftMetrics;
use driftprobe_core::report::{SampleTiming, round6_vec};
use driftprobe_engine::{EngineError, Network};

use crate::twin::TwinHandles;

/// Aligned probe results for one model.
pub struct ProbeOutcome {
    pub cpu: Vec<SampleTiming>,
    pub gpu: Vec<SampleTiming>,
    pub drift: Vec<DriftMetrics>,
}

/// Index and value of the largest element (first on ties).
pub fn argmax(values: &[f64]) -> (u8, f64) {
    let mut best = 0usize;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    (best as u8, values.get(best).copied().unwrap_or(0.0))
}

/// One timed forward + extraction. Returns the report row and the unrounded
/// output vector (drift is computed on the latter).
fn timed_pass(
    net: &mut Network,
    image: &Image,
    digit: u8,
    idx: usize,
) -> Result<(SampleTiming, Vec<f64>), EngineError> {
    let t0 = Instant::now();
    net.forward(image)?;
    let output = net.extract_output();
    let elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0;
    let (pred, top1_score) = argmax(&output);
    Ok((
        SampleTiming {
            digit,
            idx,
            elapsed_ms,
            pred,
            top1_score,
            output: round6_vec(&output),
        },
        output,
    ))
}

/// Run the full probe sequence for one model's twin handles.
pub fn run_probe(twin: &mut TwinHandles, images: &[Image], index: &SampleIndex) -> ProbeOutcome {
    let mut outcome = ProbeOutcome {
        cpu: Vec::with_capacity(10),
        gpu: Vec::with_capacity(10),
        drift: Vec::with_capacity(10),
    };

    for digit in 0..=9u8 {
        let Some(&idx) = index.get(&digit) else {
            log::warn!("digit {digit} has no sample in the dataset, skipping");
            continue;
        };
        let Some(image) = images.get(idx) else {
            log::warn!("sample index {idx} for digit {digit} is out of range, skipping");
            continue;
        };

        let (cpu_timing, cpu_raw) = match timed_pass(&mut twin.cpu, image, digit, idx) {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("cpu forward failed for digit {digit}: {e}");
                continue;
            }
        };
        let (gpu_timing, gpu_raw) = match timed_pass(&mut twin.gpu, image, digit, idx) {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("gpu forward failed for digit {digit}: {e}");
                continue;
            }
        };

        outcome
            .drift
            .push(DriftMetrics::between(digit, idx, &cpu_raw, &gpu_raw));
        outcome.cpu.push(cpu_timing);
        outcome.gpu.push(gpu_timing);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{test_corpus, write_test_model};

    #[test]
    fn argmax_picks_first_of_ties() {
        assert_eq!(argmax(&[0.1, 0.5, 0.5, 0.2]), (1, 0.5));
        assert_eq!(argmax(&[]), (0, 0.0));
    }

    #[test]
    fn probe_covers_all_present_digits_in_order() {
        let (_dir, path) = write_test_model();
        let (images, index) = test_corpus();
        let mut twin = TwinHandles::build(&path, index.get(&0).map(|&i| &images[i])).unwrap();

        let outcome = run_probe(&mut twin, &images, &index);
        assert_eq!(outcome.cpu.len(), 10);
        assert_eq!(outcome.gpu.len(), 10);
        assert_eq!(outcome.drift.len(), 10);
        for (i, cpu) in outcome.cpu.iter().enumerate() {
            assert_eq!(cpu.digit, i as u8);
            assert_eq!(outcome.gpu[i].digit, cpu.digit);
            assert_eq!(outcome.drift[i].digit, cpu.digit);
            assert_eq!(outcome.gpu[i].idx, cpu.idx);
            assert_eq!(outcome.drift[i].idx, cpu.idx);
            assert!(cpu.elapsed_ms >= 0.0);
            assert_eq!(cpu.output.len(), 10);
        }
    }

    #[test]
    fn missing_digit_is_skipped_not_fatal() {
        let (_dir, path) = write_test_model();
        let (images, mut index) = test_corpus();
        index.remove(&5);
        let mut twin = TwinHandles::build(&path, None).unwrap();

        let outcome = run_probe(&mut twin, &images, &index);
        assert_eq!(outcome.cpu.len(), 9);
        assert!(outcome.cpu.iter().all(|t| t.digit != 5));
    }

    #[test]
    fn cpu_fallback_twin_produces_zero_drift() {
        let (_dir, path) = write_test_model();
        let (images, index) = test_corpus();
        let mut twin = TwinHandles::build(&path, None).unwrap();
        if twin.webgpu_init_ok {
            return; // a real GPU may drift; this test pins the fallback path
        }

        let outcome = run_probe(&mut twin, &images, &index);
        for (i, drift) in outcome.drift.iter().enumerate() {
            assert_eq!(drift.max_abs, 0.0);
            assert_eq!(drift.mae, 0.0);
            assert_eq!(outcome.cpu[i].output, outcome.gpu[i].output);
            assert_eq!(outcome.cpu[i].pred, outcome.gpu[i].pred);
        }
    }

    #[test]
    fn outputs_are_rounded_to_six_decimals() {
        let (_dir, path) = write_test_model();
        let (images, index) = test_corpus();
        let mut twin = TwinHandles::build(&path, None).unwrap();
        let outcome = run_probe(&mut twin, &images, &index);
        for timing in &outcome.cpu {
            for &v in &timing.output {
                assert_eq!(v, driftprobe_core::round6(v));
            }
        }
    }
}
