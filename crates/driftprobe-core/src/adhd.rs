//! ADHD10 diagnostics: the 10-digit accuracy / agreement / drift rollup.
//!
//! Each probe sample is labeled against ground truth on both execution paths,
//! then rolled up into bucket counters, top-1 accuracies, a path-agreement
//! count, and aggregate drift magnitudes.

use serde::{Deserialize, Serialize};

use crate::drift::DriftMetrics;
use crate::report::SampleTiming;

/// Prediction quality label relative to ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bucket {
    #[serde(rename = "correct")]
    Correct,
    #[serde(rename = "off_by_1")]
    OffBy1,
    #[serde(rename = "wrong")]
    Wrong,
}

/// Whether the CPU and GPU paths predicted the same digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Agreement {
    #[serde(rename = "agree")]
    Agree,
    #[serde(rename = "disagree")]
    Disagree,
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Correct => write!(f, "correct"),
            Self::OffBy1 => write!(f, "off_by_1"),
            Self::Wrong => write!(f, "wrong"),
        }
    }
}

impl std::fmt::Display for Agreement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Agree => write!(f, "agree"),
            Self::Disagree => write!(f, "disagree"),
        }
    }
}

/// Label a prediction against ground truth.
///
/// `off_by_1` is the diagnostic label for a miss by exactly one digit; in the
/// counter rollup such a miss is *also* counted as `wrong`.
pub fn bucket_for(pred: u8, truth: u8) -> Bucket {
    if pred == truth {
        Bucket::Correct
    } else if pred.abs_diff(truth) == 1 {
        Bucket::OffBy1
    } else {
        Bucket::Wrong
    }
}

/// The eight ADHD10 counters.
///
/// `cpu_correct + cpu_wrong == N`, `gpu_correct + gpu_wrong == N`, and
/// `agree + disagree == N`. The `off_by_1` counters overlap with `wrong`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdhdBuckets {
    pub cpu_correct: u32,
    pub cpu_wrong: u32,
    pub cpu_off_by_1: u32,
    pub gpu_correct: u32,
    pub gpu_wrong: u32,
    pub gpu_off_by_1: u32,
    pub agree: u32,
    pub disagree: u32,
}

/// Per-sample diagnostic row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdhdSample {
    pub digit: u8,
    pub idx: usize,
    pub cpu_pred: u8,
    pub gpu_pred: u8,
    pub cpu_bucket: Bucket,
    pub gpu_bucket: Bucket,
    pub agreement: Agreement,
}

/// The full ADHD10 rollup for one model run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdhdScore {
    /// CPU top-1 accuracy as a percentage in `[0, 100]`.
    pub top1_accuracy_cpu: f64,
    /// GPU top-1 accuracy as a percentage in `[0, 100]`.
    pub top1_accuracy_gpu: f64,
    /// Positions where the two paths predicted the same digit.
    pub cpu_vs_gpu_agree_count: u32,
    pub avg_drift_mae: f64,
    pub max_drift_max_abs: f64,
    pub buckets: AdhdBuckets,
    pub per_sample: Vec<AdhdSample>,
}

/// Roll up the aligned CPU/GPU/drift arrays of one model run.
///
/// The arrays are positionally aligned: `cpu[i]`, `gpu[i]`, and `drift[i]`
/// refer to the same `(digit, idx)` probe. Ground truth for a sample is its
/// probe digit. Empty input yields a zeroed score.
pub fn score_probe(cpu: &[SampleTiming], gpu: &[SampleTiming], drift: &[DriftMetrics]) -> AdhdScore {
    if cpu.is_empty() || gpu.is_empty() || drift.is_empty() {
        return AdhdScore::default();
    }
    let n = cpu.len().min(gpu.len()).min(drift.len());

    let mut buckets = AdhdBuckets::default();
    let mut per_sample = Vec::with_capacity(n);
    let mut mae_sum = 0.0f64;
    let mut max_abs = 0.0f64;

    for i in 0..n {
        let truth = cpu[i].digit;
        let cpu_bucket = bucket_for(cpu[i].pred, truth);
        let gpu_bucket = bucket_for(gpu[i].pred, truth);

        if cpu[i].pred == truth {
            buckets.cpu_correct += 1;
        } else {
            buckets.cpu_wrong += 1;
        }
        if cpu[i].pred.abs_diff(truth) == 1 {
            buckets.cpu_off_by_1 += 1;
        }
        if gpu[i].pred == truth {
            buckets.gpu_correct += 1;
        } else {
            buckets.gpu_wrong += 1;
        }
        if gpu[i].pred.abs_diff(truth) == 1 {
            buckets.gpu_off_by_1 += 1;
        }

        let agreement = if cpu[i].pred == gpu[i].pred {
            buckets.agree += 1;
            Agreement::Agree
        } else {
            buckets.disagree += 1;
            Agreement::Disagree
        };

        mae_sum += drift[i].mae;
        if drift[i].max_abs > max_abs {
            max_abs = drift[i].max_abs;
        }

        per_sample.push(AdhdSample {
            digit: truth,
            idx: cpu[i].idx,
            cpu_pred: cpu[i].pred,
            gpu_pred: gpu[i].pred,
            cpu_bucket,
            gpu_bucket,
            agreement,
        });
    }

    AdhdScore {
        top1_accuracy_cpu: f64::from(buckets.cpu_correct) / n as f64 * 100.0,
        top1_accuracy_gpu: f64::from(buckets.gpu_correct) / n as f64 * 100.0,
        cpu_vs_gpu_agree_count: buckets.agree,
        avg_drift_mae: mae_sum / n as f64,
        max_drift_max_abs: max_abs,
        buckets,
        per_sample,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(digit: u8, idx: usize, pred: u8) -> SampleTiming {
        SampleTiming {
            digit,
            idx,
            elapsed_ms: 0.5,
            pred,
            top1_score: 0.9,
            output: vec![0.0; 10],
        }
    }

    fn zero_drift(digit: u8, idx: usize) -> DriftMetrics {
        DriftMetrics {
            digit,
            idx,
            max_abs: 0.0,
            mae: 0.0,
        }
    }

    #[test]
    fn bucket_labeling_matches_contract() {
        // truth=5: predictions 5, 4, 6, 2 label as correct, off_by_1, off_by_1, wrong.
        assert_eq!(bucket_for(5, 5), Bucket::Correct);
        assert_eq!(bucket_for(4, 5), Bucket::OffBy1);
        assert_eq!(bucket_for(6, 5), Bucket::OffBy1);
        assert_eq!(bucket_for(2, 5), Bucket::Wrong);
    }

    #[test]
    fn bucket_serde_names() {
        assert_eq!(
            serde_json::to_string(&Bucket::OffBy1).unwrap(),
            "\"off_by_1\""
        );
        assert_eq!(
            serde_json::to_string(&Agreement::Disagree).unwrap(),
            "\"disagree\""
        );
    }

    #[test]
    fn empty_inputs_yield_zeroed_score() {
        let score = score_probe(&[], &[], &[]);
        assert_eq!(score, AdhdScore::default());
        assert!(score.per_sample.is_empty());
    }

    #[test]
    fn counters_partition_the_sample_count() {
        let cpu = vec![timing(0, 5, 0), timing(1, 6, 2), timing(2, 7, 3)];
        let gpu = vec![timing(0, 5, 0), timing(1, 6, 1), timing(2, 7, 9)];
        let drift = vec![zero_drift(0, 5), zero_drift(1, 6), zero_drift(2, 7)];
        let score = score_probe(&cpu, &gpu, &drift);

        let n = score.per_sample.len() as u32;
        assert_eq!(n, 3);
        assert_eq!(score.buckets.cpu_correct + score.buckets.cpu_wrong, n);
        assert_eq!(score.buckets.gpu_correct + score.buckets.gpu_wrong, n);
        assert_eq!(score.buckets.agree + score.buckets.disagree, n);
        // cpu: correct, off-by-one (also wrong), wrong
        assert_eq!(score.buckets.cpu_correct, 1);
        assert_eq!(score.buckets.cpu_wrong, 2);
        assert_eq!(score.buckets.cpu_off_by_1, 1);
    }

    #[test]
    fn off_by_1_overlaps_wrong() {
        let cpu = vec![timing(5, 0, 4)];
        let gpu = vec![timing(5, 0, 4)];
        let drift = vec![zero_drift(5, 0)];
        let score = score_probe(&cpu, &gpu, &drift);
        assert_eq!(score.buckets.cpu_wrong, 1);
        assert_eq!(score.buckets.cpu_off_by_1, 1);
        assert_eq!(score.buckets.cpu_correct, 0);
    }

    #[test]
    fn disagreement_is_per_position() {
        let cpu = vec![timing(5, 0, 5)];
        let gpu = vec![timing(5, 0, 4)];
        let drift = vec![zero_drift(5, 0)];
        let score = score_probe(&cpu, &gpu, &drift);
        assert_eq!(score.per_sample[0].agreement, Agreement::Disagree);
        assert_eq!(score.cpu_vs_gpu_agree_count, 0);
        assert_eq!(score.buckets.disagree, 1);
    }

    #[test]
    fn accuracies_are_percentages() {
        let cpu: Vec<SampleTiming> = (0..4).map(|d| timing(d, d as usize, d)).collect();
        let mut gpu = cpu.clone();
        gpu[0].pred = 9;
        let drift: Vec<DriftMetrics> = (0..4).map(|d| zero_drift(d, d as usize)).collect();
        let score = score_probe(&cpu, &gpu, &drift);
        assert_eq!(score.top1_accuracy_cpu, 100.0);
        assert_eq!(score.top1_accuracy_gpu, 75.0);
    }

    #[test]
    fn drift_aggregates_average_and_peak() {
        let cpu = vec![timing(0, 0, 0), timing(1, 1, 1)];
        let gpu = cpu.clone();
        let drift = vec![
            DriftMetrics {
                digit: 0,
                idx: 0,
                max_abs: 0.2,
                mae: 0.1,
            },
            DriftMetrics {
                digit: 1,
                idx: 1,
                max_abs: 0.6,
                mae: 0.3,
            },
        ];
        let score = score_probe(&cpu, &gpu, &drift);
        assert!((score.avg_drift_mae - 0.2).abs() < 1e-12);
        assert_eq!(score.max_drift_max_abs, 0.6);
    }
}
