//! The telemetry pipeline orchestrator.
//!
//! One invocation runs the fixed stage sequence:
//!
//! ```text
//! probe_system -> fetch_manifest -> download_models ->
//! ensure_mnist -> load_dataset   -> for each model {
//!     run_probe -> compute_adhd -> append ModelRun
//! } -> compose_report -> write_local -> upload
//! ```
//!
//! Failures before the model loop abort the invocation. Failures inside the
//! loop are logged and the loop continues (the failed model contributes no
//! `ModelRun`). An upload failure is surfaced after the local report has
//! been written, and the local file is kept for manual retry.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use thiserror::Error;

use driftprobe_core::adhd::score_probe;
use driftprobe_core::dataset::{DatasetError, Image, SampleIndex, build_sample_index, load_mnist};
use driftprobe_core::paths::{mnist_dir, models_dir};
use driftprobe_core::report::{ModelRun, REPORT_VERSION, SourceTag, TelemetryReport};
use driftprobe_core::sysinfo::{machine_id, probe_system};
use driftprobe_engine::EngineError;

use crate::fetch::{Fetcher, HostError};
use crate::probe::run_probe;
use crate::report_io::{UploadError, upload_report, write_report_local};
use crate::twin::TwinHandles;

/// Inputs for one pipeline invocation.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Host base URL, e.g. `http://192.168.1.20:8080`.
    pub host_base: String,
    /// Runtime tag embedded in the report.
    pub source: SourceTag,
    /// Local data directory shared with the host layout.
    pub public_dir: PathBuf,
}

/// Fatal pipeline failures, per stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("writing local report: {0}")]
    ReportWrite(#[from] std::io::Error),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// What a successful invocation produced.
pub struct PipelineOutcome {
    /// Local copy of the uploaded report.
    pub report_path: PathBuf,
    /// The composed report.
    pub report: TelemetryReport,
}

fn evaluate_model(
    model_path: &Path,
    model_file: &str,
    images: &[Image],
    index: &SampleIndex,
) -> Result<ModelRun, EngineError> {
    let warmup = index.get(&0).and_then(|&i| images.get(i));
    let mut twin = TwinHandles::build(model_path, warmup)?;
    let outcome = run_probe(&mut twin, images, index);
    let adhd10 = score_probe(&outcome.cpu, &outcome.gpu, &outcome.drift);
    Ok(ModelRun {
        model_file: model_file.to_string(),
        webgpu_init_ok: twin.webgpu_init_ok,
        webgpu_init_time_ms: twin.webgpu_init_time_ms,
        cpu: outcome.cpu,
        gpu: outcome.gpu,
        drift: outcome.drift,
        adhd10,
    })
}

/// Run one full pull → probe → push invocation.
pub async fn run_pipeline(config: &PipelineConfig) -> Result<PipelineOutcome, PipelineError> {
    let started_at = Utc::now();

    log::info!("probing system identity");
    let system = probe_system();
    let machine = machine_id(&system);
    log::info!(
        "machine {machine} ({} / {} / {})",
        system.arch,
        system.os_version,
        system.cpu_model
    );

    let fetcher = Fetcher::new(&config.host_base);
    log::info!("fetching manifest from {}", fetcher.base());
    let manifest = fetcher.fetch_manifest().await?;
    log::info!("manifest lists {} model(s)", manifest.len());

    let models = fetcher
        .download_models(&manifest, &models_dir(&config.public_dir))
        .await?;

    let mnist = mnist_dir(&config.public_dir);
    fetcher.ensure_mnist(&mnist).await?;

    log::info!("loading dataset from {}", mnist.display());
    let (images, labels) = load_mnist(&mnist)?;
    let index = build_sample_index(&labels);
    if index.len() < 10 {
        log::warn!(
            "dataset covers {} of 10 digit classes; absent digits will be skipped",
            index.len()
        );
    }
    let samples: Vec<u8> = index.keys().copied().collect();

    let mut per_model = Vec::with_capacity(models.len());
    for (entry, path) in &models {
        log::info!("evaluating model {}", entry.filename);
        match evaluate_model(path, &entry.filename, &images, &index) {
            Ok(run) => {
                log::info!(
                    "model {}: cpu {:.1}% gpu {:.1}% agree {}/{} avg drift mae {:.6}",
                    entry.filename,
                    run.adhd10.top1_accuracy_cpu,
                    run.adhd10.top1_accuracy_gpu,
                    run.adhd10.cpu_vs_gpu_agree_count,
                    run.cpu.len(),
                    run.adhd10.avg_drift_mae
                );
                per_model.push(run);
            }
            Err(e) => log::warn!("model {} failed: {e}; continuing", entry.filename),
        }
    }

    let report = TelemetryReport {
        version: REPORT_VERSION.to_string(),
        source: config.source,
        machine_id: machine,
        system,
        from_host: fetcher.base().to_string(),
        models_used: models.iter().map(|(e, _)| e.filename.clone()).collect(),
        samples,
        started_at: started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ended_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        per_model,
    };

    let report_path = write_report_local(&config.public_dir, &report)?;
    log::info!("report written to {}", report_path.display());

    match upload_report(&config.host_base, &report_path).await {
        Ok(response) => {
            log::info!(
                "report uploaded: {}",
                response
                    .get("public")
                    .and_then(|v| v.as_str())
                    .unwrap_or("ok")
            );
        }
        Err(e) => {
            log::error!(
                "upload failed: {e}; local report kept at {}",
                report_path.display()
            );
            return Err(e.into());
        }
    }

    Ok(PipelineOutcome {
        report_path,
        report,
    })
}
