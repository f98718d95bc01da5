use std::path::Path;

use driftprobe_client::{PipelineConfig, run_pipeline};
use driftprobe_core::report::SourceTag;

pub fn run(host: &str, source: &str, base: Option<&Path>) {
    let source: SourceTag = match source.parse() {
        Ok(tag) => tag,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };
    let public_dir = super::resolve_data_dir(base);

    println!("🛰  driftprobe telemetry v{}", driftprobe_core::VERSION);
    println!("   host:   {host}");
    println!("   source: {source}");
    println!("   data:   {}", public_dir.display());
    println!();

    let config = PipelineConfig {
        host_base: host.to_string(),
        source,
        public_dir,
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    match rt.block_on(run_pipeline(&config)) {
        Ok(outcome) => {
            let report = &outcome.report;
            println!("\n{}", "=".repeat(72));
            println!(
                "{:<24} {:>7} {:>7} {:>6} {:>12} {:>12}",
                "Model", "CPU%", "GPU%", "Agree", "Avg MAE", "Max |Δ|"
            );
            println!("{}", "-".repeat(72));
            for run in &report.per_model {
                let gpu_marker = if run.webgpu_init_ok { "" } else { " (cpu fallback)" };
                println!(
                    "  {:<22} {:>6.1} {:>7.1} {:>4}/{} {:>12.6} {:>12.6}{}",
                    run.model_file,
                    run.adhd10.top1_accuracy_cpu,
                    run.adhd10.top1_accuracy_gpu,
                    run.adhd10.cpu_vs_gpu_agree_count,
                    run.cpu.len(),
                    run.adhd10.avg_drift_mae,
                    run.adhd10.max_drift_max_abs,
                    gpu_marker,
                );
            }
            if report.per_model.is_empty() {
                println!("  (no models evaluated)");
            }
            println!();
            println!("📄 Report: {}", outcome.report_path.display());
            println!("   machine {}  pushed to {}", report.machine_id, report.from_host);
        }
        Err(e) => {
            eprintln!("Pipeline failed: {e}");
            std::process::exit(1);
        }
    }
}
