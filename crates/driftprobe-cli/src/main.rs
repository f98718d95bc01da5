//! CLI for driftprobe — does the same model answer the same way on every chip?

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "driftprobe")]
#[command(about = "driftprobe — cross-device inference conformance and drift harness")]
#[command(version = driftprobe_core::VERSION)]
struct Cli {
    /// Data directory override (PARAGON_DATA_DIR takes precedence;
    /// default: public/ next to the executable)
    #[arg(long, global = true)]
    base: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Telemetry: pull models and MNIST from a host, run the twin CPU/GPU
    /// probe per model, push the report back
    Telemetry {
        /// Host base URL, e.g. http://192.168.1.20:8080
        #[arg(long)]
        host: String,

        /// Source tag embedded in the report
        #[arg(long, default_value = "native", value_parser = ["native", "wasm-bun", "wasm-ionic"])]
        source: String,
    },

    /// Start the artifact host: models, MNIST shards, reports, upload intake
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Bind address
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },

    /// Print the machine identity snapshot and its fingerprint
    Probe {
        /// Emit JSON instead of the summary
        #[arg(long)]
        json: bool,
    },

    /// Inspect local MNIST shards: counts, dimensions, per-digit sample index
    Dataset {
        /// Directory with the four IDX shards (default: <data dir>/mnist)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Telemetry { host, source } => {
            commands::telemetry::run(&host, &source, cli.base.as_deref())
        }
        Commands::Serve { port, host } => commands::serve::run(&host, port, cli.base.as_deref()),
        Commands::Probe { json } => commands::probe::run(json),
        Commands::Dataset { dir } => commands::dataset::run(dir.as_deref(), cli.base.as_deref()),
    }
}
