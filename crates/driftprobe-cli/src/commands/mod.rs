pub mod dataset;
pub mod probe;
pub mod serve;
pub mod telemetry;

use std::path::{Path, PathBuf};

/// Resolve the data directory or exit with a diagnostic.
pub fn resolve_data_dir(base: Option<&Path>) -> PathBuf {
    match driftprobe_core::resolve_public_dir(base) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Cannot resolve data directory: {e}");
            std::process::exit(1);
        }
    }
}
