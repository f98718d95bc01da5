//! Data-directory resolution.
//!
//! The harness keeps all artifacts under one `public/` tree shared by the
//! host's serve side and the client's cache/report side:
//!
//! ```text
//! public/
//!   models/manifest.json
//!   models/<file>.json
//!   mnist/{train,t10k}-{images-idx3,labels-idx1}-ubyte
//!   reports/telemetry_<hex32>_<unix>.json      # host-received uploads
//!   reports_local/telemetry_<hex32>_<unix>.json # client-side copies
//! ```
//!
//! Resolution order: the `PARAGON_DATA_DIR` environment variable, then an
//! explicit `--base` override, then `public/` next to the executable
//! (created if absent).

use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "PARAGON_DATA_DIR";

/// Resolve the `public` data directory, creating it if absent.
pub fn resolve_public_dir(base_flag: Option<&Path>) -> std::io::Result<PathBuf> {
    let dir = match std::env::var(DATA_DIR_ENV) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v),
        _ => match base_flag {
            Some(base) => base.to_path_buf(),
            None => default_public_dir(),
        },
    };
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// `public/` next to the running executable, falling back to the working
/// directory when the executable path cannot be determined.
fn default_public_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("public")
}

/// Subdirectory of the data dir holding the client's local report copies.
pub fn reports_local_dir(public_dir: &Path) -> PathBuf {
    public_dir.join("reports_local")
}

/// Subdirectory of the data dir the host saves uploaded reports into.
pub fn reports_dir(public_dir: &Path) -> PathBuf {
    public_dir.join("reports")
}

/// Subdirectory of the data dir holding MNIST shards.
pub fn mnist_dir(public_dir: &Path) -> PathBuf {
    public_dir.join("mnist")
}

/// Subdirectory of the data dir holding model files and the manifest.
pub fn models_dir(public_dir: &Path) -> PathBuf {
    public_dir.join("models")
}
