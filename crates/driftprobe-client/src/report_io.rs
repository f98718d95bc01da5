//! Local report persistence and multipart upload.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use driftprobe_core::paths::reports_local_dir;
use driftprobe_core::report::TelemetryReport;

/// Errors pushing a report to the host. The local file is always retained.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("reading report {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("upload to {url} failed: {source}")]
    Transport {
        url: String,
        source: reqwest::Error,
    },

    #[error("host rejected upload at {url} with {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Canonical report filename: `telemetry_<machine_id>_<unix_epoch>.json`.
pub fn report_filename(machine_id: &str, unix_epoch: u64) -> String {
    format!("telemetry_{machine_id}_{unix_epoch}.json")
}

/// Write the report under `public/reports_local/`, temp-then-rename.
///
/// Returns the final path. The JSON is two-space indented.
pub fn write_report_local(
    public_dir: &Path,
    report: &TelemetryReport,
) -> std::io::Result<PathBuf> {
    let dir = reports_local_dir(public_dir);
    std::fs::create_dir_all(&dir)?;

    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let filename = report_filename(&report.machine_id, epoch);
    let json = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;

    let tmp = dir.join(format!("{filename}.tmp"));
    std::fs::write(&tmp, &json)?;
    let path = dir.join(&filename);
    std::fs::rename(&tmp, &path)?;
    Ok(path)
}

/// POST the report file to `<host>/upload` as a multipart form.
///
/// The JSON bytes travel under form field `file`; the target filename under
/// field `name`. Returns the host's response document.
pub async fn upload_report(
    host_base: &str,
    report_path: &Path,
) -> Result<serde_json::Value, UploadError> {
    let bytes = std::fs::read(report_path).map_err(|source| UploadError::Read {
        path: report_path.to_path_buf(),
        source,
    })?;
    let filename = report_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.json".to_string());

    let url = format!("{}/upload", host_base.trim_end_matches('/'));
    let form = reqwest::multipart::Form::new()
        .part(
            "file",
            reqwest::multipart::Part::bytes(bytes).file_name(filename.clone()),
        )
        .text("name", filename);

    let response = reqwest::Client::new()
        .post(&url)
        .multipart(form)
        .send()
        .await
        .map_err(|source| UploadError::Transport {
            url: url.clone(),
            source,
        })?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(UploadError::Status { url, status, body });
    }
    Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::Null))
}
