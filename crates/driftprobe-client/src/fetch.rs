//! Artifact fetching: manifest, model files, MNIST shards.
//!
//! Fetching is deliberately dumb: no retries (re-running the pipeline is the
//! retry), no content verification, no partial-download recovery. Model files
//! are pulled fresh on every run (re-runs overwrite); MNIST shards are only
//! pulled when absent locally.

use std::path::{Path, PathBuf};

use thiserror::Error;

use driftprobe_core::dataset::MNIST_SHARDS;
use driftprobe_core::report::ManifestEntry;

/// Errors talking to the host.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        source: reqwest::Error,
    },

    #[error("host returned {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("manifest at {url} is not parseable: {source}")]
    BadManifest {
        url: String,
        source: serde_json::Error,
    },

    #[error("writing {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A manifest may be a bare array or wrapped in `{"models": [...]}`.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ManifestDoc {
    Bare(Vec<ManifestEntry>),
    Wrapped { models: Vec<ManifestEntry> },
}

/// HTTP client bound to one host base URL.
pub struct Fetcher {
    client: reqwest::Client,
    base: String,
}

impl Fetcher {
    /// Create a fetcher for a host base like `http://192.168.1.20:8080`.
    pub fn new(host_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: host_base.trim_end_matches('/').to_string(),
        }
    }

    /// The host base URL this fetcher talks to.
    pub fn base(&self) -> &str {
        &self.base
    }

    async fn get_ok(&self, url: &str) -> Result<reqwest::Response, HostError> {
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|source| HostError::Transport {
                    url: url.to_string(),
                    source,
                })?;
        if !response.status().is_success() {
            return Err(HostError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }
        Ok(response)
    }

    /// GET `<host>/models/manifest.json` and decode it.
    pub async fn fetch_manifest(&self) -> Result<Vec<ManifestEntry>, HostError> {
        let url = format!("{}/models/manifest.json", self.base);
        let body = self
            .get_ok(&url)
            .await?
            .text()
            .await
            .map_err(|source| HostError::Transport {
                url: url.clone(),
                source,
            })?;
        let doc: ManifestDoc =
            serde_json::from_str(&body).map_err(|source| HostError::BadManifest {
                url: url.clone(),
                source,
            })?;
        Ok(match doc {
            ManifestDoc::Bare(entries) => entries,
            ManifestDoc::Wrapped { models } => models,
        })
    }

    /// GET `url` and copy the body to `dest`, creating parent directories.
    ///
    /// Not atomic: a failed transfer may leave a partial file, which the next
    /// run overwrites.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<(), HostError> {
        let response = self.get_ok(url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| HostError::Transport {
                url: url.to_string(),
                source,
            })?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|source| HostError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(dest, &bytes).map_err(|source| HostError::Write {
            path: dest.to_path_buf(),
            source,
        })
    }

    /// Download every manifest model into `models_dir`, in manifest order.
    ///
    /// Entries with an empty `filename` are skipped. Returns the local path
    /// per downloaded model.
    pub async fn download_models(
        &self,
        manifest: &[ManifestEntry],
        models_dir: &Path,
    ) -> Result<Vec<(ManifestEntry, PathBuf)>, HostError> {
        let mut downloaded = Vec::new();
        for entry in manifest {
            if entry.filename.is_empty() {
                log::warn!("manifest entry '{}' has no filename, skipping", entry.id);
                continue;
            }
            let url = format!("{}/models/{}", self.base, entry.filename);
            let dest = models_dir.join(&entry.filename);
            log::info!("pulling model {} -> {}", url, dest.display());
            self.download(&url, &dest).await?;
            downloaded.push((entry.clone(), dest));
        }
        Ok(downloaded)
    }

    /// Download any of the four MNIST shards missing from `local_dir`.
    ///
    /// Present files are left untouched and cause no network I/O, so a second
    /// call right after a successful first one is a no-op.
    pub async fn ensure_mnist(&self, local_dir: &Path) -> Result<(), HostError> {
        for name in MNIST_SHARDS {
            let dest = local_dir.join(name);
            if dest.exists() {
                log::debug!("mnist shard {name} already present");
                continue;
            }
            let url = format!("{}/mnist/{name}", self.base);
            log::info!("pulling mnist shard {url}");
            self.download(&url, &dest).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let fetcher = Fetcher::new("http://host:8080/");
        assert_eq!(fetcher.base(), "http://host:8080");
    }

    #[test]
    fn manifest_decodes_bare_and_wrapped_forms() {
        let bare: ManifestDoc =
            serde_json::from_str(r#"[{"id":"S1","filename":"mnist_S1.json"}]"#).unwrap();
        let wrapped: ManifestDoc =
            serde_json::from_str(r#"{"models":[{"id":"S1","filename":"mnist_S1.json"}]}"#)
                .unwrap();
        for doc in [bare, wrapped] {
            let entries = match doc {
                ManifestDoc::Bare(e) => e,
                ManifestDoc::Wrapped { models } => models,
            };
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].id, "S1");
        }
    }

    #[tokio::test]
    async fn ensure_mnist_skips_network_when_shards_exist() {
        let dir = tempfile::tempdir().unwrap();
        for name in MNIST_SHARDS {
            std::fs::write(dir.path().join(name), b"present").unwrap();
        }
        // The base URL is unreachable; success proves nothing was fetched.
        let fetcher = Fetcher::new("http://127.0.0.1:1");
        fetcher.ensure_mnist(dir.path()).await.unwrap();
        for name in MNIST_SHARDS {
            assert_eq!(std::fs::read(dir.path().join(name)).unwrap(), b"present");
        }
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let fetcher = Fetcher::new("http://127.0.0.1:1");
        let err = fetcher.fetch_manifest().await.unwrap_err();
        assert!(matches!(err, HostError::Transport { .. }));
    }
}
