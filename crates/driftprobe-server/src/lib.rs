//! # driftprobe-server
//!
//! The artifact host: serves the model catalog, MNIST shards, and collected
//! reports out of a `public/` tree, and accepts telemetry report uploads.
//!
//! The server is an owned [`ServerHandle`] with explicit `start` / `stop` /
//! `status` lifecycle — its existence implies "running"; there is no global
//! mutable server state.
//!
//! ## Endpoints
//!
//! | Method | Path                    | Semantics                                |
//! |--------|-------------------------|------------------------------------------|
//! | GET    | `/healthz`              | `ok`                                     |
//! | GET    | `/whoami`               | bind address, public dir, LAN URLs       |
//! | POST   | `/upload`               | multipart report intake                  |
//! | GET    | `/models/<file>`        | static model / manifest                  |
//! | GET    | `/mnist/<file>`         | static IDX shard                         |
//! | GET    | `/reports/`, `/compiled/`, `/` | static with directory listing     |

mod static_files;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::Router;
use axum::extract::{Multipart, Request, State};
use axum::http::{StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use tower_http::CompressionLevel;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;

use driftprobe_core::paths::reports_dir;

/// How the server should bind and where its artifacts live.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub public_dir: PathBuf,
}

impl ServerConfig {
    /// Default bind (`0.0.0.0:8080`) over the given public directory.
    pub fn new(public_dir: PathBuf) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_dir,
        }
    }
}

/// Startup failures.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("binding {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
}

/// Point-in-time lifecycle snapshot of a running server.
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub running: bool,
    pub addr: String,
    pub public_dir: String,
    pub started_at: String,
}

struct AppState {
    public_dir: PathBuf,
    bind_addr: SocketAddr,
    started_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct WhoamiResponse {
    addr: String,
    public_dir: String,
    urls: Vec<String>,
    started_at: String,
}

#[derive(Serialize)]
struct UploadResponse {
    saved: bool,
    path: String,
    public: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_json(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn unix_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Keep only the final path component of a client-supplied filename.
fn sanitize_filename(raw: &str) -> String {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    if name.is_empty() || name == "." || name == ".." {
        "report.json".to_string()
    } else {
        name.to_string()
    }
}

/// URLs a LAN client can reach this server under.
fn lan_urls(port: u16) -> Vec<String> {
    let mut urls = Vec::new();
    // Route-table lookup without sending a packet: connect() a UDP socket.
    if let Ok(socket) = std::net::UdpSocket::bind("0.0.0.0:0")
        && socket.connect("8.8.8.8:80").is_ok()
        && let Ok(local) = socket.local_addr()
    {
        urls.push(format!("http://{}:{port}", local.ip()));
    }
    urls.push(format!("http://127.0.0.1:{port}"));
    urls
}

async fn handle_healthz() -> &'static str {
    "ok"
}

async fn handle_whoami(State(state): State<Arc<AppState>>) -> Json<WhoamiResponse> {
    Json(WhoamiResponse {
        addr: state.bind_addr.to_string(),
        public_dir: state.public_dir.display().to_string(),
        urls: lan_urls(state.bind_addr.port()),
        started_at: state
            .started_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

async fn handle_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut file: Option<(String, axum::body::Bytes)> = None;
    let mut name: Option<String> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => match field.name().map(str::to_string).as_deref() {
                Some("file") => {
                    let client_name = field
                        .file_name()
                        .map(str::to_string)
                        .unwrap_or_else(|| "report.json".to_string());
                    match field.bytes().await {
                        Ok(bytes) => file = Some((client_name, bytes)),
                        Err(e) => {
                            return error_json(
                                StatusCode::BAD_REQUEST,
                                format!("reading file field: {e}"),
                            );
                        }
                    }
                }
                Some("name") => {
                    name = field.text().await.ok().filter(|s| !s.trim().is_empty());
                }
                _ => {
                    // Unknown fields are tolerated and drained.
                    let _ = field.bytes().await;
                }
            },
            Ok(None) => break,
            Err(e) => {
                return error_json(
                    StatusCode::BAD_REQUEST,
                    format!("malformed multipart body: {e}"),
                );
            }
        }
    }

    let Some((client_name, bytes)) = file else {
        return error_json(StatusCode::BAD_REQUEST, "missing required field 'file'");
    };
    let effective = match name {
        Some(n) => sanitize_filename(&n),
        // No explicit name: prefix the client filename so uploads never clobber.
        None => format!("{}_{}", unix_epoch_secs(), sanitize_filename(&client_name)),
    };

    let dir = reports_dir(&state.public_dir);
    if let Err(e) = std::fs::create_dir_all(&dir) {
        return error_json(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("creating reports directory: {e}"),
        );
    }
    let dest = dir.join(&effective);
    if let Err(e) = std::fs::write(&dest, &bytes) {
        return error_json(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("saving report: {e}"),
        );
    }

    log::info!("report saved: {} ({} bytes)", dest.display(), bytes.len());
    Json(UploadResponse {
        saved: true,
        path: dest.display().to_string(),
        public: format!("/reports/{effective}"),
    })
    .into_response()
}

async fn handle_static(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    static_files::serve_path(&state.public_dir, uri.path())
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let response = next.run(req).await;
    log::info!(
        "{method} {path} -> {} ({:.1}ms)",
        response.status().as_u16(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    response
}

/// Build the axum router over the shared state.
fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(handle_healthz))
        .route("/whoami", get(handle_whoami))
        .route("/upload", post(handle_upload))
        .fallback(handle_static)
        .layer(middleware::from_fn(log_requests))
        .layer(CompressionLayer::new().quality(CompressionLevel::Fastest))
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}

/// A running artifact host. Dropping the handle does not stop the server;
/// call [`ServerHandle::stop`].
pub struct ServerHandle {
    addr: SocketAddr,
    public_dir: PathBuf,
    started_at: DateTime<Utc>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    join: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Bind and start serving. Port 0 picks an ephemeral port; the bound
    /// address is available via [`ServerHandle::addr`].
    pub async fn start(config: ServerConfig) -> Result<Self, ServeError> {
        let bind = format!("{}:{}", config.host, config.port);
        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .map_err(|source| ServeError::Bind {
                addr: bind.clone(),
                source,
            })?;
        let addr = listener.local_addr().map_err(|source| ServeError::Bind {
            addr: bind,
            source,
        })?;

        let started_at = Utc::now();
        let state = Arc::new(AppState {
            public_dir: config.public_dir.clone(),
            bind_addr: addr,
            started_at,
        });
        let app = build_router(state);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let join = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                log::error!("server error: {e}");
            }
        });

        log::info!(
            "artifact host listening on http://{addr}, public dir {}",
            config.public_dir.display()
        );
        Ok(Self {
            addr,
            public_dir: config.public_dir,
            started_at,
            shutdown: Some(shutdown_tx),
            join,
        })
    }

    /// The actually-bound socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Lifecycle snapshot.
    pub fn status(&self) -> ServerStatus {
        ServerStatus {
            running: !self.join.is_finished(),
            addr: self.addr.to_string(),
            public_dir: self.public_dir.display().to_string(),
            started_at: self
                .started_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// Gracefully stop the server and wait for in-flight requests.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.join.await;
        log::info!("artifact host stopped");
    }
}

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, header};
    use tower::ServiceExt;

    fn test_router(public_dir: &std::path::Path) -> Router {
        let state = Arc::new(AppState {
            public_dir: public_dir.to_path_buf(),
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            started_at: Utc::now(),
        });
        build_router(state)
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn multipart_upload(with_name: Option<&str>, filename: &str, payload: &str) -> HttpRequest<Body> {
        let boundary = "driftprobe-test-boundary";
        let mut body = String::new();
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/json\r\n\r\n{payload}\r\n"
        ));
        if let Some(name) = with_name {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{name}\r\n"
            ));
        }
        body.push_str(&format!("--{boundary}--\r\n"));
        HttpRequest::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn healthz_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_router(dir.path())
            .oneshot(
                HttpRequest::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "ok");
    }

    #[tokio::test]
    async fn upload_with_name_then_fetch_back() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path());

        let response = app
            .clone()
            .oneshot(multipart_upload(Some("t.json"), "r.json", "{\"hello\":\"world\"}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["saved"], true);
        assert_eq!(
            body["path"],
            dir.path().join("reports/t.json").display().to_string()
        );
        assert_eq!(body["public"], "/reports/t.json");

        let fetched = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/reports/t.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(fetched.status(), StatusCode::OK);
        assert_eq!(body_string(fetched).await, "{\"hello\":\"world\"}");
    }

    #[tokio::test]
    async fn upload_without_name_gets_epoch_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_router(dir.path())
            .oneshot(multipart_upload(None, "r.json", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let saved: Vec<String> = std::fs::read_dir(dir.path().join("reports"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].ends_with("_r.json"), "got {}", saved[0]);
        let (epoch, _) = saved[0].split_once('_').unwrap();
        assert!(epoch.parse::<u64>().is_ok());
    }

    #[tokio::test]
    async fn upload_without_file_field_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let boundary = "driftprobe-test-boundary";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nt.json\r\n--{boundary}--\r\n"
        );
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        let response = test_router(dir.path()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("file"));
    }

    #[tokio::test]
    async fn upload_name_cannot_escape_reports_dir() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_router(dir.path())
            .oneshot(multipart_upload(Some("../../evil.json"), "r.json", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(dir.path().join("reports/evil.json").is_file());
        assert!(!dir.path().join("evil.json").exists());
    }

    #[tokio::test]
    async fn manifest_and_models_are_served_statically() {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("models");
        std::fs::create_dir_all(&models).unwrap();
        std::fs::write(
            models.join("manifest.json"),
            r#"[{"id":"S1","filename":"mnist_S1.json"}]"#,
        )
        .unwrap();

        let response = test_router(dir.path())
            .oneshot(
                HttpRequest::builder()
                    .uri("/models/manifest.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json; charset=utf-8"
        );
        assert!(body_string(response).await.contains("mnist_S1.json"));
    }

    #[tokio::test]
    async fn reports_directory_listing_is_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let reports = dir.path().join("reports");
        std::fs::create_dir_all(&reports).unwrap();
        std::fs::write(reports.join("telemetry_ab_1.json"), "{}").unwrap();

        let response = test_router(dir.path())
            .oneshot(
                HttpRequest::builder()
                    .uri("/reports/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("telemetry_ab_1.json"));
    }

    #[tokio::test]
    async fn models_directory_listing_is_not_enabled() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("models")).unwrap();
        let response = test_router(dir.path())
            .oneshot(
                HttpRequest::builder()
                    .uri("/models/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn root_prefers_index_html() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>driftprobe</h1>").unwrap();
        let response = test_router(dir.path())
            .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "<h1>driftprobe</h1>");
    }

    #[tokio::test]
    async fn whoami_reports_bind_and_public_dir() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_router(dir.path())
            .oneshot(
                HttpRequest::builder()
                    .uri("/whoami")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["addr"], "0.0.0.0:8080");
        assert_eq!(body["public_dir"], dir.path().display().to_string());
        assert!(body["urls"].as_array().unwrap().iter().any(|u| u
            .as_str()
            .unwrap()
            .starts_with("http://")));
        assert!(body["started_at"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn lifecycle_start_status_stop() {
        let dir = tempfile::tempdir().unwrap();
        let handle = ServerHandle::start(ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            public_dir: dir.path().to_path_buf(),
        })
        .await
        .unwrap();

        let status = handle.status();
        assert!(status.running);
        assert_ne!(handle.addr().port(), 0);
        handle.stop().await;
    }
}
