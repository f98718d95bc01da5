//! Static file serving over the `public/` tree.
//!
//! Directory listings are enabled for the root, `reports/`, and `compiled/`;
//! everything else serves files only. The root falls back to `index.html`
//! when one exists. Paths are sanitized against traversal before touching
//! the filesystem.

use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

/// Reject traversal and empty segments; returns a relative path to join.
pub(crate) fn sanitize_rel_path(raw: &str) -> Option<PathBuf> {
    let mut rel = PathBuf::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\0') || s.contains('\\') => return None,
            s => rel.push(s),
        }
    }
    Some(rel)
}

fn listing_enabled(rel: &Path) -> bool {
    match rel.iter().next().and_then(|s| s.to_str()) {
        None => true, // the public root
        Some("reports") | Some("compiled") => true,
        Some(_) => false,
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => "application/json; charset=utf-8",
        Some("html") => "text/html; charset=utf-8",
        Some("txt") | Some("csv") => "text/plain; charset=utf-8",
        Some("png") => "image/png",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 not found").into_response()
}

fn serve_file(path: &Path) -> Response {
    match std::fs::read(path) {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type_for(path))],
            Body::from(bytes),
        )
            .into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => not_found(),
        Err(e) => {
            log::warn!("reading {}: {e}", path.display());
            (StatusCode::INTERNAL_SERVER_ERROR, "500 read error").into_response()
        }
    }
}

fn render_listing(dir: &Path, rel: &Path) -> Response {
    let mut entries: Vec<(String, bool)> = match std::fs::read_dir(dir) {
        Ok(iter) => iter
            .filter_map(|e| e.ok())
            .map(|e| {
                let is_dir = e.file_type().map(|t| t.is_dir()).unwrap_or(false);
                (e.file_name().to_string_lossy().into_owned(), is_dir)
            })
            .collect(),
        Err(e) => {
            log::warn!("listing {}: {e}", dir.display());
            return (StatusCode::INTERNAL_SERVER_ERROR, "500 listing error").into_response();
        }
    };
    entries.sort();

    let title = if rel.as_os_str().is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", rel.display())
    };
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html><head><title>Index of ");
    html.push_str(&title);
    html.push_str("</title></head><body>\n<h1>Index of ");
    html.push_str(&title);
    html.push_str("</h1>\n<pre>\n");
    for (name, is_dir) in entries {
        let suffix = if is_dir { "/" } else { "" };
        html.push_str(&format!("<a href=\"{name}{suffix}\">{name}{suffix}</a>\n"));
    }
    html.push_str("</pre>\n</body></html>\n");

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
        .into_response()
}

/// Serve `request_path` relative to `public_dir`.
pub(crate) fn serve_path(public_dir: &Path, request_path: &str) -> Response {
    let Some(rel) = sanitize_rel_path(request_path) else {
        return not_found();
    };
    let full = public_dir.join(&rel);

    if full.is_file() {
        return serve_file(&full);
    }
    if full.is_dir() {
        if rel.as_os_str().is_empty() {
            let index = full.join("index.html");
            if index.is_file() {
                return serve_file(&index);
            }
        }
        if listing_enabled(&rel) {
            return render_listing(&full, &rel);
        }
    }
    not_found()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_is_rejected() {
        assert_eq!(sanitize_rel_path("../etc/passwd"), None);
        assert_eq!(sanitize_rel_path("reports/../../x"), None);
        assert_eq!(sanitize_rel_path("a\\b"), None);
    }

    #[test]
    fn segments_are_normalized() {
        assert_eq!(
            sanitize_rel_path("/reports//t.json"),
            Some(PathBuf::from("reports/t.json"))
        );
        assert_eq!(sanitize_rel_path(""), Some(PathBuf::new()));
        assert_eq!(sanitize_rel_path("./models/m.json"), Some(PathBuf::from("models/m.json")));
    }

    #[test]
    fn listing_policy_by_top_level_dir() {
        assert!(listing_enabled(Path::new("")));
        assert!(listing_enabled(Path::new("reports")));
        assert!(listing_enabled(Path::new("compiled/wasm")));
        assert!(!listing_enabled(Path::new("models")));
        assert!(!listing_enabled(Path::new("mnist")));
    }

    #[test]
    fn content_types_cover_report_artifacts() {
        assert_eq!(
            content_type_for(Path::new("r.json")),
            "application/json; charset=utf-8"
        );
        assert_eq!(
            content_type_for(Path::new("t10k-images-idx3-ubyte")),
            "application/octet-stream"
        );
    }
}
