//! Static file serving for the bundled UI.
//!
//! Serves the configured UI root with index-file fallback and a
//! path-traversal guard. When the root has no index the embedded
//! demo page is served at `/` instead, so the server is usable out of
//! the box.

use std::path::Path;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use tokio::fs;

use crate::config::AppState;
use crate::http::{self, mime};
use crate::logger;

pub async fn serve_ui(
    path: &str,
    is_head: bool,
    state: &AppState,
    access_log: bool,
) -> Response<Full<Bytes>> {
    let ui = &state.config.ui;
    match load_from_directory(&ui.root, path, &ui.index_files).await {
        Some((content, content_type)) => {
            if access_log {
                logger::log_response(content.len());
            }
            build_asset_response(&content, content_type, is_head)
        }
        None if path == "/" => {
            let html = default_homepage();
            if access_log {
                logger::log_response(html.len());
            }
            http::build_html_response(html, is_head)
        }
        None => http::build_404_response(),
    }
}

/// Load a file from the UI root with index file support
async fn load_from_directory(
    static_dir: &str,
    path: &str,
    index_files: &[String],
) -> Option<(Vec<u8>, &'static str)> {
    // Remove leading slash and prevent directory traversal
    let clean_path = path.trim_start_matches('/').replace("..", "");
    let mut file_path = Path::new(static_dir).join(&clean_path);

    // Security: ensure file_path is within static_dir
    let static_dir_canonical = Path::new(static_dir).canonicalize().ok()?;

    // Check if path is a directory, try index files
    if file_path.is_dir() || clean_path.is_empty() || clean_path.ends_with('/') {
        for index_file in index_files {
            let index_path = file_path.join(index_file);
            if index_path.is_file() {
                file_path = index_path;
                break;
            }
        }
    }

    // File not found is common (404), no need to log at warning level
    let file_path_canonical = file_path.canonicalize().ok()?;
    if !file_path_canonical.starts_with(&static_dir_canonical) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {} -> {}",
            path,
            file_path_canonical.display()
        ));
        return None;
    }

    let content = match fs::read(&file_path).await {
        Ok(content) => content,
        Err(err) => {
            logger::log_error(&format!(
                "Failed to read file '{}': {}",
                file_path.display(),
                err
            ));
            return None;
        }
    };

    let content_type = mime::get_content_type(file_path.extension().and_then(|e| e.to_str()));
    Some((content, content_type))
}

fn build_asset_response(
    data: &[u8],
    content_type: &str,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let body = if is_head {
        Bytes::new()
    } else {
        Bytes::from(data.to_owned())
    };

    Response::builder()
        .status(200)
        .header("Content-Type", content_type)
        .header("Content-Length", data.len())
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            logger::log_error(&format!("Failed to build asset response: {e}"));
            Response::new(Full::new(Bytes::new()))
        })
}

/// Embedded demo page: a form that posts plugin source to /plugins.
fn default_homepage() -> String {
    String::from(
        r##"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>plugd - hot-swappable handlers</title>
    <style>
        body { font-family: -apple-system, "Segoe UI", Roboto, sans-serif; max-width: 760px; margin: 40px auto; padding: 0 16px; color: #222; }
        textarea { width: 100%; height: 260px; font-family: ui-monospace, monospace; font-size: 13px; }
        button { padding: 8px 20px; margin-top: 8px; }
        pre { background: #f4f4f4; padding: 12px; overflow-x: auto; }
    </style>
</head>
<body>
    <h1>plugd</h1>
    <p>Paste a handler below, store it, then open <a href="/plugins">/plugins</a>.</p>
    <textarea id="code">fn handler(res: &amp;mut plug::ResponseSink, _req: &amp;plug::Request) {
    res.header("content-type", "text/plain");
    res.write_str("hello from a hot-swapped handler");
}</textarea>
    <br>
    <button id="store">Store handler</button>
    <pre id="out"></pre>
    <script>
        document.getElementById("store").addEventListener("click", async () => {
            const code = document.getElementById("code").value;
            const out = document.getElementById("out");
            out.textContent = "building...";
            const resp = await fetch("/plugins", {
                method: "POST",
                headers: { "Content-Type": "application/x-www-form-urlencoded" },
                body: "code=" + encodeURIComponent(code),
            });
            out.textContent = resp.status === 204
                ? "installed"
                : resp.status + "\n" + await resp.text();
        });
    </script>
</body>
</html>"##,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn index_file_is_served_for_the_root_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>ui</html>").unwrap();

        let root = dir.path().to_str().unwrap();
        let loaded = load_from_directory(root, "/", &["index.html".to_string()]).await;
        let (content, content_type) = loaded.unwrap();
        assert_eq!(content, b"<html>ui</html>");
        assert_eq!(content_type, "text/html; charset=utf-8");
    }

    #[tokio::test]
    async fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap();
        assert!(load_from_directory(root, "/nope.js", &[]).await.is_none());
    }
}
