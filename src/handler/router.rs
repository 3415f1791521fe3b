//! Request routing dispatch module
//!
//! Entry point for HTTP request processing. `/plugins` is the live
//! endpoint (GET dispatches through the registry, POST runs the store
//! pipeline); every other path serves the bundled UI.

use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::{Method, Request, Response};

use crate::config::AppState;
use crate::handler::{form, static_files};
use crate::http;
use crate::logger;
use crate::plugin::protocol::{WireRequest, WireResponse};
use crate::plugin::{resolve, StoreError, SymbolShape};

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let access_log = state.cached_access_log.load(Ordering::Relaxed);
    if access_log {
        logger::log_request(req.method(), req.uri());
    }
    logger::log_headers_count(req.headers().len(), state.config.logging.show_headers);

    if let Some(resp) = check_body_size(&req, state.config.http.max_body_size) {
        return Ok(resp);
    }

    if req.uri().path() == "/plugins" {
        return Ok(plugins_endpoint(req, &state).await);
    }

    // Everything else is the bundled UI tree.
    match req.method() {
        &Method::GET | &Method::HEAD => {
            let is_head = *req.method() == Method::HEAD;
            let path = req.uri().path().to_string();
            Ok(static_files::serve_ui(&path, is_head, &state, access_log).await)
        }
        _ => {
            logger::log_warning(&format!("Method not allowed: {}", req.method()));
            Ok(http::build_405_response())
        }
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(req: &Request<Incoming>, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

/// Method dispatch for the live endpoint
async fn plugins_endpoint(req: Request<Incoming>, state: &Arc<AppState>) -> Response<Full<Bytes>> {
    match req.method() {
        &Method::GET => fetch(req, state).await,
        &Method::POST => store(req, state).await,
        _ => http::build_405_response(),
    }
}

/// GET: dispatch to the currently installed handler under the
/// registry's read lock.
async fn fetch(req: Request<Incoming>, state: &Arc<AppState>) -> Response<Full<Bytes>> {
    let wire = match to_wire_request(req).await {
        Ok(wire) => wire,
        Err(resp) => return resp,
    };
    match state.registry.dispatch(&wire).await {
        Ok(Some(resp)) => from_wire_response(resp),
        Ok(None) => http::build_404_response(),
        Err(err) => {
            logger::log_error(&format!("Installed handler failed: {err}"));
            http::build_500_response(&err.to_string())
        }
    }
}

/// POST: run the store pipeline and swap the new handler in.
async fn store(req: Request<Incoming>, state: &Arc<AppState>) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            return http::build_400_response(&format!("failed to read request body: {err}"))
        }
    };

    let fields = match form::parse(&body) {
        Ok(fields) => fields,
        Err(err) => return http::build_400_response(&err.to_string()),
    };

    // Body field first, query string as a fallback.
    let mut code = form::first_value(&fields, "code").unwrap_or_default().to_string();
    if code.is_empty() {
        if let Some(query) = parts.uri.query() {
            if let Ok(query_fields) = form::parse(query.as_bytes()) {
                if let Some(value) = form::first_value(&query_fields, "code") {
                    code = value.to_string();
                }
            }
        }
    }

    match run_store(state, code.trim()).await {
        Ok(shape) => {
            logger::log_handler_installed(shape);
            http::build_204_response()
        }
        Err(err) => {
            logger::log_error(&err.to_string());
            http::build_500_response(&err.to_string())
        }
    }
}

/// build -> resolve -> install; the registry is untouched on failure.
async fn run_store(state: &AppState, code: &str) -> Result<SymbolShape, StoreError> {
    let module = state.builder.build(code).await?;
    let handler = resolve(module).await?;
    let shape = handler.shape();
    state.registry.install(handler).await;
    Ok(shape)
}

/// Collect an inbound request into the wire form plugins consume.
async fn to_wire_request(
    req: Request<Incoming>,
) -> Result<WireRequest, Response<Full<Bytes>>> {
    let (parts, body) = req.into_parts();
    let path = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_string(), ToString::to_string);
    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes().to_vec(),
        Err(err) => {
            return Err(http::build_400_response(&format!(
                "failed to read request body: {err}"
            )))
        }
    };
    Ok(WireRequest {
        method: parts.method.to_string(),
        path,
        headers,
        body,
    })
}

/// Translate a plugin's wire response into an HTTP response.
fn from_wire_response(wire: WireResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(wire.status);
    for (name, value) in &wire.headers {
        builder = builder.header(name, value);
    }
    match builder.body(Full::new(Bytes::from(wire.body))) {
        Ok(resp) => resp,
        Err(err) => {
            logger::log_error(&format!("Plugin produced an invalid response: {err}"));
            http::build_500_response(&format!("plugin produced an invalid response: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_response_with_bad_header_degrades_to_500() {
        let wire = WireResponse {
            status: 200,
            headers: vec![("bad\nname".to_string(), "x".to_string())],
            body: b"ok".to_vec(),
        };
        let resp = from_wire_response(wire);
        assert_eq!(resp.status(), 500);
    }

    #[test]
    fn wire_response_passes_status_headers_and_body_through() {
        let wire = WireResponse {
            status: 418,
            headers: vec![("x-plugin".to_string(), "v2".to_string())],
            body: b"teapot".to_vec(),
        };
        let resp = from_wire_response(wire);
        assert_eq!(resp.status(), 418);
        assert_eq!(resp.headers()["x-plugin"], "v2");
    }
}
