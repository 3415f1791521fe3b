//! Logger module
//!
//! Timestamped logging helpers for the server: lifecycle events,
//! access logging, and the build/install trail of the plugin
//! pipeline. Info goes to stdout, warnings and errors to stderr.

use std::net::SocketAddr;
use std::path::Path;

use chrono::Local;

use crate::config::Config;
use crate::plugin::SymbolShape;

fn write_info(message: &str) {
    println!("[{}] {message}", Local::now().format("%Y-%m-%d %H:%M:%S"));
}

fn write_error(message: &str) {
    eprintln!("[{}] {message}", Local::now().format("%Y-%m-%d %H:%M:%S"));
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write_info("======================================");
    write_info("Plugin server started successfully");
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    write_info(&format!("Build toolchain: {}", config.build.toolchain));
    write_info(&format!("Build timeout: {}s", config.build.timeout_secs));
    write_info("======================================\n");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    write_info(&format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(&format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_request(method: &hyper::Method, uri: &hyper::Uri) {
    write_info(&format!("[Request] {method} {uri}"));
}

pub fn log_response(body_len: usize) {
    write_info(&format!("[Response] {body_len} bytes"));
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(&format!("[WARN] {message}"));
}

pub fn log_headers_count(count: usize, show: bool) {
    if show {
        write_info(&format!("[Headers] Count: {count}"));
    }
}

pub fn log_build_started(unit_path: &Path) {
    write_info(&format!(
        "[Build] Compiling unit: {}",
        unit_path.display()
    ));
}

pub fn log_build_finished(artifact_path: &Path) {
    write_info(&format!(
        "[Build] Artifact ready: {}",
        artifact_path.display()
    ));
}

pub fn log_handler_installed(shape: SymbolShape) {
    write_info(&format!(
        "[Install] New handler installed (shape: {})",
        shape.tag()
    ));
}
