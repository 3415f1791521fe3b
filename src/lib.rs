//! plugd: an HTTP server whose `/plugins` handler is hot-swappable.
//!
//! POST plugin source to `/plugins` and the server compiles it,
//! spawns it as a child process, and routes subsequent GETs through
//! it. Each accepted submission replaces the previous handler.

pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod plugin;
