//! Error taxonomy for the store pipeline.
//!
//! Build and resolution failures are logged server-side and then
//! surfaced verbatim to the client as a plain-text 500 body. Nothing
//! here is retried, and none of it is fatal to the serving process:
//! a failed store leaves the registry at its previous value.

use std::time::Duration;
use thiserror::Error;

use super::resolver::HANDLER_SYMBOL;

/// Failures while turning source text into a running module.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to create temporary compilation unit: {0}")]
    TempFile(std::io::Error),
    #[error("failed to invoke `{toolchain}`: {source}")]
    Invoke {
        toolchain: String,
        source: std::io::Error,
    },
    #[error("toolchain exited with {status}:\n{diagnostics}")]
    Toolchain { status: String, diagnostics: String },
    #[error("build timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("failed to load module: {0}")]
    Load(std::io::Error),
}

/// Failures while extracting the handler entry point from a loaded
/// module.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("module exported no `{HANDLER_SYMBOL}` symbol: {0}")]
    SymbolNotFound(String),
    #[error("unhandled symbol shape `{0}`")]
    UnhandledShape(String),
}

/// Union error for the store pipeline (build + resolve).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toolchain_error_carries_diagnostics_verbatim() {
        let err = BuildError::Toolchain {
            status: "exit status: 1".to_string(),
            diagnostics: "error[E0425]: cannot find value `handler`".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("exit status: 1"));
        assert!(text.contains("cannot find value `handler`"));
    }

    #[test]
    fn resolution_errors_name_the_symbol() {
        let err = ResolutionError::SymbolNotFound("module exited".to_string());
        assert!(err.to_string().contains("`handler`"));
        let err = ResolutionError::UnhandledShape("closure".to_string());
        assert!(err.to_string().contains("closure"));
    }
}
