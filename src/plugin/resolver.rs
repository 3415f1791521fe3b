//! Symbol Resolver: extract the handler entry point from a loaded
//! module.
//!
//! A freshly spawned module announces a manifest frame naming its
//! export and the shape it was compiled as. Resolution checks the
//! name is the fixed well-known symbol and shape-matches the tag
//! against the closed set of acceptable handler shapes; anything the
//! module announced that is not in the set is an unhandled shape.
//! A module that exits, stays silent, or sends garbage instead of a
//! manifest never announced the symbol at all.

use std::str::FromStr;
use std::time::Duration;

use tokio::sync::Mutex;

use super::error::ResolutionError;
use super::harness;
use super::module::PluginModule;
use super::protocol::{ProtocolError, WireRequest, WireResponse, MANIFEST_FRAME_ID};

/// Well-known exported name looked up inside every module.
pub const HANDLER_SYMBOL: &str = harness::SYMBOL_NAME;

/// Bound on the wait for the manifest frame, so a silent artifact
/// cannot wedge a store request forever.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// The closed set of acceptable handler shapes.
///
/// Which one a module announces depends on how its author wrote the
/// export: a reference to a `Handler` value, a `Handler` value, or a
/// plain two-argument function. All three adapt to the same installed
/// handler interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolShape {
    HandlerRef,
    HandlerValue,
    BareFn,
}

impl SymbolShape {
    pub const fn tag(self) -> &'static str {
        match self {
            Self::HandlerRef => "handler_ref",
            Self::HandlerValue => "handler_value",
            Self::BareFn => "bare_fn",
        }
    }
}

impl FromStr for SymbolShape {
    type Err = ResolutionError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "handler_ref" => Ok(Self::HandlerRef),
            "handler_value" => Ok(Self::HandlerValue),
            "bare_fn" => Ok(Self::BareFn),
            other => Err(ResolutionError::UnhandledShape(other.to_string())),
        }
    }
}

/// A resolved handler: the module plus the shape it was accepted as.
///
/// `handle` serializes round trips through the module's single pipe
/// pair; the registry's read lock already allows many concurrent
/// GETs to reach this point.
#[derive(Debug)]
pub struct InstalledHandler {
    shape: SymbolShape,
    module: Mutex<PluginModule>,
}

impl InstalledHandler {
    pub const fn shape(&self) -> SymbolShape {
        self.shape
    }

    pub async fn handle(&self, req: &WireRequest) -> Result<WireResponse, ProtocolError> {
        let mut module = self.module.lock().await;
        module.round_trip(req).await
    }
}

/// Look up the well-known symbol inside a loaded module.
pub async fn resolve(mut module: PluginModule) -> Result<InstalledHandler, ResolutionError> {
    let frame = tokio::time::timeout(HANDSHAKE_TIMEOUT, module.recv_frame())
        .await
        .map_err(|_| {
            ResolutionError::SymbolNotFound("module announced nothing before the handshake deadline".to_string())
        })?
        .map_err(|err| ResolutionError::SymbolNotFound(format!("module handshake failed: {err}")))?;

    let Some((frame_id, payload)) = frame else {
        return Err(ResolutionError::SymbolNotFound(
            "module exited before announcing its exports".to_string(),
        ));
    };
    if frame_id != MANIFEST_FRAME_ID {
        return Err(ResolutionError::SymbolNotFound(format!(
            "expected a manifest frame, got frame {frame_id}"
        )));
    }

    let shape = parse_manifest(&payload)?;
    Ok(InstalledHandler {
        shape,
        module: Mutex::new(module),
    })
}

/// Parse a manifest payload of the form `<symbol> <shape-tag>`.
fn parse_manifest(payload: &[u8]) -> Result<SymbolShape, ResolutionError> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| ResolutionError::SymbolNotFound("manifest is not text".to_string()))?;
    let mut words = text.split_whitespace();
    let symbol = words.next().ok_or_else(|| {
        ResolutionError::SymbolNotFound("empty manifest".to_string())
    })?;
    if symbol != HANDLER_SYMBOL {
        return Err(ResolutionError::SymbolNotFound(format!(
            "module exported `{symbol}` instead"
        )));
    }
    let tag = words.next().ok_or_else(|| {
        ResolutionError::UnhandledShape("<missing>".to_string())
    })?;
    tag.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Stdio;
    use tokio::process::Command;

    #[test]
    fn manifest_parses_each_acceptable_shape() {
        for (tag, shape) in [
            ("handler_ref", SymbolShape::HandlerRef),
            ("handler_value", SymbolShape::HandlerValue),
            ("bare_fn", SymbolShape::BareFn),
        ] {
            let payload = format!("handler {tag}");
            assert_eq!(parse_manifest(payload.as_bytes()).unwrap(), shape);
            assert_eq!(shape.tag(), tag);
        }
    }

    #[test]
    fn wrong_symbol_name_is_not_found() {
        let err = parse_manifest(b"serve_http bare_fn").unwrap_err();
        assert!(matches!(err, ResolutionError::SymbolNotFound(_)));
    }

    #[test]
    fn unknown_shape_tag_is_unhandled() {
        let err = parse_manifest(b"handler closure").unwrap_err();
        assert!(matches!(err, ResolutionError::UnhandledShape(_)));
    }

    fn scripted_module(script: &str) -> PluginModule {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        PluginModule::spawn_command(command).unwrap()
    }

    #[tokio::test]
    async fn resolve_accepts_a_well_formed_manifest() {
        // Frame: id 0, len 15 LE, payload "handler bare_fn".
        let module =
            scripted_module(r"printf '\0\0\0\0\017\0\0\0handler bare_fn'; cat >/dev/null");
        let handler = resolve(module).await.unwrap();
        assert_eq!(handler.shape(), SymbolShape::BareFn);
    }

    #[tokio::test]
    async fn resolve_reports_immediate_exit_as_symbol_not_found() {
        let module = scripted_module("exit 0");
        let err = resolve(module).await.unwrap_err();
        assert!(matches!(err, ResolutionError::SymbolNotFound(_)));
    }

    #[tokio::test]
    async fn resolve_rejects_an_unknown_shape_tag() {
        // Frame: id 0, len 13 LE, payload "handler weird".
        let module =
            scripted_module(r"printf '\0\0\0\0\015\0\0\0handler weird'; cat >/dev/null");
        let err = resolve(module).await.unwrap_err();
        assert!(matches!(err, ResolutionError::UnhandledShape(_)));
    }
}
