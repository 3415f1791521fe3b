//! In-process handle to a running plugin module.
//!
//! A module is a child process speaking the frame protocol over its
//! stdin/stdout. Dropping the handle kills the process, which is how
//! a replaced handler's module is actually unloaded.

use std::path::Path;
use std::process::Stdio;

use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::protocol::{
    self, ProtocolError, WireRequest, WireResponse, MANIFEST_FRAME_ID,
};

#[derive(Debug)]
pub struct PluginModule {
    // Held for process lifetime; kill_on_drop reaps it with the handle.
    _child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u32,
}

impl PluginModule {
    /// Spawn a built artifact as a plugin process.
    ///
    /// stderr is inherited so whatever the untrusted code prints lands
    /// in the server's error stream, like any other server-side
    /// diagnostic.
    pub async fn spawn(artifact: &Path) -> std::io::Result<Self> {
        let mut command = Command::new(artifact);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        Self::spawn_command(command)
    }

    pub(crate) fn spawn_command(mut command: Command) -> std::io::Result<Self> {
        command.kill_on_drop(true);
        let mut child = command.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("plugin stdin not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("plugin stdout not piped"))?;
        Ok(Self {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: MANIFEST_FRAME_ID + 1,
        })
    }

    /// Read the next frame from the module. `None` means the process
    /// closed its stdout at a frame boundary.
    pub(crate) async fn recv_frame(&mut self) -> Result<Option<(u32, Vec<u8>)>, ProtocolError> {
        protocol::read_frame(&mut self.stdout).await
    }

    /// Forward one request and wait for the matching response frame.
    pub async fn round_trip(&mut self, req: &WireRequest) -> Result<WireResponse, ProtocolError> {
        let id = self.next_id;
        self.next_id = self.next_id.checked_add(1).unwrap_or(MANIFEST_FRAME_ID + 1);

        protocol::write_frame(&mut self.stdin, id, &protocol::encode_request(req)).await?;
        loop {
            let Some((frame_id, payload)) = self.recv_frame().await? else {
                return Err(ProtocolError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "plugin process exited mid-request",
                )));
            };
            if frame_id == id {
                return protocol::decode_response(&payload);
            }
            // Stray frame (e.g. a late manifest); skip it.
        }
    }
}
