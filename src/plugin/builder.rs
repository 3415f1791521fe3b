//! Module Builder: source text in, running plugin module out.
//!
//! Each build writes the submitted source plus the harness to a
//! uniquely named temporary unit, invokes the toolchain out of
//! process, and spawns the resulting artifact. Both temp files are
//! deletion-scheduled the moment they are created (their guards drop
//! when `build` returns), so no path leaks past the request whether
//! the build succeeds, the toolchain rejects the source, or the load
//! fails. The plugin process is spawned before the artifact path is
//! dropped; the running process keeps the unlinked file alive.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::error::BuildError;
use super::harness;
use super::module::PluginModule;
use crate::config::BuildConfig;
use crate::logger;

pub struct ModuleBuilder {
    toolchain: String,
    temp_dir: PathBuf,
    timeout: Duration,
}

impl ModuleBuilder {
    pub fn new(cfg: &BuildConfig) -> Self {
        Self {
            toolchain: cfg.toolchain.clone(),
            temp_dir: cfg
                .temp_dir
                .as_ref()
                .map_or_else(std::env::temp_dir, PathBuf::from),
            timeout: Duration::from_secs(cfg.timeout_secs),
        }
    }

    /// Compile `source` and bring the artifact up as a plugin process.
    ///
    /// Safe to call concurrently: every call owns its own uniquely
    /// named temp files.
    pub async fn build(&self, source: &str) -> Result<PluginModule, BuildError> {
        let unit = harness::instrument(source.trim());

        let unit_file = tempfile::Builder::new()
            .prefix("plugd-unit-")
            .suffix(".rs")
            .tempfile_in(&self.temp_dir)
            .map_err(BuildError::TempFile)?;
        let artifact = tempfile::Builder::new()
            .prefix("plugd-mod-")
            .tempfile_in(&self.temp_dir)
            .map_err(BuildError::TempFile)?
            .into_temp_path();

        tokio::fs::write(unit_file.path(), unit)
            .await
            .map_err(BuildError::TempFile)?;

        logger::log_build_started(unit_file.path());

        let mut command = Command::new(&self.toolchain);
        command
            .arg("--edition=2021")
            .arg("--crate-name")
            .arg("plugin")
            .arg("-O")
            .args(["-C", "strip=symbols"])
            .arg("-o")
            .arg(artifact.as_os_str())
            .arg(unit_file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Dropping the output future on timeout kills the toolchain
        // child (kill_on_drop), resolving the unbounded-build gap
        // called out in the original design.
        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result.map_err(|source| BuildError::Invoke {
                toolchain: self.toolchain.clone(),
                source,
            })?,
            Err(_) => return Err(BuildError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            return Err(BuildError::Toolchain {
                status: output.status.to_string(),
                diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        logger::log_build_finished(&artifact);

        let module = PluginModule::spawn(&artifact)
            .await
            .map_err(BuildError::Load)?;

        // unit_file and artifact drop here, removing both temp files on
        // this and every earlier return path.
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> BuildConfig {
        BuildConfig {
            toolchain: "rustc".to_string(),
            temp_dir: None,
            timeout_secs: 30,
        }
    }

    #[test]
    fn builder_defaults_to_the_system_temp_dir() {
        let builder = ModuleBuilder::new(&test_config());
        assert_eq!(builder.temp_dir, std::env::temp_dir());
        assert_eq!(builder.timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn missing_toolchain_is_an_invoke_error() {
        let builder = ModuleBuilder::new(&BuildConfig {
            toolchain: "plugd-no-such-toolchain".to_string(),
            ..test_config()
        });
        let err = builder.build("fn handler() {}").await.unwrap_err();
        assert!(matches!(err, BuildError::Invoke { .. }));
    }
}
