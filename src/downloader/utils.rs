// Helper functions shared by the orchestrator and the merger

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command as TokioCommand;

use super::errors::{DownloadError, Result};
use super::traits::DirectoryOpener;

/// Opens folders with the platform file manager (explorer / open / xdg-open).
///
/// The caller does not wait for the file manager; a detached task on the
/// current tokio runtime reaps it when it exits.
#[derive(Debug, Clone, Default)]
pub struct SystemDirectoryOpener {
    program: Option<PathBuf>,
}

impl SystemDirectoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `program <dir>` instead of the platform default
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    fn platform_program() -> &'static str {
        if cfg!(target_os = "windows") {
            "explorer"
        } else if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        }
    }
}

impl DirectoryOpener for SystemDirectoryOpener {
    fn open(&self, dir: &Path) -> std::io::Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        let program = match &self.program {
            Some(program) => program.as_os_str(),
            None => std::ffi::OsStr::new(Self::platform_program()),
        };
        let mut child = TokioCommand::new(program)
            .arg(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        runtime.spawn(async move {
            if let Err(e) = child.wait().await {
                tracing::debug!(error = %e, "file manager wait failed");
            }
        });
        Ok(())
    }
}

/// Opener that does nothing, for headless use
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDirectoryOpener;

impl DirectoryOpener for NoopDirectoryOpener {
    fn open(&self, _dir: &Path) -> std::io::Result<()> {
        Ok(())
    }
}

/// Reveal `dir`, logging instead of failing
pub fn open_directory_best_effort(opener: &dyn DirectoryOpener, dir: &Path) {
    if let Err(e) = opener.open(dir) {
        tracing::warn!(path = %dir.display(), error = %e, "failed to open directory");
    }
}

/// Milliseconds since the Unix epoch, used to key output filenames
pub fn timestamp_millis() -> i64 {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    (nanos / 1_000_000) as i64
}

/// Create `dir` (and parents) if it does not exist yet
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| DownloadError::fs(dir, e))
}
