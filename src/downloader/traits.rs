// Seams to the outside world: external processes, the file manager and the
// subscriber of one download's events.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use super::errors::{DownloadError, Result};
use super::models::DownloadEvent;

/// Which pipe a line of child output arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// Program invocation handed to a [`ProcessRunner`]
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Added on top of the inherited environment
    pub envs: Vec<(String, String)>,
    /// `None` waits forever
    pub timeout: Option<Duration>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl fmt::Display for ProcessCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Accumulated output of a finished process
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` if the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Treat a non-zero exit as fatal
    pub fn into_success(self) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(DownloadError::ProcessExit {
                code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Line callback used when the caller does not care about live output
pub fn discard_line(_stream: StreamKind, _line: &str) {}

/// Capability to run external binaries (yt-dlp, ffmpeg).
///
/// Everything in the core reaches the outside world through this trait so the
/// orchestration logic can be driven by a scripted fake in tests.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion, handing every output line to `observer` as it arrives.
    ///
    /// A non-zero exit is returned as `Ok` with the exit code set; only a
    /// failure to start (or a timeout) is an `Err`.
    async fn run(
        &self,
        command: ProcessCommand,
        observer: &mut (dyn for<'a> FnMut(StreamKind, &'a str) + Send),
    ) -> Result<ProcessOutput>;

    /// First line printed by `program <flag>`
    async fn version(&self, program: &Path, flag: &str) -> Result<String> {
        let command = ProcessCommand::new(program)
            .arg(flag)
            .timeout(Some(Duration::from_secs(10)));
        let output = self.run(command, &mut discard_line).await?.into_success()?;
        Ok(output
            .stdout
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}

/// Reveals a directory in the platform file manager
pub trait DirectoryOpener: Send + Sync {
    fn open(&self, dir: &Path) -> std::io::Result<()>;
}

/// Per-download event relay.
///
/// Sending never blocks and never fails the download: if the subscriber has
/// gone away the event is dropped.
#[derive(Debug, Clone)]
pub struct ProgressEmitter {
    tx: Option<mpsc::UnboundedSender<DownloadEvent>>,
}

impl ProgressEmitter {
    pub fn new(tx: mpsc::UnboundedSender<DownloadEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Emitter with no subscriber
    pub fn silent() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: DownloadEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
