// Process runner backed by tokio::process

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc;

use super::errors::{DownloadError, Result};
use super::traits::{ProcessCommand, ProcessOutput, ProcessRunner, StreamKind};

/// Spawns real OS processes.
///
/// Children are killed when the returned future is dropped, so abandoning a
/// download (or hitting the timeout) never leaves an orphaned yt-dlp behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        command: ProcessCommand,
        observer: &mut (dyn for<'a> FnMut(StreamKind, &'a str) + Send),
    ) -> Result<ProcessOutput> {
        let program = command.program_name();
        tracing::debug!(command = %command, "spawning process");

        let mut child = TokioCommand::new(&command.program)
            .args(&command.args)
            .envs(command.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DownloadError::ProcessSpawn {
                program: program.clone(),
                source,
            })?;

        let stdout_pipe = child.stdout.take().ok_or_else(|| missing_pipe(&program, "stdout"))?;
        let stderr_pipe = child.stderr.take().ok_or_else(|| missing_pipe(&program, "stderr"))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let stdout_task = tokio::spawn(forward_lines(stdout_pipe, StreamKind::Stdout, tx.clone()));
        let stderr_task = tokio::spawn(forward_lines(stderr_pipe, StreamKind::Stderr, tx));

        let collect = async {
            let mut output = ProcessOutput::default();
            while let Some((stream, line)) = rx.recv().await {
                observer(stream, &line);
                let buf = match stream {
                    StreamKind::Stdout => &mut output.stdout,
                    StreamKind::Stderr => &mut output.stderr,
                };
                buf.push_str(&line);
                buf.push('\n');
            }
            let status = child.wait().await.map_err(|source| DownloadError::ProcessSpawn {
                program: program.clone(),
                source,
            })?;
            output.exit_code = status.code();
            Ok::<ProcessOutput, DownloadError>(output)
        };

        let result = match command.timeout {
            Some(limit) => {
                let waited = tokio::time::timeout(limit, collect).await;
                match waited {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(program = %program, seconds = limit.as_secs(), "process timed out, killing");
                        let _ = child.kill().await;
                        stdout_task.abort();
                        stderr_task.abort();
                        return Err(DownloadError::ProcessTimeout {
                            program,
                            seconds: limit.as_secs(),
                        });
                    }
                }
            }
            None => collect.await,
        };

        for (name, task) in [("stdout", stdout_task), ("stderr", stderr_task)] {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(program = %program, pipe = name, error = %e, "failed to read pipe"),
                Err(e) => tracing::warn!(program = %program, pipe = name, error = %e, "pipe reader task failed"),
            }
        }

        if let Ok(output) = &result {
            tracing::debug!(program = %program, exit_code = ?output.exit_code, "process exited");
        }
        result
    }
}

fn missing_pipe(program: &str, pipe: &str) -> DownloadError {
    DownloadError::ProcessSpawn {
        program: program.to_string(),
        source: std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            format!("failed to capture {}", pipe),
        ),
    }
}

/// Forward every line of `pipe` to `tx`.
///
/// Lines are split on `\n` and `\r` (progress bars redraw with carriage
/// returns) and decoded lossily so a stray byte never aborts the read.
async fn forward_lines<R>(
    pipe: R,
    stream: StreamKind,
    tx: mpsc::UnboundedSender<(StreamKind, String)>,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        for segment in buf.split(|b| *b == b'\n' || *b == b'\r') {
            if segment.is_empty() {
                continue;
            }
            let line = String::from_utf8_lossy(segment).into_owned();
            if tx.send((stream, line)).is_err() {
                return Ok(());
            }
        }
    }
}
