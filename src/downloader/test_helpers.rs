// Fakes for driving the pipeline without real binaries

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::errors::{DownloadError, Result};
use super::traits::{DirectoryOpener, ProcessCommand, ProcessOutput, ProcessRunner, StreamKind};

/// What a fake program prints and how it exits
#[derive(Debug, Clone, Default)]
pub struct Script {
    lines: Vec<(StreamKind, String)>,
    exit_code: Option<i32>,
    spawn_fails: bool,
    last_arg_contents: Option<Vec<u8>>,
    concat_inputs: bool,
}

impl Script {
    pub fn exit(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::default()
        }
    }

    pub fn spawn_error() -> Self {
        Self {
            spawn_fails: true,
            ..Self::default()
        }
    }

    pub fn stdout_line(mut self, line: &str) -> Self {
        self.lines.push((StreamKind::Stdout, line.to_string()));
        self
    }

    pub fn stderr_line(mut self, line: &str) -> Self {
        self.lines.push((StreamKind::Stderr, line.to_string()));
        self
    }

    /// Write `contents` to the path given as the last argument (ffmpeg output)
    pub fn writes_last_arg(mut self, contents: &[u8]) -> Self {
        self.last_arg_contents = Some(contents.to_vec());
        self
    }

    /// Write every `-i <file>` input, concatenated in order, to the last argument
    pub fn concat_inputs(mut self) -> Self {
        self.concat_inputs = true;
        self
    }
}

/// [`ProcessRunner`] that replays scripts keyed by program file name and
/// records every invocation.
#[derive(Default)]
pub struct ScriptedRunner {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<ProcessCommand>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, program: &str, script: Script) -> Self {
        self.scripts.insert(program.to_string(), script);
        self
    }

    pub fn calls(&self) -> Vec<ProcessCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<ProcessCommand> {
        self.calls()
            .into_iter()
            .filter(|c| program_key(&c.program) == program)
            .collect()
    }
}

fn program_key(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        command: ProcessCommand,
        observer: &mut (dyn for<'a> FnMut(StreamKind, &'a str) + Send),
    ) -> Result<ProcessOutput> {
        self.calls.lock().unwrap().push(command.clone());

        let key = program_key(&command.program);
        let script = match self.scripts.get(&key) {
            Some(script) if !script.spawn_fails => script.clone(),
            _ => {
                return Err(DownloadError::ProcessSpawn {
                    program: command.program_name(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
                })
            }
        };

        let mut output = ProcessOutput {
            exit_code: script.exit_code,
            ..ProcessOutput::default()
        };
        for (stream, line) in &script.lines {
            observer(*stream, line);
            let buf = match stream {
                StreamKind::Stdout => &mut output.stdout,
                StreamKind::Stderr => &mut output.stderr,
            };
            buf.push_str(line);
            buf.push('\n');
        }

        if let (Some(contents), Some(target)) = (&script.last_arg_contents, command.args.last()) {
            std::fs::write(target, contents).map_err(|e| DownloadError::fs(target, e))?;
        }
        if script.concat_inputs {
            let mut merged = Vec::new();
            for pair in command.args.windows(2).filter(|w| w[0] == "-i") {
                let input = std::fs::read(&pair[1]).map_err(|e| DownloadError::fs(&pair[1], e))?;
                merged.extend(input);
            }
            if let Some(target) = command.args.last() {
                std::fs::write(target, merged).map_err(|e| DownloadError::fs(target, e))?;
            }
        }
        Ok(output)
    }
}

/// [`DirectoryOpener`] that remembers what it was asked to open
#[derive(Default)]
pub struct RecordingOpener {
    opened: Mutex<Vec<PathBuf>>,
}

impl RecordingOpener {
    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().unwrap().clone()
    }
}

impl DirectoryOpener for RecordingOpener {
    fn open(&self, dir: &Path) -> std::io::Result<()> {
        self.opened.lock().unwrap().push(dir.to_path_buf());
        Ok(())
    }
}
