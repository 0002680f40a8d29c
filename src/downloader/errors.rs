// Error types for the download pipeline

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DownloadError>;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// Executable missing or not executable
    #[error("failed to start {program}: {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Process ran but exited non-zero (`None` when killed by a signal)
    #[error("process exited with code {}: {stderr}", display_code(.code))]
    ProcessExit { code: Option<i32>, stderr: String },

    /// Process exceeded its configured run time and was killed
    #[error("{program} timed out after {seconds}s")]
    ProcessTimeout { program: String, seconds: u64 },

    /// Metadata dump exited non-zero
    #[error("failed to fetch video information: {0}")]
    MetadataFetch(String),

    /// Metadata dump was not valid JSON
    #[error("failed to parse video information: {0}")]
    MetadataParse(#[from] serde_json::Error),

    /// Stream-copy mux failed, usually incompatible containers/codecs
    #[error(
        "merge failed (code {}), check that the video and audio formats are compatible: {stderr}",
        display_code(.exit_code)
    )]
    Merge {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Download exited non-zero and there was nothing to recover
    #[error("yt-dlp failed with exit code: {}", display_code(.exit_code))]
    DownloadFailed { exit_code: Option<i32> },

    /// Copy, rename, delete or directory creation failed
    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Required external tool could not be executed
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),
}

impl DownloadError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Exit code carried by the error, if any
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ProcessExit { code, .. } => *code,
            Self::Merge { exit_code, .. } | Self::DownloadFailed { exit_code } => *exit_code,
            _ => None,
        }
    }
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}
