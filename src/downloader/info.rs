// Metadata queries against yt-dlp: info dump, format table, version

use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::errors::{DownloadError, Result};
use super::models::VideoMetadata;
use super::progress::is_debug_line;
use super::traits::{discard_line, ProcessCommand, ProcessOutput, ProcessRunner};
use crate::ytdlp;

pub struct InfoFetcher {
    runner: Arc<dyn ProcessRunner>,
    ytdlp_path: PathBuf,
    timeout: Option<Duration>,
}

impl InfoFetcher {
    pub fn new(runner: Arc<dyn ProcessRunner>, ytdlp_path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            ytdlp_path: ytdlp_path.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Title, description, thumbnail and duration of `url`
    pub async fn fetch_info(&self, url: &str) -> Result<VideoMetadata> {
        tracing::info!(url = %url, "fetching video info");
        let output = self.query(ytdlp::info_command(&self.ytdlp_path, url)).await?;

        let json: Map<String, Value> = serde_json::from_str(output.stdout.trim())?;
        let metadata = metadata_from_json(&json);
        tracing::debug!(title = %metadata.title, duration = metadata.duration, "video info parsed");
        Ok(metadata)
    }

    /// yt-dlp's format table, unparsed
    pub async fn list_formats(&self, url: &str) -> Result<String> {
        tracing::info!(url = %url, "listing formats");
        let output = self.query(ytdlp::list_formats_command(&self.ytdlp_path, url)).await?;
        Ok(output.stdout)
    }

    pub async fn version(&self) -> Result<String> {
        self.runner.version(&self.ytdlp_path, "--version").await
    }

    async fn query(&self, command: ProcessCommand) -> Result<ProcessOutput> {
        let output = self
            .runner
            .run(command.timeout(self.timeout), &mut discard_line)
            .await?;
        if output.success() {
            return Ok(output);
        }

        let stderr = without_debug_lines(&output.stderr);
        tracing::error!(exit_code = ?output.exit_code, stderr = %stderr, "yt-dlp query failed");
        Err(DownloadError::MetadataFetch(stderr))
    }
}

fn without_debug_lines(stderr: &str) -> String {
    stderr
        .lines()
        .filter(|line| !is_debug_line(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn metadata_from_json(json: &Map<String, Value>) -> VideoMetadata {
    let text = |key: &str, default: &str| {
        json.get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    };
    // Live streams and some extractors report no duration or a fractional one
    let duration = json
        .get("duration")
        .and_then(Value::as_f64)
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| d.round() as u64)
        .unwrap_or(0);

    VideoMetadata {
        title: text("title", "Unknown"),
        description: text("description", ""),
        thumbnail: text("thumbnail", ""),
        duration,
    }
}
