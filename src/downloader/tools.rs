use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use super::errors::{DownloadError, Result};
use super::traits::ProcessRunner;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolKind {
    YtDlp,
    Ffmpeg,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::YtDlp => "yt-dlp",
            ToolKind::Ffmpeg => "ffmpeg",
        }
    }

    fn version_flag(&self) -> &'static str {
        match self {
            ToolKind::YtDlp => "--version",
            ToolKind::Ffmpeg => "-version", // ffmpeg takes a single dash
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInfo {
    pub name: String,
    pub kind: ToolKind,
    pub path: PathBuf,
    pub version: Option<String>,
    pub is_available: bool,
}

/// Reports on the external binaries a download depends on
pub struct ToolManager {
    runner: Arc<dyn ProcessRunner>,
    ytdlp_path: PathBuf,
    ffmpeg_path: PathBuf,
}

impl ToolManager {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        ytdlp_path: impl Into<PathBuf>,
        ffmpeg_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            ytdlp_path: ytdlp_path.into(),
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    fn path_of(&self, kind: ToolKind) -> &PathBuf {
        match kind {
            ToolKind::YtDlp => &self.ytdlp_path,
            ToolKind::Ffmpeg => &self.ffmpeg_path,
        }
    }

    pub async fn tool_info(&self, kind: ToolKind) -> ToolInfo {
        let path = self.path_of(kind).clone();
        let version = match self.runner.version(&path, kind.version_flag()).await {
            Ok(version) => Some(version),
            Err(e) => {
                tracing::debug!(tool = kind.as_str(), path = %path.display(), error = %e, "tool version check failed");
                None
            }
        };

        ToolInfo {
            name: kind.as_str().to_string(),
            kind,
            path,
            is_available: version.is_some(),
            version,
        }
    }

    pub async fn all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.tool_info(ToolKind::YtDlp).await,
            self.tool_info(ToolKind::Ffmpeg).await,
        ]
    }

    /// Fail early when ffmpeg cannot run; recovery merges depend on it
    pub async fn check_ffmpeg(&self) -> Result<String> {
        let info = self.tool_info(ToolKind::Ffmpeg).await;
        match info.version {
            Some(version) => {
                tracing::info!(path = %info.path.display(), version = %version, "ffmpeg available");
                Ok(version)
            }
            None => Err(DownloadError::ToolNotFound(format!(
                "ffmpeg not found at {}",
                info.path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::test_helpers::{Script, ScriptedRunner};

    #[tokio::test]
    async fn test_all_tools_reports_availability() {
        let runner = Arc::new(
            ScriptedRunner::new().on("yt-dlp", Script::exit(0).stdout_line("2024.12.13")),
        );
        let manager = ToolManager::new(runner.clone(), "/usr/bin/yt-dlp", "/usr/bin/ffmpeg");

        let tools = manager.all_tools().await;

        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "yt-dlp");
        assert!(tools[0].is_available);
        assert_eq!(tools[0].version.as_deref(), Some("2024.12.13"));
        assert_eq!(tools[1].kind, ToolKind::Ffmpeg);
        assert!(!tools[1].is_available);
        assert_eq!(tools[1].version, None);

        let ffmpeg_calls = runner.calls_to("ffmpeg");
        assert_eq!(ffmpeg_calls[0].args, vec!["-version".to_string()]);
    }

    #[tokio::test]
    async fn test_check_ffmpeg() {
        let runner = Arc::new(ScriptedRunner::new().on(
            "ffmpeg",
            Script::exit(0).stdout_line("ffmpeg version 6.1.1 Copyright (c) 2000-2023"),
        ));
        let manager = ToolManager::new(runner, "yt-dlp", "/opt/ffmpeg/ffmpeg");
        assert!(manager.check_ffmpeg().await.unwrap().starts_with("ffmpeg version 6.1.1"));

        let manager = ToolManager::new(Arc::new(ScriptedRunner::new()), "yt-dlp", "/missing/ffmpeg");
        match manager.check_ffmpeg().await {
            Err(DownloadError::ToolNotFound(msg)) => assert!(msg.contains("/missing/ffmpeg")),
            other => panic!("expected ToolNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failing_version_check_is_unavailable() {
        let runner = Arc::new(ScriptedRunner::new().on("ffmpeg", Script::exit(1)));
        let manager = ToolManager::new(runner, "yt-dlp", "ffmpeg");
        assert!(!manager.tool_info(ToolKind::Ffmpeg).await.is_available);
    }
}
