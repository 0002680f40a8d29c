// Common data models for downloader

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One download attempt. Immutable once the orchestrator starts.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub output_dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub downloader_path: PathBuf,
}

impl DownloadRequest {
    pub fn new(
        url: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        ffmpeg_path: impl Into<PathBuf>,
        downloader_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            url: url.into(),
            output_dir: output_dir.into(),
            ffmpeg_path: ffmpeg_path.into(),
            downloader_path: downloader_path.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    #[default]
    Downloading,
    Complete,
    Error,
}

/// Live state of one download, owned by that download's parser
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadInfo {
    pub filename: String,
    /// Percent, 0–100
    pub progress: f64,
    pub speed: String,
    pub eta: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_size: Option<String>,
    pub status: DownloadStatus,
}

/// Snapshot of [`DownloadInfo`] taken when a progress line was parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressEvent(pub DownloadInfo);

impl ProgressEvent {
    pub fn progress(&self) -> f64 {
        self.0.progress
    }

    pub fn speed(&self) -> &str {
        &self.0.speed
    }

    pub fn eta(&self) -> &str {
        &self.0.eta
    }

    pub fn total_size(&self) -> Option<&str> {
        self.0.total_size.as_deref()
    }

    pub fn filename(&self) -> &str {
        &self.0.filename
    }
}

/// Everything a download pushes to its subscriber.
///
/// Serializes to the records a transport relays verbatim:
/// a progress tick is the snapshot itself, completion is
/// `{"status":"complete","filename":..}` and failure is
/// `{"status":"error","error":..}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DownloadEvent {
    Progress(ProgressEvent),
    Completed {
        status: DownloadStatus,
        filename: String,
    },
    Failed {
        status: DownloadStatus,
        error: String,
    },
}

impl DownloadEvent {
    pub fn completed(filename: impl Into<String>) -> Self {
        Self::Completed {
            status: DownloadStatus::Complete,
            filename: filename.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            status: DownloadStatus::Error,
            error: error.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

/// Separately downloaded video and audio streams found after a failed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCandidate {
    pub video: PathBuf,
    pub audio: PathBuf,
}

/// Video information extracted from the metadata dump
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    /// Whole seconds
    pub duration: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tick_wire_shape() {
        let event = DownloadEvent::Progress(ProgressEvent(DownloadInfo {
            filename: "output_1.f137.mp4".to_string(),
            progress: 42.5,
            speed: "1.2 MiB/s".to_string(),
            eta: "00:30".to_string(),
            total_size: None,
            status: DownloadStatus::Downloading,
        }));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["progress"], 42.5);
        assert_eq!(json["speed"], "1.2 MiB/s");
        assert_eq!(json["eta"], "00:30");
        assert_eq!(json["status"], "downloading");
        assert!(json.get("totalSize").is_none());
    }

    #[test]
    fn test_terminal_wire_shapes() {
        let done = serde_json::to_value(DownloadEvent::completed("output_1.mp4")).unwrap();
        assert_eq!(done["status"], "complete");
        assert_eq!(done["filename"], "output_1.mp4");

        let failed = serde_json::to_value(DownloadEvent::failed("boom")).unwrap();
        assert_eq!(failed["status"], "error");
        assert_eq!(failed["error"], "boom");
    }

    #[test]
    fn test_only_progress_is_non_terminal() {
        assert!(!DownloadEvent::Progress(ProgressEvent(DownloadInfo::default())).is_terminal());
        assert!(DownloadEvent::completed("x").is_terminal());
        assert!(DownloadEvent::failed("x").is_terminal());
    }
}
