// Recovery merge: stitch separately downloaded video and audio fragments
// together with ffmpeg when yt-dlp gave up before its own merge step.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::errors::{DownloadError, Result};
use super::models::MergeCandidate;
use super::traits::{ProcessCommand, ProcessRunner, StreamKind};

const VIDEO_EXTENSIONS: &[&str] = &["mp4"];
const AUDIO_EXTENSIONS: &[&str] = &["m4a", "aac", "ogg"];

lazy_static! {
    // yt-dlp names unmerged streams `<template>.f<format_id>.<ext>`
    static ref FORMAT_INFIX_RE: Regex = Regex::new(r"\.f\d+\.[A-Za-z0-9]+$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FragmentKind {
    Video,
    Audio,
}

fn fragment_kind(name: &str) -> Option<FragmentKind> {
    if name.starts_with("temp_") {
        return None;
    }
    let (stem, ext) = name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    let stem = stem.to_ascii_lowercase();
    let has_infix = FORMAT_INFIX_RE.is_match(name);

    if VIDEO_EXTENSIONS.contains(&ext.as_str()) && (has_infix || stem.contains("video")) {
        Some(FragmentKind::Video)
    } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) && (has_infix || stem.contains("audio")) {
        Some(FragmentKind::Audio)
    } else {
        None
    }
}

/// Pick one video and one audio fragment out of `names`.
///
/// `names` is expected in listing order. Fragments written by the download
/// keyed by `timestamp` win; otherwise the first match of each kind is used.
fn select_candidate(dir: &Path, names: &[String], timestamp: i64) -> Option<MergeCandidate> {
    let own_prefix = format!("output_{}.", timestamp);
    let pick = |kind: FragmentKind| {
        names
            .iter()
            .filter(|name| fragment_kind(name) == Some(kind))
            .min_by_key(|name| !name.starts_with(&own_prefix))
    };

    let video = pick(FragmentKind::Video)?;
    let audio = pick(FragmentKind::Audio)?;
    Some(MergeCandidate {
        video: dir.join(video),
        audio: dir.join(audio),
    })
}

/// Scan `dir` for a video/audio fragment pair left behind by a failed download.
///
/// Entries are sorted by name so the choice does not depend on the
/// filesystem's listing order.
pub async fn find_merge_candidate(dir: &Path, timestamp: i64) -> Result<Option<MergeCandidate>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| DownloadError::fs(dir, e))?;

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| DownloadError::fs(dir, e))?
    {
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();

    let video_count = names.iter().filter(|n| fragment_kind(n) == Some(FragmentKind::Video)).count();
    let audio_count = names.iter().filter(|n| fragment_kind(n) == Some(FragmentKind::Audio)).count();
    tracing::info!(
        path = %dir.display(),
        video_fragments = video_count,
        audio_fragments = audio_count,
        "scanned for leftover fragments"
    );

    Ok(select_candidate(dir, &names, timestamp))
}

/// Muxes a video and an audio file with ffmpeg stream copy (no re-encode).
///
/// Work happens in a private temporary directory under fixed short names so
/// long or unusual paths never reach ffmpeg. That directory is removed on
/// every exit path.
pub struct RecoveryMerger {
    runner: Arc<dyn ProcessRunner>,
    ffmpeg_path: PathBuf,
    workspace_root: PathBuf,
    timeout: Option<Duration>,
}

impl RecoveryMerger {
    pub fn new(runner: Arc<dyn ProcessRunner>, ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            ffmpeg_path: ffmpeg_path.into(),
            workspace_root: std::env::temp_dir(),
            timeout: None,
        }
    }

    /// Directory the per-merge temporary workspace is created in
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        let workspace = tempfile::Builder::new()
            .prefix("dl_")
            .tempdir_in(&self.workspace_root)
            .map_err(|e| DownloadError::fs(&self.workspace_root, e))?;
        let workspace_path = workspace.path().to_path_buf();

        let result = self.merge_in(&workspace_path, video, audio, output).await;

        if let Err(e) = workspace.close() {
            tracing::warn!(path = %workspace_path.display(), error = %e, "failed to remove merge workspace");
        }
        result
    }

    async fn merge_in(&self, workspace: &Path, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        let temp_video = workspace.join("v.mp4");
        let temp_audio = workspace.join("a.m4a");
        let temp_output = workspace.join("out.mp4");

        tokio::fs::copy(video, &temp_video)
            .await
            .map_err(|e| DownloadError::fs(video, e))?;
        tokio::fs::copy(audio, &temp_audio)
            .await
            .map_err(|e| DownloadError::fs(audio, e))?;

        let command = ProcessCommand::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-y", "-i"])
            .arg(temp_video.to_string_lossy())
            .arg("-i")
            .arg(temp_audio.to_string_lossy())
            .args(["-c:v", "copy", "-c:a", "copy"])
            .arg(temp_output.to_string_lossy())
            .timeout(self.timeout);

        tracing::info!(
            video = %video.display(),
            audio = %audio.display(),
            output = %output.display(),
            "merging fragments"
        );
        let result = self
            .runner
            .run(command, &mut |stream, line| {
                if stream == StreamKind::Stderr {
                    tracing::trace!(target: "ffmpeg", "{}", line);
                }
            })
            .await?;

        if !result.success() {
            tracing::error!(exit_code = ?result.exit_code, stderr = %result.stderr.trim(), "ffmpeg merge failed");
            return Err(DownloadError::Merge {
                exit_code: result.exit_code,
                stderr: result.stderr.trim().to_string(),
            });
        }

        tokio::fs::copy(&temp_output, output)
            .await
            .map_err(|e| DownloadError::fs(output, e))?;
        Ok(())
    }
}
