// Download orchestration with fragment recovery

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::errors::{DownloadError, Result};
use super::merger::{find_merge_candidate, RecoveryMerger};
use super::models::{DownloadEvent, DownloadInfo, DownloadRequest, DownloadStatus, MergeCandidate};
use super::progress::{is_debug_line, ParsedLine, ProgressParser};
use super::traits::{DirectoryOpener, ProcessRunner, ProgressEmitter, StreamKind};
use super::utils::{ensure_dir, open_directory_best_effort, timestamp_millis};
use crate::ytdlp;

/// Drives yt-dlp for one request and falls back to merging leftover
/// fragments with ffmpeg when yt-dlp exits non-zero.
///
/// Each call owns its process, its parser and its event channel; a
/// `Downloader` can serve any number of concurrent downloads.
pub struct Downloader {
    runner: Arc<dyn ProcessRunner>,
    opener: Arc<dyn DirectoryOpener>,
    download_timeout: Option<Duration>,
    merge_timeout: Option<Duration>,
    scratch_dir: Option<PathBuf>,
    /// Source of the `output_<ts>` key
    clock: fn() -> i64,
}

impl Downloader {
    pub fn new(runner: Arc<dyn ProcessRunner>, opener: Arc<dyn DirectoryOpener>) -> Self {
        Self {
            runner,
            opener,
            download_timeout: None,
            merge_timeout: None,
            scratch_dir: None,
            clock: timestamp_millis,
        }
    }

    /// Kill yt-dlp if it runs longer than this
    pub fn with_download_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_merge_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.merge_timeout = timeout;
        self
    }

    /// Where the recovery merge creates its workspace (system temp otherwise)
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Run one download to completion.
    ///
    /// Progress ticks go to `emitter` in parse order, followed by exactly one
    /// terminal event. The same outcome is returned to the caller.
    pub async fn download(&self, request: &DownloadRequest, emitter: &ProgressEmitter) -> Result<DownloadInfo> {
        let result = self.run_download(request, emitter).await;

        match &result {
            Ok(info) => {
                tracing::info!(url = %request.url, filename = %info.filename, "download complete");
                emitter.emit(DownloadEvent::completed(info.filename.clone()));
            }
            Err(e) => {
                tracing::error!(url = %request.url, error = %e, "download failed");
                emitter.emit(DownloadEvent::failed(e.to_string()));
            }
        }
        result
    }

    /// Spawn [`download`](Self::download) and hand back its events as a stream.
    ///
    /// The stream ends after the terminal event. Dropping the join handle
    /// detaches the task; aborting it kills the child process.
    pub fn download_stream(
        self: &Arc<Self>,
        request: DownloadRequest,
    ) -> (UnboundedReceiverStream<DownloadEvent>, JoinHandle<Result<DownloadInfo>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let emitter = ProgressEmitter::new(tx);
            this.download(&request, &emitter).await
        });
        (UnboundedReceiverStream::new(rx), handle)
    }

    async fn run_download(
        &self,
        request: &DownloadRequest,
        emitter: &ProgressEmitter,
    ) -> Result<DownloadInfo> {
        ensure_dir(&request.output_dir).await?;
        let timestamp = (self.clock)();

        let command = ytdlp::download_command(request, timestamp).timeout(self.download_timeout);
        tracing::info!(url = %request.url, timestamp, command = %command, "downloading");

        let mut parser = ProgressParser::new();
        let output = {
            let mut observer = |stream: StreamKind, line: &str| match stream {
                StreamKind::Stdout => match parser.parse_line(line) {
                    ParsedLine::Progress(event) => emitter.emit(DownloadEvent::Progress(event)),
                    ParsedLine::Filename(name) => tracing::debug!(filename = %name, "destination"),
                    ParsedLine::Ignored => tracing::trace!(target: "yt-dlp", "{}", line),
                },
                StreamKind::Stderr if is_debug_line(line) => tracing::trace!(target: "yt-dlp", "{}", line),
                StreamKind::Stderr => tracing::warn!(target: "yt-dlp", "{}", line),
            };
            self.runner.run(command, &mut observer).await?
        };

        if output.success() {
            parser.finish(DownloadStatus::Complete);
            open_directory_best_effort(self.opener.as_ref(), &request.output_dir);
            return Ok(parser.into_info());
        }

        tracing::warn!(exit_code = ?output.exit_code, "yt-dlp exited non-zero, looking for fragments to merge");
        let candidate = match find_merge_candidate(&request.output_dir, timestamp).await {
            Ok(candidate) => candidate,
            Err(e) => {
                tracing::warn!(error = %e, "fragment scan failed");
                None
            }
        };
        let Some(candidate) = candidate else {
            return Err(DownloadError::DownloadFailed {
                exit_code: output.exit_code,
            });
        };

        tracing::info!(video = %candidate.video.display(), audio = %candidate.audio.display(), timestamp, "merging leftover fragments");
        let merged = self.recover(request, &candidate, timestamp).await?;

        parser.info_mut().filename = merged.to_string_lossy().into_owned();
        parser.finish(DownloadStatus::Complete);
        open_directory_best_effort(self.opener.as_ref(), &request.output_dir);
        Ok(parser.into_info())
    }

    /// Rename the fragments out of yt-dlp's way, merge them and clean up.
    /// Returns the merged file's path.
    async fn recover(&self, request: &DownloadRequest, candidate: &MergeCandidate, timestamp: i64) -> Result<PathBuf> {
        let dir = &request.output_dir;
        let temp_video = dir.join(format!("temp_video_{}.mp4", timestamp));
        let temp_audio = dir.join(format!("temp_audio_{}.m4a", timestamp));
        let output = dir.join(format!("output_{}.mp4", timestamp));

        rename(&candidate.video, &temp_video).await?;
        if let Err(e) = rename(&candidate.audio, &temp_audio).await {
            // temp_* names are never scanned; put the video back where a retry finds it
            if let Err(undo) = tokio::fs::rename(&temp_video, &candidate.video).await {
                tracing::warn!(path = %temp_video.display(), error = %undo, "failed to restore video fragment");
            }
            return Err(e);
        }

        let mut merger = RecoveryMerger::new(Arc::clone(&self.runner), &request.ffmpeg_path).with_timeout(self.merge_timeout);
        if let Some(scratch) = &self.scratch_dir {
            merger = merger.with_workspace_root(scratch);
        }
        merger.merge(&temp_video, &temp_audio, &output).await?;

        for temp in [&temp_video, &temp_audio] {
            if let Err(e) = tokio::fs::remove_file(temp).await {
                tracing::warn!(path = %temp.display(), error = %e, "failed to remove temporary file");
            }
        }
        Ok(output)
    }
}

async fn rename(from: &Path, to: &Path) -> Result<()> {
    tokio::fs::rename(from, to)
        .await
        .map_err(|e| DownloadError::fs(from, e))
}
