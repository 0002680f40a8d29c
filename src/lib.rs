//! Video metadata and downloads on top of `yt-dlp` and `ffmpeg`.
//!
//! [`downloader::Downloader`] runs one download, streams parsed progress to a
//! subscriber and, when yt-dlp fails after fetching separate video and audio
//! streams, merges the leftovers itself. [`downloader::InfoFetcher`] answers
//! metadata queries. Both reach the binaries only through
//! [`downloader::ProcessRunner`].

pub mod config;
pub mod downloader;
pub mod ytdlp;

pub use config::Config;
pub use downloader::{
    DownloadError, DownloadEvent, DownloadInfo, DownloadRequest, Downloader, InfoFetcher, Result,
    ToolManager, VideoMetadata,
};
