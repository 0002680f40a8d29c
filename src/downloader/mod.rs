// Downloader module: process plumbing, progress parsing, recovery merge

pub mod errors;
pub mod info;
pub mod merger;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod runner;
pub mod tools;
pub mod traits;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use errors::{DownloadError, Result};
pub use info::InfoFetcher;
pub use merger::{find_merge_candidate, RecoveryMerger};
pub use models::{DownloadEvent, DownloadInfo, DownloadRequest, DownloadStatus, MergeCandidate, ProgressEvent, VideoMetadata};
pub use orchestrator::Downloader;
pub use progress::{ParsedLine, ProgressParser};
pub use runner::TokioProcessRunner;
pub use tools::{ToolInfo, ToolKind, ToolManager};
pub use traits::{DirectoryOpener, ProcessCommand, ProcessOutput, ProcessRunner, ProgressEmitter, StreamKind};
pub use utils::{NoopDirectoryOpener, SystemDirectoryOpener};
