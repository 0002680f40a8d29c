// yt-dlp command lines
//
// Every invocation of the fetch tool is built here so the orchestrator and the
// info fetcher only decide *when* to run it.

use std::path::{Path, PathBuf};

use crate::downloader::models::DownloadRequest;
use crate::downloader::traits::ProcessCommand;

/// Prefer an mp4/m4a pair (merged by ffmpeg), fall back to a single file
pub const FORMAT_SELECTOR: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

pub const MERGE_OUTPUT_FORMAT: &str = "mp4";

/// yt-dlp's own merge: copy video, re-encode audio to AAC, faststart for players
pub const MERGER_POSTPROCESSOR_ARGS: &str = "FFmpegMergerPP:-c:v copy -c:a aac -movflags +faststart";

/// Work around bilibili's missing PO token formats
const EXTRACTOR_ARGS: &str = "bilibili:formats=missing_pot";

/// Keep yt-dlp's Python stdout in UTF-8 regardless of the host locale
pub const ENV_OVERRIDES: &[(&str, &str)] = &[("PYTHONIOENCODING", "utf-8")];

/// Arguments shared by every call that resolves a URL
fn common_args() -> Vec<String> {
    vec![
        "--no-warnings".to_string(),
        "--no-check-certificates".to_string(),
        "--no-playlist".to_string(),
        "--no-check-formats".to_string(),
        "--extractor-args".to_string(),
        EXTRACTOR_ARGS.to_string(),
    ]
}

fn with_env(mut command: ProcessCommand) -> ProcessCommand {
    for (key, value) in ENV_OVERRIDES {
        command = command.env(*key, *value);
    }
    command
}

/// `output_<timestamp>.%(ext)s` inside `output_dir`.
///
/// A timestamp instead of the video title keeps special characters out of
/// the filesystem.
pub fn output_template(output_dir: &Path, timestamp: i64) -> PathBuf {
    output_dir.join(format!("output_{}.%(ext)s", timestamp))
}

/// Download with progress on stdout, one update per line
pub fn download_command(request: &DownloadRequest, timestamp: i64) -> ProcessCommand {
    let template = output_template(&request.output_dir, timestamp);

    let mut args = vec![
        "-o".to_string(),
        template.to_string_lossy().into_owned(),
        "--restrict-filenames".to_string(),
        "--verbose".to_string(),
        "--progress".to_string(),
        "--newline".to_string(),
        "--format".to_string(),
        FORMAT_SELECTOR.to_string(),
        "--merge-output-format".to_string(),
        MERGE_OUTPUT_FORMAT.to_string(),
        "--ffmpeg-location".to_string(),
        request.ffmpeg_path.to_string_lossy().into_owned(),
        "--force-overwrites".to_string(),
        "--postprocessor-args".to_string(),
        MERGER_POSTPROCESSOR_ARGS.to_string(),
    ];
    args.extend(common_args());
    args.push(request.url.clone());

    with_env(ProcessCommand::new(&request.downloader_path).args(args))
}

/// Dump one JSON metadata record to stdout
pub fn info_command(ytdlp: &Path, url: &str) -> ProcessCommand {
    let mut args = vec!["--dump-json".to_string()];
    args.extend(common_args());
    args.push(url.to_string());
    with_env(ProcessCommand::new(ytdlp).args(args))
}

/// Print the human-readable format table
pub fn list_formats_command(ytdlp: &Path, url: &str) -> ProcessCommand {
    let mut args = vec!["--list-formats".to_string()];
    args.extend(common_args());
    args.push(url.to_string());
    with_env(ProcessCommand::new(ytdlp).args(args))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> DownloadRequest {
        DownloadRequest::new(
            "https://www.bilibili.com/video/BV1xx411c7mD",
            "/downloads",
            "/usr/bin/ffmpeg",
            "/usr/local/bin/yt-dlp",
        )
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_download_command() {
        let cmd = download_command(&request(), 1_700_000_000_000);

        assert_eq!(cmd.program, PathBuf::from("/usr/local/bin/yt-dlp"));
        assert_eq!(
            value_after(&cmd.args, "-o"),
            Some("/downloads/output_1700000000000.%(ext)s")
        );
        assert_eq!(value_after(&cmd.args, "--format"), Some(FORMAT_SELECTOR));
        assert_eq!(value_after(&cmd.args, "--merge-output-format"), Some("mp4"));
        assert_eq!(value_after(&cmd.args, "--ffmpeg-location"), Some("/usr/bin/ffmpeg"));
        assert_eq!(
            value_after(&cmd.args, "--postprocessor-args"),
            Some(MERGER_POSTPROCESSOR_ARGS)
        );
        assert!(cmd.args.contains(&"--newline".to_string()));
        assert!(cmd.args.contains(&"--no-playlist".to_string()));
        assert_eq!(cmd.args.last().unwrap(), "https://www.bilibili.com/video/BV1xx411c7mD");
        assert_eq!(cmd.envs, vec![("PYTHONIOENCODING".to_string(), "utf-8".to_string())]);
    }

    #[test]
    fn test_info_command() {
        let cmd = info_command(Path::new("yt-dlp"), "https://example.com/v");
        assert_eq!(cmd.args.first().unwrap(), "--dump-json");
        assert_eq!(
            value_after(&cmd.args, "--extractor-args"),
            Some("bilibili:formats=missing_pot")
        );
        assert_eq!(cmd.args.last().unwrap(), "https://example.com/v");
    }

    #[test]
    fn test_list_formats_command() {
        let cmd = list_formats_command(Path::new("yt-dlp"), "https://example.com/v");
        assert_eq!(cmd.args.first().unwrap(), "--list-formats");
        assert!(!cmd.args.contains(&"--dump-json".to_string()));
    }
}
