// Runtime configuration: output location, tool paths and timeouts

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::downloader::errors::{DownloadError, Result};
use crate::downloader::models::DownloadRequest;

pub const ENV_YTDLP: &str = "VIDEOHELP_YTDLP";
pub const ENV_FFMPEG: &str = "VIDEOHELP_FFMPEG";
pub const ENV_OUTPUT_DIR: &str = "VIDEOHELP_OUTPUT_DIR";
pub const ENV_DOWNLOAD_TIMEOUT: &str = "VIDEOHELP_DOWNLOAD_TIMEOUT";
pub const ENV_NO_OPEN: &str = "VIDEOHELP_NO_OPEN";

const OUTPUT_SUBDIR: &str = "videohelp-downloads";
const DEFAULT_INFO_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub output_dir: PathBuf,
    pub ytdlp_path: PathBuf,
    pub ffmpeg_path: PathBuf,
    /// Reveal the output folder after a successful download
    pub open_directory: bool,
    pub info_timeout: Option<Duration>,
    /// `None`: a download may run as long as yt-dlp needs
    pub download_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            ytdlp_path: find_binary("yt-dlp"),
            ffmpeg_path: find_binary("ffmpeg"),
            open_directory: true,
            info_timeout: Some(DEFAULT_INFO_TIMEOUT),
            download_timeout: None,
        }
    }
}

impl Config {
    /// Defaults overridden by `VIDEOHELP_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = var(ENV_YTDLP) {
            self.ytdlp_path = PathBuf::from(path);
        }
        if let Some(path) = var(ENV_FFMPEG) {
            self.ffmpeg_path = PathBuf::from(path);
        }
        if let Some(dir) = var(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(raw) = var(ENV_DOWNLOAD_TIMEOUT) {
            let seconds: u64 = raw.trim().parse().map_err(|_| {
                DownloadError::Config(format!("{} must be a number of seconds, got {:?}", ENV_DOWNLOAD_TIMEOUT, raw))
            })?;
            self.download_timeout = (seconds > 0).then(|| Duration::from_secs(seconds));
        }
        if let Some(raw) = var(ENV_NO_OPEN) {
            self.open_directory = !is_truthy(&raw);
        }
        Ok(self)
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_ytdlp_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ytdlp_path = path.into();
        self
    }

    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    pub fn with_open_directory(mut self, open: bool) -> Self {
        self.open_directory = open;
        self
    }

    pub fn with_download_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_info_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.info_timeout = timeout;
        self
    }

    pub fn request(&self, url: impl Into<String>) -> DownloadRequest {
        DownloadRequest::new(url, &self.output_dir, &self.ffmpeg_path, &self.ytdlp_path)
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn default_output_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(OUTPUT_SUBDIR)
}

fn install_dirs() -> Vec<PathBuf> {
    let mut search = vec![
        PathBuf::from("/opt/homebrew/bin"), // Homebrew on Apple Silicon
        PathBuf::from("/usr/local/bin"),
        PathBuf::from("/usr/bin"),
    ];
    if let Some(home) = dirs::home_dir() {
        search.push(home.join(".local").join("bin")); // pip --user
    }
    search
}

/// Locate `name`: common install locations, then `PATH`, then the bare name
pub fn find_binary(name: &str) -> PathBuf {
    resolve_binary(name, &install_dirs(), |n| which::which(n).ok())
}

fn resolve_binary(name: &str, search: &[PathBuf], on_path: impl Fn(&str) -> Option<PathBuf>) -> PathBuf {
    let file_name = executable_name(name);
    search
        .iter()
        .map(|dir| dir.join(&file_name))
        .find(|candidate| is_file(candidate))
        .or_else(|| on_path(name))
        .unwrap_or_else(|| PathBuf::from(name))
}

fn executable_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

fn is_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn base() -> Config {
        Config {
            output_dir: PathBuf::from("/downloads"),
            ytdlp_path: PathBuf::from("yt-dlp"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            open_directory: true,
            info_timeout: Some(DEFAULT_INFO_TIMEOUT),
            download_timeout: None,
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.output_dir.ends_with(OUTPUT_SUBDIR));
        assert_eq!(config.info_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.download_timeout, None);
        assert!(config.open_directory);
    }

    #[test]
    fn test_env_overrides() {
        let config = base()
            .apply_env(env(&[
                (ENV_YTDLP, "/opt/yt-dlp"),
                (ENV_FFMPEG, "/opt/ffmpeg"),
                (ENV_OUTPUT_DIR, "/data/videos"),
                (ENV_DOWNLOAD_TIMEOUT, "3600"),
                (ENV_NO_OPEN, "1"),
            ]))
            .unwrap();

        assert_eq!(config.ytdlp_path, PathBuf::from("/opt/yt-dlp"));
        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(config.output_dir, PathBuf::from("/data/videos"));
        assert_eq!(config.download_timeout, Some(Duration::from_secs(3600)));
        assert!(!config.open_directory);
    }

    #[test]
    fn test_empty_and_zero_values() {
        let config = base()
            .apply_env(env(&[(ENV_OUTPUT_DIR, "  "), (ENV_DOWNLOAD_TIMEOUT, "0"), (ENV_NO_OPEN, "false")]))
            .unwrap();
        assert_eq!(config, base());
    }

    #[test]
    fn test_invalid_timeout_is_config_error() {
        let result = base().apply_env(env(&[(ENV_DOWNLOAD_TIMEOUT, "soon")]));
        match result {
            Err(DownloadError::Config(msg)) => assert!(msg.contains(ENV_DOWNLOAD_TIMEOUT)),
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_request_uses_configured_paths() {
        let request = base().with_ffmpeg_path("/opt/ffmpeg").request("https://example.com/v");
        assert_eq!(request.url, "https://example.com/v");
        assert_eq!(request.output_dir, PathBuf::from("/downloads"));
        assert_eq!(request.ffmpeg_path, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(request.downloader_path, PathBuf::from("yt-dlp"));
    }

    #[test]
    fn test_resolve_binary_order() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let search = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let exe = executable_name("yt-dlp");

        // Nothing installed, nothing on PATH: bare name
        assert_eq!(resolve_binary("yt-dlp", &search, |_| None), PathBuf::from("yt-dlp"));

        // PATH hit
        assert_eq!(
            resolve_binary("yt-dlp", &search, |_| Some(PathBuf::from("/path/yt-dlp"))),
            PathBuf::from("/path/yt-dlp")
        );

        // Install dirs win over PATH, in order
        std::fs::write(second.path().join(&exe), b"").unwrap();
        assert_eq!(
            resolve_binary("yt-dlp", &search, |_| Some(PathBuf::from("/path/yt-dlp"))),
            second.path().join(&exe)
        );
        std::fs::write(first.path().join(&exe), b"").unwrap();
        assert_eq!(resolve_binary("yt-dlp", &search, |_| None), first.path().join(&exe));
    }
}
