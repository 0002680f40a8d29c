use clap::{Parser, Subcommand};
use std::path::PathBuf;

use videohelp::config::{ENV_FFMPEG, ENV_OUTPUT_DIR, ENV_YTDLP};

#[derive(Parser, Debug)]
#[command(
    name = "videohelp",
    about = "Fetch video information and download merged video/audio with yt-dlp and ffmpeg",
    version
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Directory downloads are written to
    #[arg(long, global = true, env = ENV_OUTPUT_DIR)]
    pub output_dir: Option<PathBuf>,

    /// yt-dlp executable
    #[arg(long = "yt-dlp", global = true, env = ENV_YTDLP)]
    pub ytdlp: Option<PathBuf>,

    /// ffmpeg executable
    #[arg(long, global = true, env = ENV_FFMPEG)]
    pub ffmpeg: Option<PathBuf>,

    /// Do not open the output folder when a download finishes
    #[arg(long, global = true)]
    pub no_open: bool,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Print title, description, thumbnail and duration as JSON
    Info { url: String },

    /// Download a video, printing one JSON event per line
    Download { url: String },

    /// Print yt-dlp's format table
    Formats { url: String },

    /// Report yt-dlp and ffmpeg availability
    Tools,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_download() {
        let args = Args::try_parse_from([
            "videohelp",
            "--output-dir",
            "/tmp/out",
            "--yt-dlp",
            "/opt/yt-dlp",
            "--no-open",
            "download",
            "https://example.com/v",
        ])
        .unwrap();

        assert_eq!(
            args.command,
            Commands::Download {
                url: "https://example.com/v".to_string()
            }
        );
        assert_eq!(args.output_dir, Some(PathBuf::from("/tmp/out")));
        assert_eq!(args.ytdlp, Some(PathBuf::from("/opt/yt-dlp")));
        assert!(args.no_open);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["videohelp", "info", "https://example.com/v", "-v"]).unwrap();
        assert!(args.verbose);
        assert!(!args.quiet);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Args::try_parse_from(["videohelp", "-v", "-q", "tools"]).is_err());
    }

    #[test]
    fn test_url_is_required() {
        assert!(Args::try_parse_from(["videohelp", "download"]).is_err());
    }
}
