// yt-dlp stdout parsing
//
// Recognized lines:
//   [download]  42.5% of ~10.0MiB at 1.2MiB/s ETA 00:30     full progress
//   [download]  42.5% of 10.0MiB in 00:00:08 at 1.2MiB/s    percentage only
//   [download] Destination: /downloads/output_1700000000000.f137.mp4
//   [Merger] Merging formats into "/downloads/output_1700000000000.mp4"
//   [download] /downloads/output_1700000000000.mp4 has already been downloaded

use lazy_static::lazy_static;
use regex::Regex;

use super::models::{DownloadInfo, DownloadStatus, ProgressEvent};

/// Marker yt-dlp puts on `--verbose` chatter
pub const DEBUG_MARKER: &str = "[debug]";

lazy_static! {
    static ref PROGRESS_RE: Regex = Regex::new(
        r"\[download\]\s+([\d.]+)%(?:\s+of\s+~?\s*([\d.]+)\s*(\w+))?\s+at\s+([\d.]+)\s*(\w+)/s\s+ETA\s+([\d:]+)"
    )
    .unwrap();
    static ref PERCENT_RE: Regex = Regex::new(r"\[download\]\s+([\d.]+)%").unwrap();
    static ref DEST_RE: Regex = Regex::new(r"\[download\]\s+Destination:\s+(.+)").unwrap();
    static ref MERGE_RE: Regex = Regex::new(r#"\[Merger\]\s+Merging formats into\s+"(.+)""#).unwrap();
    static ref ALREADY_RE: Regex = Regex::new(r"\[download\]\s+(.+?)\s+has already been downloaded").unwrap();
}

/// Outcome of feeding one line to the parser
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Progress(ProgressEvent),
    Filename(String),
    Ignored,
}

/// Is this line `--verbose` noise that must never reach matching or error logs?
pub fn is_debug_line(line: &str) -> bool {
    line.contains(DEBUG_MARKER)
}

/// Incremental parser owning the [`DownloadInfo`] of one download
#[derive(Debug, Default)]
pub struct ProgressParser {
    info: DownloadInfo,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self) -> &DownloadInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut DownloadInfo {
        &mut self.info
    }

    pub fn into_info(self) -> DownloadInfo {
        self.info
    }

    pub fn parse_line(&mut self, line: &str) -> ParsedLine {
        if is_debug_line(line) {
            return ParsedLine::Ignored;
        }

        let announced = DEST_RE
            .captures(line)
            .or_else(|| MERGE_RE.captures(line))
            .or_else(|| ALREADY_RE.captures(line));
        if let Some(caps) = announced {
            let filename = caps[1].trim().to_string();
            self.info.filename = filename.clone();
            return ParsedLine::Filename(filename);
        }

        if let Some(caps) = PROGRESS_RE.captures(line) {
            let Some(percent) = parse_percent(&caps[1]) else {
                return ParsedLine::Ignored;
            };
            self.info.progress = percent;
            if let (Some(size), Some(unit)) = (caps.get(2), caps.get(3)) {
                self.info.total_size = Some(format!("{} {}", size.as_str(), unit.as_str()));
            }
            self.info.speed = format!("{} {}/s", &caps[4], &caps[5]);
            self.info.eta = caps[6].to_string();
            return self.snapshot();
        }

        // Size/speed missing (e.g. the final "100% of X in 00:08" line):
        // keep the previous speed and ETA.
        if let Some(caps) = PERCENT_RE.captures(line) {
            let Some(percent) = parse_percent(&caps[1]) else {
                return ParsedLine::Ignored;
            };
            self.info.progress = percent;
            return self.snapshot();
        }

        ParsedLine::Ignored
    }

    fn snapshot(&self) -> ParsedLine {
        ParsedLine::Progress(ProgressEvent(self.info.clone()))
    }

    pub(crate) fn finish(&mut self, status: DownloadStatus) {
        self.info.status = status;
        if status == DownloadStatus::Complete {
            self.info.progress = 100.0;
        }
    }
}

fn parse_percent(raw: &str) -> Option<f64> {
    let value: f64 = raw.parse().ok()?;
    if value.is_finite() {
        Some(value.clamp(0.0, 100.0))
    } else {
        None
    }
}
