//! `yt-dlp` backed discovery and acquisition.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{AcquireProgress, AcquireRequest, Acquirer, Discovery, DiscoveryRequest};
use crate::domain::{Candidate, LiveRule, LiveStatus, MediaType};
use crate::utils::process::{stderr_tail, tokio_command};
use crate::{Error, Result};

/// Prefix of the line yt-dlp prints with the final file path.
const FILEPATH_MARKER: &str = "chantube-file:";

/// Exit code yt-dlp uses when it stops early on a break filter.
const EXIT_BREAK_FILTER: i32 = 101;

/// Channel tabs that already select a listing.
const LISTING_TABS: &[&str] = &["videos", "streams", "shorts", "live", "featured", "playlists"];

#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    pub binary_path: PathBuf,
    /// Passed as `--ffmpeg-location` when set.
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("yt-dlp"),
            ffmpeg_path: None,
        }
    }
}

/// Subset of yt-dlp's JSON info dict that we use.
#[derive(Debug, Deserialize)]
struct InfoEntry {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    upload_date: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    live_status: Option<String>,
}

impl InfoEntry {
    fn into_candidate(self, channel: &str) -> Candidate {
        let uploaded_at = self
            .timestamp
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| self.upload_date.as_deref().and_then(parse_upload_date));

        let link = self
            .webpage_url
            .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", self.id));

        Candidate {
            title: self.title.unwrap_or_else(|| self.id.clone()),
            link,
            duration: self.duration.map(|d| d.max(0.0).round() as u64),
            uploaded_at,
            channel: channel.to_string(),
            live_status: parse_live_status(self.live_status.as_deref()),
            id: self.id,
        }
    }
}

fn parse_upload_date(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

fn parse_live_status(raw: Option<&str>) -> LiveStatus {
    match raw {
        Some("is_upcoming") => LiveStatus::Upcoming,
        Some("is_live") => LiveStatus::Live,
        Some("post_live") => LiveStatus::PostLive,
        _ => LiveStatus::None,
    }
}

/// Pick the channel tab to list for a live rule.
///
/// Links that already point at a tab, a playlist or a single video are used
/// as-is.
pub fn listing_url(source_url: &str, live_rule: LiveRule) -> String {
    let Ok(url) = url::Url::parse(source_url) else {
        return source_url.to_string();
    };

    let has_list = url.query_pairs().any(|(k, _)| k == "list");
    let last_segment = url
        .path_segments()
        .and_then(|mut s| s.rfind(|seg| !seg.is_empty()))
        .unwrap_or("");

    if has_list
        || LISTING_TABS.contains(&last_segment)
        || matches!(last_segment, "watch" | "playlist")
    {
        return source_url.to_string();
    }

    let base = source_url.trim_end_matches('/');
    match live_rule {
        LiveRule::Ignore => format!("{base}/videos"),
        LiveRule::Only => format!("{base}/streams"),
        LiveRule::Allow => base.to_string(),
    }
}

fn progress_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\[download\]\s+(?P<pct>\d+(?:\.\d+)?)%\s+of\s+~?\s*(?P<total>\S+)(?:\s+at\s+(?P<speed>\S+(?:\s?\S+/s)?))?(?:\s+ETA\s+(?P<eta>\S+))?",
        )
        .ok()
    })
    .as_ref()
}

/// Parse a `--newline` progress line such as
/// `[download]  42.0% of  10.00MiB at  1.00MiB/s ETA 00:06`.
pub fn parse_progress_line(line: &str) -> Option<(f64, Option<String>, Option<String>, Option<String>)> {
    let caps = progress_regex()?.captures(line.trim())?;
    let percent = caps.name("pct")?.as_str().parse().ok()?;
    let field = |name: &str| caps.name(name).map(|m| m.as_str().to_string());
    Some((percent, field("total"), field("speed"), field("eta")))
}

/// Runs the `yt-dlp` binary.
pub struct YtDlpClient {
    config: YtDlpConfig,
}

impl YtDlpClient {
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    fn discovery_args(&self, request: &DiscoveryRequest) -> Vec<String> {
        let mut args = vec![
            "-j".to_string(),
            "--ignore-errors".to_string(),
            "--no-warnings".to_string(),
        ];
        if let Some(limit) = request.search_limit {
            args.push("--playlist-end".to_string());
            args.push(limit.to_string());
        }
        args.push("--break-match-filters".to_string());
        args.push(format!(
            "upload_date>=?{}",
            request.cutoff.format("%Y%m%d")
        ));
        args.push(listing_url(&request.source_url, request.live_rule));
        args
    }

    fn acquire_args(&self, request: &AcquireRequest) -> Vec<String> {
        let stem = request.output_dir.join(&request.file_stem);
        let output = format!("{}.%(ext)s", escape_template(&stem.to_string_lossy()));

        let mut args = vec![
            "--newline".to_string(),
            "--no-simulate".to_string(),
            "--progress".to_string(),
            "--no-playlist".to_string(),
            "--print".to_string(),
            format!("after_move:{FILEPATH_MARKER}%(filepath)s"),
            "-o".to_string(),
            output,
        ];

        if let Some(ffmpeg) = &self.config.ffmpeg_path {
            args.push("--ffmpeg-location".to_string());
            args.push(ffmpeg.to_string_lossy().into_owned());
        }

        match request.media_type {
            MediaType::Video => {
                args.push("-f".to_string());
                args.push(format!(
                    "{}+bestaudio/bestvideo+bestaudio/best",
                    request.format_id
                ));
                args.push("--merge-output-format".to_string());
                args.push("mp4".to_string());
            }
            MediaType::Audio => {
                args.push("-f".to_string());
                args.push(format!("{}/bestaudio", request.format_id));
                args.push("-x".to_string());
                args.push("--audio-format".to_string());
                args.push("mp3".to_string());
            }
        }

        if let Some(subs) = &request.subtitles {
            args.extend([
                "--write-subs".to_string(),
                "--sub-langs".to_string(),
                subs.languages.clone(),
                "--convert-subs".to_string(),
                "srt".to_string(),
            ]);
        }

        if request.candidate.live_status.is_live_or_upcoming() {
            args.extend([
                "--live-from-start".to_string(),
                "--wait-for-video".to_string(),
                "60".to_string(),
            ]);
        }

        args.push(request.candidate.link.clone());
        args
    }
}

/// Literal text inside an output template; `%` would start a field.
fn escape_template(text: &str) -> String {
    text.replace('%', "%%")
}

#[async_trait]
impl Discovery for YtDlpClient {
    async fn discover(&self, request: &DiscoveryRequest) -> Result<Vec<Candidate>> {
        let args = self.discovery_args(request);
        debug!(channel = %request.channel_name, ?args, "Running yt-dlp discovery");

        let output = tokio_command(&self.config.binary_path)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::process(format!("failed to spawn yt-dlp: {e}")))?;

        let mut candidates = Vec::new();
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<InfoEntry>(line) {
                Ok(entry) => candidates.push(entry.into_candidate(&request.channel_name)),
                Err(e) => debug!(error = %e, "Skipping unparsable yt-dlp line"),
            }
        }

        let code = output.status.code();
        if !output.status.success() && code != Some(EXIT_BREAK_FILTER) {
            if candidates.is_empty() {
                return Err(Error::process(format!(
                    "yt-dlp discovery exited with {}: {}",
                    output.status,
                    stderr_tail(&output.stderr)
                )));
            }
            warn!(
                channel = %request.channel_name,
                status = %output.status,
                "yt-dlp reported errors for some items"
            );
        }

        info!(
            channel = %request.channel_name,
            count = candidates.len(),
            "Discovered remote items"
        );
        Ok(candidates)
    }
}

#[async_trait]
impl Acquirer for YtDlpClient {
    async fn acquire(
        &self,
        request: &AcquireRequest,
        progress: mpsc::Sender<AcquireProgress>,
    ) -> Result<PathBuf> {
        let args = self.acquire_args(request);
        let title = request.candidate.title.clone();
        let channel = request.candidate.channel.clone();
        debug!(%channel, %title, ?args, "Running yt-dlp download");

        let mut child = tokio_command(&self.config.binary_path)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::process(format!("failed to spawn yt-dlp: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::process("failed to capture yt-dlp stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::process("failed to capture yt-dlp stderr"))?;

        // Progress may land on either stream depending on yt-dlp's quiet mode.
        let report = {
            let progress = progress.clone();
            let title = title.clone();
            let channel = channel.clone();
            move |line: &str| {
                if let Some((percent, total, speed, eta)) = parse_progress_line(line) {
                    // Full channel means a slow observer; dropping a tick is fine.
                    let _ = progress.try_send(AcquireProgress {
                        channel: channel.clone(),
                        title: title.clone(),
                        percent,
                        total,
                        speed,
                        eta,
                    });
                    true
                } else {
                    false
                }
            }
        };

        let stderr_report = report.clone();
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut last_error = String::new();
            while let Ok(Some(line)) = lines.next_line().await {
                if !stderr_report(&line) && !line.trim().is_empty() {
                    last_error = line;
                }
            }
            last_error
        });

        let mut final_path = None;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| Error::process(format!("failed to read yt-dlp output: {e}")))?
        {
            if let Some(path) = line.trim().strip_prefix(FILEPATH_MARKER) {
                final_path = Some(PathBuf::from(path));
            } else {
                report(&line);
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| Error::process(format!("failed to wait for yt-dlp: {e}")))?;
        let last_error = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(Error::process(format!(
                "yt-dlp exited with {status}: {}",
                last_error.trim()
            )));
        }

        let path = final_path
            .ok_or_else(|| Error::process("yt-dlp finished without reporting an output file"))?;
        info!(%channel, %title, path = %path.display(), "Downloaded item");
        Ok(path)
    }
}
