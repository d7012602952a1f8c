//! Tag embedding with `ffmpeg` and tag reading with `ffprobe`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use tracing::debug;

use super::{ItemTags, MediaTagger};
use crate::utils::fs::{io_error, remove_file_if_exists};
use crate::utils::process::{stderr_tail, tokio_command};
use crate::{Error, Result};

/// Writes tags by remuxing (`-c copy`) into a temp file and renaming it over
/// the original.
#[derive(Debug, Clone)]
pub struct FfmpegTagger {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
}

impl Default for FfmpegTagger {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    tags: HashMap<String, String>,
}

impl FfmpegTagger {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    fn temp_path(path: &Path) -> PathBuf {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("item");
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("tmp");
        path.with_file_name(format!("{stem}.tagging.{ext}"))
    }

    fn embed_args(input: &Path, output: &Path, tags: &ItemTags) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            input.to_string_lossy().into_owned(),
            "-map".to_string(),
            "0".to_string(),
            "-c".to_string(),
            "copy".to_string(),
        ];

        let mut push = |key: &str, value: &str| {
            args.push("-metadata".to_string());
            args.push(format!("{key}={value}"));
        };
        if let Some(title) = &tags.title {
            push("title", title);
        }
        if let Some(channel) = &tags.channel {
            push("artist", channel);
        }
        if let Some(id) = &tags.id {
            push("comment", id);
        }
        if let Some(at) = tags.acquired_at {
            push(
                "creation_time",
                &at.to_rfc3339_opts(SecondsFormat::Secs, true),
            );
        }

        args.push(output.to_string_lossy().into_owned());
        args
    }

    /// Map ffprobe's format tags (keys in any case) to our tags.
    fn tags_from_probe(raw: HashMap<String, String>) -> Option<ItemTags> {
        let tags: HashMap<String, String> = raw
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();

        let non_empty = |key: &str| tags.get(key).filter(|v| !v.trim().is_empty()).cloned();
        let item = ItemTags {
            id: non_empty("comment"),
            title: non_empty("title"),
            channel: non_empty("artist"),
            acquired_at: tags
                .get("creation_time")
                .and_then(|v| DateTime::parse_from_rfc3339(v.trim()).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        };

        if item == ItemTags::default() {
            None
        } else {
            Some(item)
        }
    }
}

#[async_trait]
impl MediaTagger for FfmpegTagger {
    async fn embed(&self, path: &Path, tags: &ItemTags) -> Result<()> {
        let tmp = Self::temp_path(path);
        let args = Self::embed_args(path, &tmp, tags);
        debug!(path = %path.display(), "Embedding tags");

        let output = tokio_command(&self.ffmpeg_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::process(format!("failed to spawn ffmpeg: {e}")))?;

        if !output.status.success() {
            let _ = remove_file_if_exists(&tmp).await;
            return Err(Error::process(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            )));
        }

        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| io_error("replacing", path, e))
    }

    async fn read(&self, path: &Path) -> Result<Option<ItemTags>> {
        let output = tokio_command(&self.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::process(format!("failed to spawn ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(Error::process(format!(
                "ffprobe exited with {} for {}",
                output.status,
                path.display()
            )));
        }

        let probe: ProbeOutput = serde_json::from_slice(&output.stdout)?;
        Ok(probe
            .format
            .and_then(|f| Self::tags_from_probe(f.tags)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_temp_path_keeps_extension() {
        let tmp = FfmpegTagger::temp_path(Path::new("/v/Chan/Episode 1.mp4"));
        assert_eq!(tmp, PathBuf::from("/v/Chan/Episode 1.tagging.mp4"));
    }

    #[test]
    fn test_embed_args() {
        let at = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
        let tags = ItemTags {
            id: Some("abc".to_string()),
            title: Some("Title".to_string()),
            channel: Some("Chan".to_string()),
            acquired_at: Some(at),
        };
        let args = FfmpegTagger::embed_args(Path::new("in.mp4"), Path::new("out.mp4"), &tags);
        assert!(args.contains(&"comment=abc".to_string()));
        assert!(args.contains(&"artist=Chan".to_string()));
        assert!(args.contains(&"creation_time=2024-02-03T04:05:06Z".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_tags_from_probe() {
        let json = r#"{"format":{"filename":"x.mp4","tags":{"COMMENT":"abc","title":"T","creation_time":"2024-02-03T04:05:06.000000Z"}}}"#;
        let probe: ProbeOutput = serde_json::from_str(json).unwrap();
        let tags = FfmpegTagger::tags_from_probe(probe.format.unwrap().tags).unwrap();
        assert_eq!(tags.id.as_deref(), Some("abc"));
        assert_eq!(tags.channel, None);
        assert_eq!(
            tags.acquired_at,
            Some(Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap())
        );

        assert!(FfmpegTagger::tags_from_probe(HashMap::new()).is_none());
    }
}
