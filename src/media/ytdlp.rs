use super::{
    classifier::Platform,
    error::MediaError,
    extractor::PlatformExtractor,
    types::{ByteStream, FormatInfo, PlatformMetadata, StreamOptions},
};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use serde_json::Value;
use std::{process::Stdio, time::Duration};
use tokio::{
    io::AsyncReadExt,
    process::{Child, ChildStdout, Command},
    task::JoinHandle,
};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use url::Url;

/// Phrases yt-dlp prints when the URL itself cannot be resolved to a video.
const INVALID_VIDEO_MARKERS: &[&str] = &[
    "is not a valid url",
    "unsupported url",
    "video unavailable",
    "incomplete youtube id",
    "private video",
    "this video has been removed",
    "does not exist",
];

pub struct YtDlpExtractor {
    binary: String,
    timeout: Duration,
}

impl YtDlpExtractor {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

/// Extracts the 11-character video id from a YouTube URL, if any.
pub fn video_id(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    if !Platform::YouTube.matches_host(host) {
        return None;
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let candidate = if host.trim_end_matches('.').eq_ignore_ascii_case("youtu.be") {
        segments.first().map(|s| s.to_string())
    } else if let Some(v) = url.query_pairs().find(|(k, _)| k == "v") {
        Some(v.1.into_owned())
    } else {
        match segments.as_slice() {
            [kind, id, ..] if ["shorts", "embed", "live", "v"].contains(kind) => {
                Some(id.to_string())
            }
            _ => None,
        }
    };

    candidate.filter(|id| {
        id.len() == 11
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    })
}

/// yt-dlp `-f` selector for the requested quality.
pub fn format_selector(options: &StreamOptions) -> String {
    if options.audio_only {
        return "bestaudio".to_string();
    }

    let quality = options.quality.trim();
    match quality.to_ascii_lowercase().as_str() {
        "" | "highest" | "highestvideo" | "best" => "best".to_string(),
        "lowest" | "worst" => "worst".to_string(),
        q => match q.strip_suffix('p').and_then(|h| h.parse::<u32>().ok()) {
            Some(height) => format!("best[height<={height}]/best"),
            None => quality.to_string(),
        },
    }
}

fn parse_format(json: &Value) -> Option<FormatInfo> {
    let format_id = json["format_id"].as_str()?.to_string();
    let has_codec = |key: &str| json[key].as_str().is_some_and(|c| c != "none");
    let has_video = has_codec("vcodec");
    let has_audio = has_codec("acodec");

    let quality = match json["height"].as_u64() {
        Some(height) if has_video => Some(format!("{height}p")),
        _ => json["format_note"].as_str().map(|s| s.to_string()),
    };

    Some(FormatInfo {
        quality,
        container: json["ext"].as_str().map(|s| s.to_string()),
        has_audio,
        has_video,
        format_id,
    })
}

pub fn parse_metadata(json: &Value) -> PlatformMetadata {
    let formats = json["formats"]
        .as_array()
        .map(|formats| formats.iter().filter_map(parse_format).collect())
        .unwrap_or_default();

    PlatformMetadata {
        title: json["title"].as_str().map(|s| s.to_string()),
        description: json["description"].as_str().map(|s| s.to_string()),
        duration_seconds: json["duration"]
            .as_f64()
            .filter(|d| *d >= 0.0)
            .map(|d| d as u64),
        thumbnail_url: json["thumbnail"].as_str().map(|s| s.to_string()),
        author: json["uploader"]
            .as_str()
            .or(json["channel"].as_str())
            .map(|s| s.to_string()),
        formats,
    }
}

/// Maps a failed yt-dlp run to the error kind the caller should see.
pub fn failure_from_stderr(stderr: &str) -> MediaError {
    let lowered = stderr.to_ascii_lowercase();
    let detail = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("yt-dlp exited with an error")
        .trim()
        .to_string();

    if INVALID_VIDEO_MARKERS.iter().any(|m| lowered.contains(m)) {
        MediaError::InvalidUrl(detail)
    } else {
        MediaError::UpstreamUnavailable(detail)
    }
}

struct ChildOutput {
    stdout: ReaderStream<ChildStdout>,
    child: Child,
    stderr: Option<JoinHandle<String>>,
    finished: bool,
}

/// Relays a child's stdout, surfacing a non-zero exit as a final error item.
/// Dropping the stream kills the child.
fn child_stream(output: ChildOutput) -> ByteStream {
    Box::pin(stream::unfold(output, |mut state| async move {
        if state.finished {
            return None;
        }

        match state.stdout.next().await {
            Some(Ok(chunk)) => Some((Ok(chunk), state)),
            Some(Err(e)) => {
                state.finished = true;
                Some((
                    Err(MediaError::upstream(format!("reading yt-dlp output: {e}"))),
                    state,
                ))
            }
            None => {
                state.finished = true;
                let status = state.child.wait().await;
                let stderr = match state.stderr.take() {
                    Some(handle) => handle.await.unwrap_or_default(),
                    None => String::new(),
                };

                match status {
                    Ok(status) if status.success() => None,
                    Ok(status) => {
                        debug!("yt-dlp exited with {}: {}", status, stderr);
                        Some((Err(failure_from_stderr(&stderr)), state))
                    }
                    Err(e) => Some((
                        Err(MediaError::upstream(format!("waiting for yt-dlp: {e}"))),
                        state,
                    )),
                }
            }
        }
    }))
}

#[async_trait]
impl PlatformExtractor for YtDlpExtractor {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn is_platform_url(&self, url: &Url) -> bool {
        video_id(url).is_some()
    }

    async fn fetch_metadata(&self, url: &Url) -> Result<PlatformMetadata, MediaError> {
        debug!("Extracting metadata with yt-dlp for: {}", url);

        let output = tokio::time::timeout(
            self.timeout,
            self.command()
                .arg("--dump-json")
                .arg("--no-download")
                .arg("--no-playlist")
                .arg("--no-warnings")
                .arg(url.as_str())
                .output(),
        )
        .await
        .map_err(|_| MediaError::upstream("media metadata extraction timed out"))?
        .map_err(|e| MediaError::upstream(format!("failed to run {}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failure_from_stderr(&stderr));
        }

        let json: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| MediaError::upstream(format!("failed to parse media metadata: {e}")))?;

        Ok(parse_metadata(&json))
    }

    async fn open_media_stream(
        &self,
        url: &Url,
        options: &StreamOptions,
    ) -> Result<ByteStream, MediaError> {
        let selector = format_selector(options);
        info!("Streaming {} with yt-dlp format '{}'", url, selector);

        let mut child = self
            .command()
            .arg("--output")
            .arg("-")
            .arg("--format")
            .arg(&selector)
            .arg("--no-playlist")
            .arg("--no-part")
            .arg("--no-progress")
            .arg("--quiet")
            .arg("--no-warnings")
            .arg(url.as_str())
            .spawn()
            .map_err(|e| MediaError::upstream(format!("failed to spawn {}: {e}", self.binary)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::upstream("yt-dlp stdout unavailable"))?;
        let stderr = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf).await;
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        Ok(child_stream(ChildOutput {
            stdout: ReaderStream::new(stdout),
            child,
            stderr,
            finished: false,
        }))
    }

    async fn check_availability(&self) -> bool {
        match Command::new(&self.binary).arg("--version").output().await {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                info!("✅ yt-dlp is available, version: {}", version.trim());
                true
            }
            Ok(_) => {
                warn!("❌ yt-dlp command failed");
                false
            }
            Err(e) => {
                warn!("❌ yt-dlp not found: {}", e);
                false
            }
        }
    }
}
