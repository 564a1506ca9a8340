use super::classifier::Platform;
use super::error::MediaError;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Origin bytes as they arrive, chunk by chunk.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, MediaError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaSource {
    YouTube,
    Direct,
}

impl From<Platform> for MediaSource {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::YouTube => MediaSource::YouTube,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatInfo {
    pub quality: Option<String>,
    pub container: Option<String>,
    pub has_audio: bool,
    pub has_video: bool,
    pub format_id: String,
}

/// What a platform extractor knows about a video.
#[derive(Debug, Clone, Default)]
pub struct PlatformMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration_seconds: Option<u64>,
    pub thumbnail_url: Option<String>,
    pub author: Option<String>,
    pub formats: Vec<FormatInfo>,
}

/// Response body of `/api/download/info`.
///
/// `platform` names the source rather than the category: platform videos
/// serialize as the platform itself (`"youtube"`), direct links as `"direct"`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub platform: MediaSource,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub duration_seconds: Option<u64>,
    pub thumbnail_url: Option<String>,
    pub content_type: Option<String>,
    pub size_bytes: Option<u64>,
    pub filename: String,
    pub formats: Vec<FormatInfo>,
}

impl MediaInfo {
    pub fn from_platform(
        platform: Platform,
        url: &url::Url,
        metadata: PlatformMetadata,
        filename: String,
    ) -> Self {
        Self {
            platform: platform.into(),
            url: url.to_string(),
            title: metadata.title,
            description: metadata.description,
            author: metadata.author,
            duration_seconds: metadata.duration_seconds,
            thumbnail_url: metadata.thumbnail_url,
            content_type: None,
            size_bytes: None,
            filename,
            formats: metadata.formats,
        }
    }

    pub fn from_probe(url: &url::Url, probe: ProbeResult, filename: String) -> Self {
        Self {
            platform: MediaSource::Direct,
            url: url.to_string(),
            title: None,
            description: None,
            author: None,
            duration_seconds: None,
            thumbnail_url: None,
            content_type: probe.content_type,
            size_bytes: probe.content_length,
            filename,
            formats: Vec::new(),
        }
    }
}

/// Headers of interest from a successful HEAD against a direct link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

fn default_quality() -> String {
    "highest".to_string()
}

fn default_format() -> String {
    "mp4".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_quality")]
    pub quality: String,
    #[serde(default = "default_format")]
    pub format: String,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            quality: default_quality(),
            format: default_format(),
        }
    }

    pub fn is_audio_only(&self) -> bool {
        self.format.eq_ignore_ascii_case("mp3")
    }
}

/// Options handed to the extractor when opening a platform stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    pub quality: String,
    pub audio_only: bool,
}
