use super::{
    error::MediaError,
    types::{ByteStream, PlatformMetadata, StreamOptions},
};
use async_trait::async_trait;
use url::Url;

/// Capability the core needs from a streaming-platform extraction backend.
#[async_trait]
pub trait PlatformExtractor: Send + Sync {
    /// Human-readable name of the extractor
    fn name(&self) -> &'static str;

    /// Whether `url` references a single video this extractor can resolve
    fn is_platform_url(&self, url: &Url) -> bool;

    /// Fetch title, author, duration and the available encodings
    async fn fetch_metadata(&self, url: &Url) -> Result<PlatformMetadata, MediaError>;

    /// Open the media bytes for `url` filtered by `options`
    async fn open_media_stream(
        &self,
        url: &Url,
        options: &StreamOptions,
    ) -> Result<ByteStream, MediaError>;

    /// Test if the backing tool is usable on this system
    async fn check_availability(&self) -> bool {
        true
    }
}

/// Rejects platform URLs that do not point at a single video, before any I/O.
pub fn ensure_video_reference(
    extractor: &dyn PlatformExtractor,
    url: &Url,
) -> Result<(), MediaError> {
    if extractor.is_platform_url(url) {
        Ok(())
    } else {
        Err(MediaError::invalid_url(format!(
            "{url} is not a video {} can resolve",
            extractor.name()
        )))
    }
}
