use super::{
    classifier::{classify, Category, ClassifiedUrl, Platform},
    direct::DirectClient,
    error::MediaError,
    extractor::{ensure_video_reference, PlatformExtractor},
    filename::{filename_from_url, platform_filename},
    types::MediaInfo,
};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Builds a [`MediaInfo`] without transferring the media itself.
#[derive(Clone)]
pub struct MetadataResolver {
    extractor: Arc<dyn PlatformExtractor>,
    direct: DirectClient,
}

impl MetadataResolver {
    pub fn new(extractor: Arc<dyn PlatformExtractor>, direct: DirectClient) -> Self {
        Self { extractor, direct }
    }

    pub async fn resolve(&self, raw_url: &str) -> Result<MediaInfo, MediaError> {
        let ClassifiedUrl { url, category } = classify(raw_url)?;
        debug!("Resolving {} as {:?}", url, category);

        match category {
            Category::PlatformVideo(platform) => self.resolve_platform(platform, &url).await,
            Category::DirectLink => self.resolve_direct(&url).await,
        }
    }

    async fn resolve_platform(
        &self,
        platform: Platform,
        url: &Url,
    ) -> Result<MediaInfo, MediaError> {
        ensure_video_reference(self.extractor.as_ref(), url)?;

        let metadata = self.extractor.fetch_metadata(url).await?;
        info!(
            "Resolved {} via {}: {} formats",
            url,
            self.extractor.name(),
            metadata.formats.len()
        );

        let filename = platform_filename(metadata.title.as_deref(), "mp4");
        Ok(MediaInfo::from_platform(platform, url, metadata, filename))
    }

    async fn resolve_direct(&self, url: &Url) -> Result<MediaInfo, MediaError> {
        let probe = self.direct.probe(url).await?;
        info!(
            "Probed {}: type={:?} size={:?}",
            url, probe.content_type, probe.content_length
        );

        Ok(MediaInfo::from_probe(url, probe, filename_from_url(url)))
    }
}
