mod classifier;
mod direct;
mod error;
mod extractor;
mod filename;
mod proxy;
mod resolver;
mod types;
mod ytdlp;

#[cfg(test)]
pub(crate) mod testing;

pub use error::MediaError;
pub use extractor::PlatformExtractor;
pub use filename::content_disposition;
pub use proxy::{ProxiedDownload, StreamProxy};
pub use resolver::MetadataResolver;
pub use types::{DownloadRequest, MediaInfo};

use crate::config::MediaSettings;
use direct::DirectClient;
use std::sync::Arc;
use tracing::{info, warn};
use ytdlp::YtDlpExtractor;

/// Entry point for the HTTP layer: metadata lookups and proxied downloads.
#[derive(Clone)]
pub struct MediaService {
    extractor: Arc<dyn PlatformExtractor>,
    resolver: MetadataResolver,
    proxy: StreamProxy,
}

impl MediaService {
    pub fn new(settings: &MediaSettings) -> Result<Self, MediaError> {
        let extractor: Arc<dyn PlatformExtractor> = Arc::new(YtDlpExtractor::new(
            settings.ytdlp_path.clone(),
            settings.extractor_timeout(),
        ));
        Self::with_extractor(extractor, settings)
    }

    pub fn with_extractor(
        extractor: Arc<dyn PlatformExtractor>,
        settings: &MediaSettings,
    ) -> Result<Self, MediaError> {
        let direct = DirectClient::new(settings.probe_timeout(), settings.connect_timeout())?;

        info!(
            "Media service initialized with {} for platform links",
            extractor.name()
        );

        Ok(Self {
            resolver: MetadataResolver::new(extractor.clone(), direct.clone()),
            proxy: StreamProxy::new(extractor.clone(), direct, settings.connect_timeout()),
            extractor,
        })
    }

    pub async fn info(&self, url: &str) -> Result<MediaInfo, MediaError> {
        self.resolver.resolve(url).await
    }

    pub async fn download(&self, request: &DownloadRequest) -> Result<ProxiedDownload, MediaError> {
        self.proxy.open_stream(request).await
    }

    /// Logs whether the platform extractor is usable; never fatal.
    pub async fn test_setup(&self) -> bool {
        info!("Testing platform extractor setup...");

        let available = self.extractor.check_availability().await;
        if !available {
            warn!(
                "{} is unavailable; platform links will fail until it is installed",
                self.extractor.name()
            );
        }
        available
    }
}
