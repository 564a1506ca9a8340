use super::{
    classifier::{classify, Category, ClassifiedUrl},
    direct::DirectClient,
    error::MediaError,
    extractor::{ensure_video_reference, PlatformExtractor},
    filename::{filename_from_url, platform_filename},
    types::{ByteStream, DownloadRequest, StreamOptions},
};
use crate::utils::human_bytes;
use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use tracing::{debug, error, info, warn};
use url::Url;

/// Platform streams are always labelled as MP4, whatever container was asked for.
pub const PLATFORM_CONTENT_TYPE: &str = "video/mp4";
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Lifecycle of one proxied transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    OriginConnecting,
    OriginConnected,
    Streaming,
    Completed,
    Failed,
    Interrupted,
}

impl TransferState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransferState::Completed | TransferState::Failed | TransferState::Interrupted
        )
    }

    pub fn can_advance_to(self, next: TransferState) -> bool {
        use TransferState::*;
        matches!(
            (self, next),
            (Idle, OriginConnecting)
                | (OriginConnecting, OriginConnected)
                | (OriginConnecting, Failed)
                | (OriginConnected, Streaming)
                | (Streaming, Completed)
                | (Streaming, Interrupted)
        )
    }
}

struct Transfer {
    url: Url,
    state: TransferState,
}

impl Transfer {
    fn new(url: Url) -> Self {
        Self {
            url,
            state: TransferState::Idle,
        }
    }

    fn advance(&mut self, next: TransferState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transfer transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("Transfer {}: {:?} -> {:?}", self.url, self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: &MediaError) {
        warn!("Origin for {} failed before streaming: {}", self.url, err);
        self.advance(TransferState::Failed);
    }
}

/// A download ready to be sent: response headers plus the relayed body.
pub struct ProxiedDownload {
    pub filename: String,
    pub content_type: String,
    pub body: RelayStream,
}

/// Forwards origin chunks one at a time.
///
/// An origin error after streaming began surfaces as
/// [`MediaError::StreamInterrupted`] so the HTTP layer aborts the response
/// instead of ending it cleanly. Dropping the stream early (client went away)
/// drops the origin with it.
pub struct RelayStream {
    transfer: Transfer,
    origin: ByteStream,
    pending: Option<Bytes>,
    bytes_sent: u64,
}

impl RelayStream {
    fn new(transfer: Transfer, origin: ByteStream, first: Option<Bytes>) -> Self {
        Self {
            transfer,
            origin,
            pending: first,
            bytes_sent: 0,
        }
    }
}

impl Stream for RelayStream {
    type Item = Result<Bytes, MediaError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(chunk) = this.pending.take() {
            this.bytes_sent += chunk.len() as u64;
            return Poll::Ready(Some(Ok(chunk)));
        }

        if this.transfer.state.is_terminal() {
            return Poll::Ready(None);
        }

        match this.origin.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes_sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                this.transfer.advance(TransferState::Interrupted);
                error!(
                    "Stream from {} interrupted after {}: {}",
                    this.transfer.url,
                    human_bytes(this.bytes_sent),
                    err
                );
                Poll::Ready(Some(Err(MediaError::StreamInterrupted {
                    bytes_sent: this.bytes_sent,
                    reason: err.to_string(),
                })))
            }
            Poll::Ready(None) => {
                this.transfer.advance(TransferState::Completed);
                info!(
                    "Relayed {} from {}",
                    human_bytes(this.bytes_sent),
                    this.transfer.url
                );
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        if self.transfer.state == TransferState::Streaming {
            warn!(
                "Client disconnected from {} after {}, closing origin",
                self.transfer.url,
                human_bytes(self.bytes_sent)
            );
        }
    }
}

struct OpenedOrigin {
    filename: String,
    content_type: String,
    body: ByteStream,
    /// Limit on the wait for the first chunk; `None` waits as long as the origin takes.
    first_chunk_timeout: Option<Duration>,
}

/// Opens origin streams and wraps them for relaying to the client.
#[derive(Clone)]
pub struct StreamProxy {
    extractor: Arc<dyn PlatformExtractor>,
    direct: DirectClient,
    first_byte_timeout: Duration,
}

impl StreamProxy {
    pub fn new(
        extractor: Arc<dyn PlatformExtractor>,
        direct: DirectClient,
        first_byte_timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            direct,
            first_byte_timeout,
        }
    }

    /// Opens the origin and waits for its first chunk, so that any failure up
    /// to that point is reported as an error rather than a broken body.
    ///
    /// Direct links are only time-limited while the response is being
    /// established; once headers are in, the first chunk is awaited without a
    /// deadline. Platform streams get `first_byte_timeout` for their first chunk.
    pub async fn open_stream(
        &self,
        request: &DownloadRequest,
    ) -> Result<ProxiedDownload, MediaError> {
        let ClassifiedUrl { url, category } = classify(&request.url)?;
        let mut transfer = Transfer::new(url.clone());
        transfer.advance(TransferState::OriginConnecting);

        let opened = match category {
            Category::PlatformVideo(_) => self.open_platform(&url, request).await,
            Category::DirectLink => self.open_direct(&url).await,
        };
        let OpenedOrigin {
            filename,
            content_type,
            mut body,
            first_chunk_timeout,
        } = match opened {
            Ok(opened) => opened,
            Err(err) => {
                transfer.fail(&err);
                return Err(err);
            }
        };

        let polled = match first_chunk_timeout {
            Some(limit) => tokio::time::timeout(limit, body.next()).await,
            None => Ok(body.next().await),
        };
        let first = match polled {
            Ok(Some(Ok(chunk))) => Some(chunk),
            Ok(None) => {
                body = Box::pin(stream::empty());
                None
            }
            Ok(Some(Err(err))) => {
                let err = match err {
                    MediaError::StreamInterrupted { reason, .. } => {
                        MediaError::UpstreamUnavailable(reason)
                    }
                    other => other,
                };
                transfer.fail(&err);
                return Err(err);
            }
            Err(_) => {
                let err = MediaError::upstream("origin sent no data in time");
                transfer.fail(&err);
                return Err(err);
            }
        };

        transfer.advance(TransferState::OriginConnected);
        transfer.advance(TransferState::Streaming);
        info!("Streaming {} as '{}' ({})", url, filename, content_type);

        Ok(ProxiedDownload {
            filename,
            content_type,
            body: RelayStream::new(transfer, body, first),
        })
    }

    async fn open_platform(
        &self,
        url: &Url,
        request: &DownloadRequest,
    ) -> Result<OpenedOrigin, MediaError> {
        ensure_video_reference(self.extractor.as_ref(), url)?;

        let metadata = self.extractor.fetch_metadata(url).await?;
        let options = StreamOptions {
            quality: request.quality.clone(),
            audio_only: request.is_audio_only(),
        };
        let body = self.extractor.open_media_stream(url, &options).await?;

        Ok(OpenedOrigin {
            filename: platform_filename(metadata.title.as_deref(), &request.format),
            content_type: PLATFORM_CONTENT_TYPE.to_string(),
            body,
            first_chunk_timeout: Some(self.first_byte_timeout),
        })
    }

    async fn open_direct(&self, url: &Url) -> Result<OpenedOrigin, MediaError> {
        let response = self.direct.open(url).await?;
        debug!(
            "Origin {} announced {:?} bytes of {:?}",
            url, response.content_length, response.content_type
        );

        Ok(OpenedOrigin {
            filename: filename_from_url(url),
            content_type: response
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            body: response.body,
            first_chunk_timeout: None,
        })
    }
}
