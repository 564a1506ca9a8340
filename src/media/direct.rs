use super::{
    error::MediaError,
    types::{ByteStream, ProbeResult},
};
use futures::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderName, CONTENT_LENGTH, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// An origin GET whose headers have arrived but whose body has not been read.
pub struct DirectResponse {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

/// Plain HTTP access to direct links.
#[derive(Clone)]
pub struct DirectClient {
    http: reqwest::Client,
    probe_timeout: Duration,
    connect_timeout: Duration,
}

impl DirectClient {
    pub fn new(probe_timeout: Duration, connect_timeout: Duration) -> Result<Self, MediaError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| MediaError::upstream(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            probe_timeout,
            connect_timeout,
        })
    }

    /// HEAD request; missing headers come back as `None`.
    pub async fn probe(&self, url: &Url) -> Result<ProbeResult, MediaError> {
        debug!("Probing direct link: {}", url);

        let response = self
            .http
            .head(url.clone())
            .timeout(self.probe_timeout)
            .send()
            .await?
            .error_for_status()?;

        Ok(ProbeResult {
            content_type: header_str(response.headers(), CONTENT_TYPE),
            content_length: header_str(response.headers(), CONTENT_LENGTH)
                .and_then(|v| v.parse().ok()),
        })
    }

    /// Streaming GET. Only establishing the response is time-limited; the
    /// body is read without a deadline.
    pub async fn open(&self, url: &Url) -> Result<DirectResponse, MediaError> {
        debug!("Opening direct link: {}", url);

        let response = tokio::time::timeout(self.connect_timeout, self.http.get(url.clone()).send())
            .await
            .map_err(|_| MediaError::upstream("origin did not respond in time"))??
            .error_for_status()?;

        let content_type = header_str(response.headers(), CONTENT_TYPE);
        let content_length = response.content_length();
        let body = response.bytes_stream().map_err(MediaError::from);

        Ok(DirectResponse {
            content_type,
            content_length,
            body: Box::pin(body),
        })
    }
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::testing::{spawn_origin, DRIP_LEN};
    use futures::StreamExt;
    use std::time::Instant;

    fn client() -> DirectClient {
        DirectClient::new(Duration::from_secs(5), Duration::from_secs(30)).unwrap()
    }

    #[tokio::test]
    async fn test_probe_reads_headers() {
        let origin = spawn_origin().await;
        let probe = client().probe(&origin.url("/image.png")).await.unwrap();
        assert_eq!(probe.content_type.as_deref(), Some("image/png"));
        assert_eq!(probe.content_length, Some(1_048_576));
    }

    #[tokio::test]
    async fn test_probe_missing_content_type() {
        let origin = spawn_origin().await;
        let probe = client().probe(&origin.url("/untyped")).await.unwrap();
        assert_eq!(probe.content_type, None);
    }

    #[tokio::test]
    async fn test_probe_error_status() {
        let origin = spawn_origin().await;
        let err = client().probe(&origin.url("/missing")).await.unwrap_err();
        assert!(matches!(err, MediaError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_probe_connection_refused() {
        let url = Url::parse("http://127.0.0.1:1/file.bin").unwrap();
        let err = client().probe(&url).await.unwrap_err();
        assert!(matches!(err, MediaError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_open_streams_body() {
        let origin = spawn_origin().await;
        let response = client().open(&origin.url("/files/report.pdf")).await.unwrap();
        assert_eq!(response.content_type.as_deref(), Some("application/pdf"));

        let body: Vec<u8> = response
            .body
            .map(|chunk| chunk.unwrap().to_vec())
            .concat()
            .await;
        assert_eq!(body, b"%PDF-1.4 report");
    }

    #[tokio::test]
    async fn test_probe_times_out() {
        let origin = spawn_origin().await;
        let client =
            DirectClient::new(Duration::from_millis(200), Duration::from_secs(30)).unwrap();

        let started = Instant::now();
        let err = client.probe(&origin.url("/hang")).await.unwrap_err();
        assert!(matches!(err, MediaError::UpstreamUnavailable(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_open_times_out_while_establishing() {
        let origin = spawn_origin().await;
        let client =
            DirectClient::new(Duration::from_secs(5), Duration::from_millis(200)).unwrap();

        let started = Instant::now();
        let result = client.open(&origin.url("/hang")).await;
        assert!(matches!(result, Err(MediaError::UpstreamUnavailable(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_open_body_has_no_deadline() {
        let origin = spawn_origin().await;
        let client =
            DirectClient::new(Duration::from_millis(200), Duration::from_millis(200)).unwrap();
        let response = client.open(&origin.url("/drip.bin")).await.unwrap();

        let mut total = 0;
        let mut body = response.body;
        while let Some(chunk) = body.next().await {
            total += chunk.unwrap().len();
        }
        assert_eq!(total, DRIP_LEN);
    }

    #[tokio::test]
    async fn test_open_error_status() {
        let origin = spawn_origin().await;
        let result = client().open(&origin.url("/missing")).await;
        assert!(matches!(result, Err(MediaError::UpstreamUnavailable(_))));
    }
}
