use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    /// Malformed URL, or one the platform extractor cannot resolve to a video.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The origin or platform failed before any bytes reached the client.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The origin failed after the response had already started.
    #[error("stream interrupted after {bytes_sent} bytes: {reason}")]
    StreamInterrupted { bytes_sent: u64, reason: String },
}

impl MediaError {
    pub fn invalid_url(detail: impl Into<String>) -> Self {
        Self::InvalidUrl(detail.into())
    }

    pub fn upstream(detail: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(detail.into())
    }
}

impl From<reqwest::Error> for MediaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamUnavailable(format!("origin timed out: {err}"))
        } else if let Some(status) = err.status() {
            Self::UpstreamUnavailable(format!("origin responded with {status}"))
        } else {
            Self::UpstreamUnavailable(err.to_string())
        }
    }
}
