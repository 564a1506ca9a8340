use super::error::MediaError;
use url::Url;

/// Streaming platforms that need an extractor instead of a plain fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    YouTube,
}

impl Platform {
    pub const ALL: &'static [Platform] = &[Platform::YouTube];

    /// Registrable domains owned by the platform, including short-link hosts.
    pub fn domains(self) -> &'static [&'static str] {
        match self {
            Platform::YouTube => &["youtube.com", "youtu.be", "youtube-nocookie.com"],
        }
    }

    pub fn matches_host(self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.domains().iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    fn from_host(host: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.matches_host(host))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    PlatformVideo(Platform),
    DirectLink,
}

/// A URL that passed validation, together with how it should be fetched.
#[derive(Debug, Clone)]
pub struct ClassifiedUrl {
    pub url: Url,
    pub category: Category,
}

/// Parses `raw` as an absolute http(s) URL.
pub fn parse_url(raw: &str) -> Result<Url, MediaError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(MediaError::invalid_url("URL is empty"));
    }

    let url = Url::parse(raw).map_err(|e| MediaError::invalid_url(format!("{raw}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(MediaError::invalid_url(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(MediaError::invalid_url(format!("{raw}: missing host")));
    }

    Ok(url)
}

pub fn category_of(url: &Url) -> Category {
    url.host_str()
        .and_then(Platform::from_host)
        .map(Category::PlatformVideo)
        .unwrap_or(Category::DirectLink)
}

pub fn classify(raw: &str) -> Result<ClassifiedUrl, MediaError> {
    let url = parse_url(raw)?;
    let category = category_of(&url);
    Ok(ClassifiedUrl { url, category })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(raw: &str) -> Category {
        classify(raw).unwrap().category
    }

    #[test]
    fn test_platform_hosts() {
        for raw in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/shorts/abc123",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://music.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ",
            "http://WWW.YOUTUBE.COM/watch?v=x",
        ] {
            assert_eq!(
                category(raw),
                Category::PlatformVideo(Platform::YouTube),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_direct_links() {
        for raw in [
            "https://example.com/files/report.pdf",
            "https://notyoutube.com/watch?v=abc",
            "https://youtube.com.evil.example/video.mp4",
            "https://example.com/redirect?to=https://youtube.com/watch?v=abc",
            "https://cdn.example.org/youtube.com/clip.mp4",
        ] {
            assert_eq!(category(raw), Category::DirectLink, "{raw}");
        }
    }

    #[test]
    fn test_platform_wins_over_file_look() {
        assert_eq!(
            category("https://www.youtube.com/video.mp4"),
            Category::PlatformVideo(Platform::YouTube)
        );
    }

    #[test]
    fn test_invalid_urls() {
        for raw in [
            "",
            "   ",
            "not a url",
            "/relative/path.mp4",
            "example.com/file.zip",
            "ftp://example.com/file.zip",
            "file:///etc/passwd",
            "mailto:someone@example.com",
            "http://",
        ] {
            assert!(
                matches!(classify(raw), Err(MediaError::InvalidUrl(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_trailing_dot_host() {
        assert!(Platform::YouTube.matches_host("youtube.com."));
        assert!(!Platform::YouTube.matches_host("myyoutube.com"));
    }
}
