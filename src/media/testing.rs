//! Test doubles: a throwaway origin server and a scripted platform extractor.

use super::{
    error::MediaError,
    extractor::PlatformExtractor,
    types::{ByteStream, FormatInfo, PlatformMetadata, StreamOptions},
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use futures::{stream, StreamExt};
use std::{
    io,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use url::Url;

pub const MIB: usize = 1024 * 1024;
const CHUNK: usize = 64 * 1024;
const DRIP_CHUNKS: usize = 3;
const DRIP_GAP: Duration = Duration::from_millis(300);
/// Bytes served by `/drip.bin`.
pub const DRIP_LEN: usize = DRIP_CHUNKS * CHUNK;

pub struct Origin {
    base: Url,
    /// Set once the `/endless.bin` body has been dropped by the origin server.
    pub released: Arc<AtomicBool>,
}

impl Origin {
    pub fn url(&self, path: &str) -> Url {
        self.base.join(path).unwrap()
    }
}

fn chunked(total: usize) -> impl futures::Stream<Item = Result<Bytes, io::Error>> + Send {
    stream::iter((0..total).step_by(CHUNK).map(move |offset| {
        let len = CHUNK.min(total - offset);
        Ok(Bytes::from(vec![0xAB; len]))
    }))
}

async fn flaky() -> Response {
    let failure = stream::once(async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "origin went away"))
    });
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(chunked(2 * MIB).chain(failure)),
    )
        .into_response()
}

/// Headers at once, then each chunk after a pause.
async fn drip() -> Response {
    let body = stream::iter(0..DRIP_CHUNKS).then(|_| async {
        tokio::time::sleep(DRIP_GAP).await;
        Ok::<_, io::Error>(Bytes::from(vec![0xEF; CHUNK]))
    });
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(body),
    )
        .into_response()
}

fn endless(released: Arc<AtomicBool>) -> Response {
    let guard = DropFlag(released);
    let body = stream::repeat_with(|| Ok::<_, io::Error>(Bytes::from(vec![0xCD; CHUNK])))
        .map(move |chunk| {
            let _guard = &guard;
            chunk
        });
    Response::new(Body::from_stream(body))
}

/// Serves a handful of fixed resources on an ephemeral localhost port.
pub async fn spawn_origin() -> Origin {
    let released = Arc::new(AtomicBool::new(false));
    let flag = released.clone();

    let app = Router::new()
        .route(
            "/image.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], vec![0u8; MIB]) }),
        )
        .route(
            "/files/report.pdf",
            get(|| async { ([(header::CONTENT_TYPE, "application/pdf")], "%PDF-1.4 report") }),
        )
        .route("/untyped", get(|| async { Response::new(Body::from("raw bytes")) }))
        .route(
            "/large.bin",
            get(|| async { Response::new(Body::from_stream(chunked(10 * MIB))) }),
        )
        .route("/flaky.bin", get(flaky))
        .route("/drip.bin", get(drip))
        .route(
            "/endless.bin",
            get(move || {
                let flag = flag.clone();
                async move { endless(flag) }
            }),
        )
        .route(
            "/hang",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                "too late"
            }),
        )
        .route("/empty.txt", get(|| async { ([(header::CONTENT_TYPE, "text/plain")], "") }))
        .route(
            "/broken",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream exploded") }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Origin {
        base: Url::parse(&format!("http://{addr}/")).unwrap(),
        released,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeBehavior {
    Healthy,
    NotAVideo,
    MetadataUnavailable,
    FailsBeforeBytes,
    FailsMidStream,
}

/// Scripted extractor that records calls and notices when its stream is dropped.
pub struct FakeExtractor {
    pub behavior: FakeBehavior,
    pub title: Option<String>,
    pub payload_len: usize,
    pub last_options: Mutex<Option<StreamOptions>>,
    pub calls: AtomicUsize,
    pub stream_dropped: Arc<AtomicBool>,
}

impl FakeExtractor {
    pub fn new(behavior: FakeBehavior) -> Self {
        Self {
            behavior,
            title: Some("Test Video".to_string()),
            payload_len: MIB,
            last_options: Mutex::new(None),
            calls: AtomicUsize::new(0),
            stream_dropped: Arc::new(AtomicBool::new(false)),
        }
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PlatformExtractor for FakeExtractor {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn is_platform_url(&self, _url: &Url) -> bool {
        self.behavior != FakeBehavior::NotAVideo
    }

    async fn fetch_metadata(&self, _url: &Url) -> Result<PlatformMetadata, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.behavior == FakeBehavior::MetadataUnavailable {
            return Err(MediaError::upstream("platform timed out"));
        }

        Ok(PlatformMetadata {
            title: self.title.clone(),
            description: Some("A test video".to_string()),
            duration_seconds: Some(120),
            thumbnail_url: Some("https://img.example/thumb.jpg".to_string()),
            author: Some("Test Channel".to_string()),
            formats: vec![
                FormatInfo {
                    quality: Some("720p".to_string()),
                    container: Some("mp4".to_string()),
                    has_audio: true,
                    has_video: true,
                    format_id: "22".to_string(),
                },
                FormatInfo {
                    quality: Some("medium".to_string()),
                    container: Some("m4a".to_string()),
                    has_audio: true,
                    has_video: false,
                    format_id: "140".to_string(),
                },
            ],
        })
    }

    async fn open_media_stream(
        &self,
        _url: &Url,
        options: &StreamOptions,
    ) -> Result<ByteStream, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options.clone());

        let guard = DropFlag(self.stream_dropped.clone());
        let body = chunked(self.payload_len)
            .map(|chunk| chunk.map_err(|e| MediaError::upstream(e.to_string())));

        let stream: ByteStream = match self.behavior {
            FakeBehavior::FailsBeforeBytes => Box::pin(stream::once(async {
                Err::<Bytes, _>(MediaError::upstream("no playable formats"))
            })),
            FakeBehavior::FailsMidStream => Box::pin(body.chain(stream::once(async {
                Err(MediaError::upstream("connection reset"))
            }))),
            _ => Box::pin(body),
        };

        Ok(Box::pin(stream.map(move |item| {
            let _guard = &guard;
            item
        })))
    }
}
