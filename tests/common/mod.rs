#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use avif2webp::{Codec, ConversionError, Error, Pipeline, Server, TempStore, app};
use bytes::Bytes;
use image::codecs::avif::AvifEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const BOUNDARY: &str = "----avif2webp-test-boundary";

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

/// One multipart part: field name, optional filename, optional content type, data.
pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub data: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn image(filename: &'a str, data: &'a [u8]) -> Self {
        Self { name: "image", filename: Some(filename), content_type: Some("image/avif"), data }
    }

    pub fn with_type(mut self, content_type: &'a str) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn named(mut self, name: &'a str) -> Self {
        self.name = name;
        self
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Bytes {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        out.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"", part.name).as_bytes());
        if let Some(filename) = part.filename {
            out.extend_from_slice(format!("; filename=\"{filename}\"").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        if let Some(content_type) = part.content_type {
            out.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(part.data);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    out.into()
}

/// Fake codec: prefixes the input with `WEBP:` and counts calls.
#[derive(Default)]
pub struct CountingCodec {
    calls: AtomicUsize,
}

impl CountingCodec {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Codec for CountingCodec {
    fn convert(&self, input: &[u8]) -> Result<Vec<u8>, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut out = b"WEBP:".to_vec();
        out.extend_from_slice(input);
        Ok(out)
    }
}

/// Fake codec that always fails.
pub struct FailingCodec;

impl Codec for FailingCodec {
    fn convert(&self, _input: &[u8]) -> Result<Vec<u8>, ConversionError> {
        Err(ConversionError::codec("corrupt AV1 bitstream"))
    }
}

pub fn sandbox() -> (tempfile::TempDir, TempStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = TempStore::new(dir.path().join("uploads")).unwrap();
    (dir, store)
}

pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

/// A small AVIF with a gradient, so different sizes give different pixels.
pub fn avif_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 96])
    });
    let mut out = Vec::new();
    AvifEncoder::new_with_speed_quality(&mut out, 10, 80)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

// ── Live server helpers ───────────────────────────────────────────────────────

pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), Error>>,
}

impl TestServer {
    pub async fn start(pipeline: Arc<Pipeline>, cors: bool) -> Self {
        let server = Server::bind(SocketAddr::from(([127, 0, 0, 1], 0))).cors(cors);
        Self::start_with(pipeline, server).await
    }

    /// Serves `pipeline` with a preconfigured `server` on an ephemeral port.
    /// The server's own bind address is ignored.
    pub async fn start_with(pipeline: Arc<Pipeline>, server: Server) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve_on(
            listener,
            app::router(pipeline),
            async move {
                let _ = rx.await;
            },
        ));
        Self { addr, shutdown: Some(tx), handle }
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap().unwrap();
    }
}

pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Sends one HTTP/1.1 request with `Connection: close` and reads the whole reply.
pub async fn send(addr: SocketAddr, method: &str, path: &str, headers: &[(&str, &str)], body: &[u8]) -> RawResponse {
    let length = body.len().to_string();
    let mut all = vec![("content-length", length.as_str())];
    all.extend_from_slice(headers);
    send_raw(addr, method, path, &all, body).await
}

/// Like [`send`], but writes `headers` verbatim, so `content-length` may
/// disagree with `body`.
pub async fn send_raw(addr: SocketAddr, method: &str, path: &str, headers: &[(&str, &str)], body: &[u8]) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut head = format!("{method} {path} HTTP/1.1\r\nhost: {addr}\r\nconnection: close\r\n");
    for (name, value) in headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes()).await.unwrap();
    stream.write_all(body).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();

    let split = raw.windows(4).position(|w| w == b"\r\n\r\n").expect("response head");
    let head = std::str::from_utf8(&raw[..split]).unwrap();
    let mut lines = head.split("\r\n");
    let status = lines.next().unwrap().split(' ').nth(1).unwrap().parse().unwrap();
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_owned(), v.trim().to_owned()))
        .collect();
    RawResponse { status, headers, body: raw[split + 4..].to_vec() }
}
