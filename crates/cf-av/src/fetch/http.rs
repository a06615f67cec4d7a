//! Direct media URLs streamed over HTTP.

use std::path::Path;

use async_trait::async_trait;
use cf_core::OutputKind;
use futures::StreamExt;
use reqwest::{header, Client, Response};
use tokio::io::AsyncWriteExt;

use super::{remove_partials, FetchResult, Fetcher};
use crate::workspace::Workspace;

/// Extensions accepted verbatim from the URL path.
const MEDIA_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "mkv", "m4a", "mp3", "ogg", "wav", "gif"];

/// A [`Fetcher`] that downloads a URL as-is with `reqwest`.
///
/// The ceiling is enforced twice: against the declared `Content-Length`
/// before any body is read, and against a running byte count while
/// streaming, so servers that lie or omit the header are still cut off.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    workspace: Workspace,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(workspace: Workspace, max_bytes: u64) -> cf_core::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("clipforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| cf_core::Error::tool("http", format!("failed to build client: {e}")))?;
        Ok(Self {
            client,
            workspace,
            max_bytes,
        })
    }

    async fn download(&self, url: &str, kind: OutputKind, desired_name: &str) -> cf_core::Result<FetchResult> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| cf_core::Error::unavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(cf_core::Error::unavailable(format!("HTTP {status} from {url}")));
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes {
                return Err(cf_core::Error::SourceTooLarge {
                    limit_bytes: self.max_bytes,
                    detail: format!("declared Content-Length {declared} bytes"),
                });
            }
        }

        let ext = pick_extension(&response, kind);
        let path = self.workspace.source_path(desired_name, ext);
        let written = self.stream_to_file(response, &path).await?;
        tracing::info!("fetched {} ({written} bytes)", path.display());
        Ok(FetchResult::new(path))
    }

    async fn stream_to_file(&self, response: Response, path: &Path) -> cf_core::Result<u64> {
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| cf_core::Error::io(path, e))?;
        let mut budget = ByteBudget::new(self.max_bytes);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let data = chunk.map_err(|e| cf_core::Error::unavailable(format!("transfer interrupted: {e}")))?;
            budget.take(data.len() as u64)?;
            file.write_all(&data)
                .await
                .map_err(|e| cf_core::Error::io(path, e))?;
        }
        file.flush().await.map_err(|e| cf_core::Error::io(path, e))?;

        if budget.received == 0 {
            return Err(cf_core::Error::unavailable("server returned an empty body"));
        }
        Ok(budget.received)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(
        &self,
        url: &str,
        kind: OutputKind,
        desired_name: &str,
    ) -> cf_core::Result<FetchResult> {
        tracing::info!("fetching {url} over HTTP as {desired_name}");
        let result = self.download(url, kind, desired_name).await;
        if result.is_err() {
            remove_partials(self.workspace.root(), desired_name);
        }
        result
    }
}

/// Running byte counter against the source ceiling.
#[derive(Debug)]
struct ByteBudget {
    limit: u64,
    received: u64,
}

impl ByteBudget {
    fn new(limit: u64) -> Self {
        Self { limit, received: 0 }
    }

    fn take(&mut self, n: u64) -> cf_core::Result<()> {
        self.received = self.received.saturating_add(n);
        if self.received > self.limit {
            return Err(cf_core::Error::SourceTooLarge {
                limit_bytes: self.limit,
                detail: format!("transfer exceeded the limit after {} bytes", self.received),
            });
        }
        Ok(())
    }
}

/// URL path extension, then Content-Type, then a default per kind.
fn pick_extension(response: &Response, kind: OutputKind) -> &'static str {
    let from_path = response
        .url()
        .path_segments()
        .and_then(|segments| segments.last())
        .and_then(|last| last.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .and_then(|ext| MEDIA_EXTENSIONS.iter().find(|known| **known == ext).copied());
    if let Some(ext) = from_path {
        return ext;
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    extension_for_mime(content_type).unwrap_or(if kind.is_visual() { "mp4" } else { "mp3" })
}

fn extension_for_mime(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    match mime.as_str() {
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/quicktime" => Some("mov"),
        "video/x-matroska" => Some("mkv"),
        "audio/mpeg" => Some("mp3"),
        "audio/mp4" => Some("m4a"),
        "audio/ogg" => Some("ogg"),
        "audio/wav" | "audio/x-wav" => Some("wav"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}
