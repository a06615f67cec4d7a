//! Remote asset acquisition under a byte ceiling.
//!
//! A [`Fetcher`] writes exactly one file, `<work_dir>/<desired_name>.<ext>`,
//! or fails leaving nothing behind that carries the desired name.
//!
//! - [`YtDlpFetcher`] resolves site pages through `yt-dlp`.
//! - [`HttpFetcher`] streams direct media URLs with `reqwest`.

pub mod http;
pub mod ytdlp;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cf_core::OutputKind;

pub use self::http::HttpFetcher;
pub use self::ytdlp::YtDlpFetcher;

/// A fetched source file and what the transport knew about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub local_path: PathBuf,
    /// Zero when the transport did not report a width.
    pub native_width: u32,
    /// Zero when the transport did not report a height.
    pub native_height: u32,
}

impl FetchResult {
    pub fn new(local_path: PathBuf) -> Self {
        Self {
            local_path,
            native_width: 0,
            native_height: 0,
        }
    }
}

/// Retrieves a remote asset into the working directory.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Human-readable name identifying this fetcher.
    fn name(&self) -> &'static str;

    /// Fetch `url` as `desired_name`, choosing a format suited to `kind`.
    ///
    /// # Errors
    ///
    /// [`cf_core::Error::SourceTooLarge`] when the asset exceeds the
    /// configured ceiling; [`cf_core::Error::SourceUnavailable`] for any
    /// other transport failure.
    async fn fetch(
        &self,
        url: &str,
        kind: OutputKind,
        desired_name: &str,
    ) -> cf_core::Result<FetchResult>;
}

/// Remove what a failed transfer for `desired_name` may have left behind.
///
/// Only names a transport writes are touched: `<name>.<ext>`, the
/// `.part`/`.ytdl` leftovers of those, format streams awaiting a merge
/// (`<name>.f137.mp4`) and the print side file. A sibling job whose name
/// merely starts with `<name>.` is left alone.
pub(crate) fn remove_partials(dir: &Path, desired_name: &str) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let matches = entry
            .file_name()
            .to_str()
            .and_then(|n| n.strip_prefix(desired_name))
            .and_then(|rest| rest.strip_prefix('.'))
            .map(is_transport_suffix)
            .unwrap_or(false);
        if !matches {
            continue;
        }
        let path = entry.path();
        if let Err(e) = crate::workspace::remove_file(&path) {
            tracing::warn!("could not remove partial download: {e}");
        } else {
            tracing::debug!("removed partial download {}", path.display());
        }
    }
}

/// `mp4`, `mp4.part`, `ytdl`, `f137.mp4`, `f251-drc.webm.part`, `temp.mp4`.
fn is_transport_suffix(rest: &str) -> bool {
    let mut parts: Vec<&str> = rest.split('.').collect();
    if parts.len() > 1 && matches!(parts.last(), Some(&"part") | Some(&"ytdl")) {
        parts.pop();
    }
    let is_ext = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric());
    let is_stream = |s: &str| {
        s == "temp"
            || s.strip_prefix('f').is_some_and(|id| {
                !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            })
    };
    match parts.as_slice() {
        [ext] => is_ext(ext),
        [stream, ext] => is_stream(stream) && is_ext(ext),
        _ => false,
    }
}
