//! Media inspection.
//!
//! A [`Prober`] reports the dimensions, duration and primary audio codec of a
//! local file. Probing is advisory: implementations absorb their own failures
//! and hand back [`ProbeResult::default`], which callers treat as "unknown".

pub mod ffprobe;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

pub use self::ffprobe::FfprobeProber;

/// What a probe learned about a file. Zero / `None` means unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub width: u32,
    pub height: u32,
    pub duration: Duration,
    /// Codec name of the first audio stream, e.g. `"aac"` or `"mp3"`.
    pub audio_codec: Option<String>,
}

impl ProbeResult {
    /// Whether the probe found no usable information at all.
    pub fn is_unknown(&self) -> bool {
        *self == Self::default()
    }
}

/// A media file prober.
///
/// Implementations must be safe to share across threads (`Send + Sync`).
#[async_trait]
pub trait Prober: Send + Sync {
    /// Human-readable name identifying this prober implementation.
    fn name(&self) -> &'static str;

    /// Inspect the file at `path`. Never fails; see the module docs.
    async fn probe(&self, path: &Path) -> ProbeResult;
}
