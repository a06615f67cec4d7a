//! FFprobe-based [`Prober`](super::Prober) implementation.
//!
//! Shells out to `ffprobe -v error -print_format json -show_format -show_streams`
//! and maps the first video stream, the first audio stream and the container
//! duration into a [`ProbeResult`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ProbeResult, Prober};
use crate::tools::{ToolConfig, ToolRegistry, FFPROBE};

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    tool: ToolConfig,
}

impl FfprobeProber {
    pub fn new(tool: ToolConfig) -> Self {
        Self { tool }
    }

    /// Build a prober from the registry, failing if ffprobe was not found.
    pub fn from_registry(registry: &ToolRegistry) -> cf_core::Result<Self> {
        registry.require(FFPROBE).cloned().map(Self::new)
    }

    async fn run(&self, path: &Path) -> cf_core::Result<ProbeResult> {
        let mut cmd = self.tool.command();
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]);
        cmd.arg(path.to_string_lossy());

        let output = cmd.execute().await?;
        parse_ffprobe_json(&output.stdout)
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> ProbeResult {
        match self.run(path).await {
            Ok(result) => {
                tracing::debug!(
                    "probed {}: {}x{} {:.2}s audio={:?}",
                    path.display(),
                    result.width,
                    result.height,
                    result.duration.as_secs_f64(),
                    result.audio_codec
                );
                result
            }
            Err(e) => {
                tracing::warn!("probe of {} failed, continuing without metadata: {e}", path.display());
                ProbeResult::default()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn parse_ffprobe_json(json: &str) -> cf_core::Result<ProbeResult> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| cf_core::Error::tool(FFPROBE, format!("JSON parse error: {e}")))?;
    Ok(map_output(output))
}

fn map_output(output: FfprobeOutput) -> ProbeResult {
    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let audio = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));

    // Container duration first; some sources only carry it per stream.
    let duration = output
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_seconds)
        .or_else(|| video.and_then(|s| s.duration.as_deref()).and_then(parse_seconds))
        .or_else(|| audio.and_then(|s| s.duration.as_deref()).and_then(parse_seconds))
        .unwrap_or_default();

    ProbeResult {
        width: video.and_then(|s| s.width).unwrap_or(0),
        height: video.and_then(|s| s.height).unwrap_or(0),
        duration,
        audio_codec: audio.and_then(|s| s.codec_name.clone()),
    }
}

/// Negative, NaN, infinite and out-of-range values are unknown.
fn parse_seconds(s: &str) -> Option<Duration> {
    let secs: f64 = s.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}
