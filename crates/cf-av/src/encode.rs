//! Encoder seam for transcoding passes.
//!
//! Planning code builds [`EncodePass`] values (pure argument vectors) and
//! hands them to an [`Encoder`]. [`FfmpegEncoder`] runs them through the
//! `ffmpeg` CLI; tests substitute fakes that write files directly.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::tools::{ToolConfig, ToolRegistry, FFMPEG};

/// Global flags prepended to every ffmpeg invocation.
const FFMPEG_GLOBAL_ARGS: &[&str] = &["-hide_banner", "-nostdin", "-y", "-v", "error"];

/// A single ffmpeg invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodePass {
    /// Short pass label used in errors and logs (`"video"`, `"palettegen"`).
    pub label: String,
    /// Arguments after the global flags, ending with the output path.
    pub args: Vec<String>,
    /// File this pass writes.
    pub output: PathBuf,
}

/// Runs encode passes.
#[async_trait]
pub trait Encoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run one pass to completion.
    ///
    /// # Errors
    ///
    /// [`cf_core::Error::TranscodeFailure`] carrying the encoder diagnostic
    /// when the pass exits unsuccessfully; [`cf_core::Error::Tool`] when the
    /// encoder could not be started or timed out.
    async fn run(&self, pass: &EncodePass) -> cf_core::Result<()>;
}

/// An [`Encoder`] backed by the `ffmpeg` CLI.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    tool: ToolConfig,
}

impl FfmpegEncoder {
    pub fn new(tool: ToolConfig) -> Self {
        Self { tool }
    }

    pub fn from_registry(registry: &ToolRegistry) -> cf_core::Result<Self> {
        registry.require(FFMPEG).cloned().map(Self::new)
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn run(&self, pass: &EncodePass) -> cf_core::Result<()> {
        let mut cmd = self.tool.command();
        cmd.args(FFMPEG_GLOBAL_ARGS.iter().copied());
        cmd.args(pass.args.iter().cloned());

        tracing::info!("ffmpeg {} pass -> {}", pass.label, pass.output.display());
        let output = cmd.output().await?;
        if !output.status.success() {
            return Err(cf_core::Error::transcode(&pass.label, output.diagnostic()));
        }
        tracing::debug!("ffmpeg {} pass finished", pass.label);
        Ok(())
    }
}
