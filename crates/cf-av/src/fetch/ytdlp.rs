//! Site extraction through the `yt-dlp` CLI.

use std::path::PathBuf;

use async_trait::async_trait;
use cf_core::OutputKind;

use super::{remove_partials, FetchResult, Fetcher};
use crate::command::{ToolCommand, ToolOutput};
use crate::tools::{ToolConfig, ToolRegistry, YTDLP};
use crate::workspace::Workspace;

/// Substring yt-dlp prints when `--max-filesize` rejects or aborts a download.
const SIZE_REJECTION_MARKER: &str = "larger than max-filesize";

/// Live streams are refused before any transfer starts; `--max-filesize`
/// cannot bound an open-ended download.
const LIVE_FILTER: &str = "!is_live";

/// Substring yt-dlp prints when `--match-filter` skips the requested video.
const FILTER_SKIP_MARKER: &str = "does not pass filter";

/// Written after the final move so the real path and dimensions can be read
/// back without a second invocation. Goes to a side file: `--print` would
/// imply `--quiet` and hide the size rejection message.
const PRINT_TEMPLATE: &str = "after_move:%(filepath)s|%(width)s|%(height)s";

/// Extension of the side file receiving [`PRINT_TEMPLATE`].
const INFO_EXTENSION: &str = "fetchinfo";

/// A [`Fetcher`] that shells out to `yt-dlp`.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    tool: ToolConfig,
    workspace: Workspace,
    max_bytes: u64,
}

impl YtDlpFetcher {
    pub fn new(tool: ToolConfig, workspace: Workspace, max_bytes: u64) -> Self {
        Self {
            tool,
            workspace,
            max_bytes,
        }
    }

    pub fn from_registry(
        registry: &ToolRegistry,
        workspace: Workspace,
        max_bytes: u64,
    ) -> cf_core::Result<Self> {
        let tool = registry.require(YTDLP)?.clone();
        Ok(Self::new(tool, workspace, max_bytes))
    }

    fn build_command(&self, url: &str, kind: OutputKind, desired_name: &str) -> ToolCommand {
        let template = self
            .workspace
            .root()
            .join(format!("{desired_name}.%(ext)s"));

        let mut cmd = self.tool.command();
        cmd.args(["--no-playlist", "--no-progress", "--no-part"]);
        cmd.arg("--max-filesize").arg(self.max_bytes.to_string());
        cmd.arg("--match-filter").arg(LIVE_FILTER);
        cmd.arg("-f").arg(format_selector(kind));
        if kind == OutputKind::Video {
            cmd.args(["--merge-output-format", "mp4"]);
        }
        cmd.arg("-o").arg(template.to_string_lossy());
        cmd.args(["--print-to-file", PRINT_TEMPLATE]);
        cmd.arg(self.info_path(desired_name).to_string_lossy());
        cmd.arg("--").arg(url);
        cmd
    }

    fn info_path(&self, desired_name: &str) -> PathBuf {
        self.workspace.source_path(desired_name, INFO_EXTENSION)
    }

    async fn download(
        &self,
        url: &str,
        kind: OutputKind,
        desired_name: &str,
    ) -> cf_core::Result<FetchResult> {
        let cmd = self.build_command(url, kind, desired_name);
        let output = cmd
            .output()
            .await
            .map_err(|e| cf_core::Error::unavailable(e.to_string()))?;

        if let Some(detail) = size_rejection(&output) {
            return Err(cf_core::Error::SourceTooLarge {
                limit_bytes: self.max_bytes,
                detail,
            });
        }
        if let Some(line) = find_line(&output, FILTER_SKIP_MARKER) {
            return Err(cf_core::Error::unavailable(format!(
                "live streams are not supported ({line})"
            )));
        }
        if !output.status.success() {
            return Err(cf_core::Error::unavailable(output.diagnostic()));
        }

        let info_path = self.info_path(desired_name);
        let info = std::fs::read_to_string(&info_path).unwrap_or_default();
        crate::workspace::remove_file(&info_path)?;

        let result = parse_print_line(&info).ok_or_else(|| {
            cf_core::Error::unavailable("yt-dlp finished without reporting a downloaded file")
        })?;
        if !result.local_path.is_file() {
            return Err(cf_core::Error::unavailable(format!(
                "yt-dlp reported {} but no such file exists",
                result.local_path.display()
            )));
        }
        Ok(result)
    }
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch(
        &self,
        url: &str,
        kind: OutputKind,
        desired_name: &str,
    ) -> cf_core::Result<FetchResult> {
        tracing::info!("fetching {url} via yt-dlp as {desired_name}");
        match self.download(url, kind, desired_name).await {
            Ok(result) => {
                tracing::info!(
                    "fetched {} ({}x{})",
                    result.local_path.display(),
                    result.native_width,
                    result.native_height
                );
                Ok(result)
            }
            Err(e) => {
                remove_partials(self.workspace.root(), desired_name);
                Err(e)
            }
        }
    }
}

fn format_selector(kind: OutputKind) -> &'static str {
    match kind {
        OutputKind::Audio => "bestaudio/best",
        OutputKind::Video => "bestvideo[ext=mp4][vcodec!*=av01]+bestaudio/best",
        // Loops are silent; skip the audio download entirely.
        OutputKind::Loop => "bestvideo[ext=mp4][vcodec!*=av01]/best",
    }
}

fn size_rejection(output: &ToolOutput) -> Option<String> {
    find_line(output, SIZE_REJECTION_MARKER)
}

/// First line of stdout or stderr containing `marker`, trimmed.
fn find_line(output: &ToolOutput, marker: &str) -> Option<String> {
    output
        .stdout
        .lines()
        .chain(output.stderr.lines())
        .find(|line| line.contains(marker))
        .map(|line| line.trim().to_string())
}

/// Parse the last `path|width|height` line. The path may itself contain `|`.
fn parse_print_line(stdout: &str) -> Option<FetchResult> {
    let line = stdout.lines().rev().find(|l| !l.trim().is_empty())?.trim();
    let mut parts = line.rsplitn(3, '|');
    let height = parts.next()?;
    let width = parts.next()?;
    let path = parts.next()?;
    if path.is_empty() || path == "NA" {
        return None;
    }
    Some(FetchResult {
        local_path: PathBuf::from(path),
        native_width: parse_dimension(width),
        native_height: parse_dimension(height),
    })
}

fn parse_dimension(s: &str) -> u32 {
    s.trim().parse().unwrap_or(0)
}
