//! Locating ffmpeg, ffprobe and yt-dlp.
//!
//! [`ToolRegistry::discover`] resolves each binary once (config override,
//! then `PATH`); callers get a [`ToolConfig`] whose [`ToolConfig::command`]
//! is a [`ToolCommand`] with the configured timeout applied.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::command::ToolCommand;

pub const FFMPEG: &str = "ffmpeg";
pub const FFPROBE: &str = "ffprobe";
pub const YTDLP: &str = "yt-dlp";

/// Every binary the pipeline can shell out to, in report order.
const KNOWN_TOOLS: &[&str] = &[FFMPEG, FFPROBE, YTDLP];

/// A resolved binary.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub name: String,
    pub path: PathBuf,
    /// Maximum execution time, if the deployment bounds tool runs.
    pub timeout: Option<Duration>,
}

impl ToolConfig {
    /// Start a command for this tool with its timeout applied.
    pub fn command(&self) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.path.clone());
        cmd.timeout(self.timeout);
        cmd
    }
}

/// One row of the `check-tools` report.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line of the tool's version banner.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// The binaries found at startup, keyed by name.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    found: HashMap<String, ToolConfig>,
}

impl ToolRegistry {
    /// Resolve every known tool.
    ///
    /// An override from [`cf_core::config::ToolsConfig`] wins when the file
    /// exists; otherwise [`which::which`] searches `PATH`. Missing tools are
    /// left out and only reported when [`ToolRegistry::require`]d.
    pub fn discover(tools_config: &cf_core::config::ToolsConfig) -> Self {
        let found = KNOWN_TOOLS
            .iter()
            .filter_map(|&name| {
                let override_path = match name {
                    FFMPEG => tools_config.ffmpeg_path.as_deref(),
                    FFPROBE => tools_config.ffprobe_path.as_deref(),
                    _ => tools_config.ytdlp_path.as_deref(),
                };
                let path = override_path
                    .filter(|p| p.exists())
                    .map(Path::to_path_buf)
                    .or_else(|| which::which(name).ok())?;
                tracing::debug!("found {name} at {}", path.display());
                let config = ToolConfig {
                    name: name.to_string(),
                    path,
                    timeout: tools_config.timeout(),
                };
                Some((name.to_string(), config))
            })
            .collect();

        Self { found }
    }

    /// Build a registry from explicit paths, bypassing discovery.
    pub fn from_paths(paths: impl IntoIterator<Item = (String, PathBuf)>) -> Self {
        let found = paths
            .into_iter()
            .map(|(name, path)| {
                let config = ToolConfig {
                    name: name.clone(),
                    path,
                    timeout: None,
                };
                (name, config)
            })
            .collect();
        Self { found }
    }

    /// The tool called `name`, or [`cf_core::Error::Tool`] if it was not found.
    pub fn require(&self, name: &str) -> cf_core::Result<&ToolConfig> {
        self.found.get(name).ok_or_else(|| {
            cf_core::Error::tool(name, format!("{name} not found; is it installed and in PATH?"))
        })
    }

    /// Availability and version of every known tool.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.found.get(name) {
                Some(cfg) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(name, &cfg.path),
                    path: Some(cfg.path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

/// First line of `-version` (ffmpeg family) or `--version` (yt-dlp).
fn detect_version(name: &str, path: &Path) -> Option<String> {
    let flag = if name == YTDLP { "--version" } else { "-version" };
    let output = std::process::Command::new(path).arg(flag).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).lines().next().map(str::to_owned))
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_core::config::ToolsConfig;

    #[test]
    fn report_covers_every_tool_in_order() {
        // Whatever is installed on this machine, all three tools are reported.
        let report = ToolRegistry::discover(&ToolsConfig::default()).check_all();
        let names: Vec<&str> = report.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, [FFMPEG, FFPROBE, YTDLP]);
        assert!(report.iter().all(|t| t.available == t.path.is_some()));
    }

    #[test]
    fn unknown_tool_is_a_tool_error() {
        let registry = ToolRegistry::discover(&ToolsConfig::default());
        let err = registry.require("mkvmerge").unwrap_err();
        assert!(err.to_string().contains("mkvmerge not found"), "{err}");
    }

    #[test]
    fn override_path_and_timeout_are_used() {
        let cfg = ToolsConfig {
            ffmpeg_path: Some(PathBuf::from("/bin/sh")),
            timeout_secs: Some(90),
            ..Default::default()
        };
        let registry = ToolRegistry::discover(&cfg);
        if let Ok(ffmpeg) = registry.require(FFMPEG) {
            assert_eq!(ffmpeg.path, PathBuf::from("/bin/sh"));
            assert_eq!(ffmpeg.timeout, Some(Duration::from_secs(90)));
            assert_eq!(ffmpeg.command().program_name(), "sh");
        }
    }

    #[test]
    fn explicit_paths_skip_discovery() {
        let registry =
            ToolRegistry::from_paths([(FFMPEG.to_string(), PathBuf::from("/opt/ffmpeg"))]);
        assert_eq!(registry.require(FFMPEG).unwrap().path, PathBuf::from("/opt/ffmpeg"));
        assert!(registry.require(FFPROBE).is_err());
    }
}
