//! Deployment settings for clipforge.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! working directory, tool overrides, pipeline limits and encoder settings.
//! Every section defaults sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

const MIB: u64 = 1024 * 1024;

/// Everything a deployment can tune, read from one JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shared directory for fetched sources, palettes and outputs.
    pub work_dir: PathBuf,
    pub tools: ToolsConfig,
    pub limits: Limits,
    pub encode: EncodeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("./downloads"),
            tools: ToolsConfig::default(),
            limits: Limits::default(),
            encode: EncodeConfig::default(),
        }
    }
}

impl Config {
    /// Parse a JSON document; unknown sections fall back to defaults.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).map_err(|e| Error::Config(format!("parse error: {e}")))
    }

    /// Best-effort load: any missing or unreadable file yields the defaults
    /// with a log line.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("ignoring unparsable config {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("{} not found, running with built-in defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("cannot read config {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Load configuration strictly: the file must exist and parse.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&contents)
    }

    /// Settings that will run but probably not as intended.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let limits = &self.limits;

        if limits.max_output_bytes == 0 {
            warnings.push("limits.max_output_bytes is 0; every output will be rejected".into());
        }
        if limits.max_source_bytes < limits.max_output_bytes {
            warnings.push(
                "limits.max_source_bytes is below limits.max_output_bytes".into(),
            );
        }
        if limits.max_attempts == 0 {
            warnings.push("limits.max_attempts is 0; treated as a single attempt".into());
        }
        if limits.shrink_safety_margin <= 1.0 {
            warnings.push(format!(
                "limits.shrink_safety_margin {} should be above 1.0 to avoid repeated near-misses",
                limits.shrink_safety_margin
            ));
        }
        if limits.safe_loop_width < 2 {
            warnings.push("limits.safe_loop_width must be at least 2 pixels".into());
        }
        if limits.safe_loop_fps == 0 {
            warnings.push("limits.safe_loop_fps is 0".into());
        }
        if self.encode.video_crf > 51 {
            warnings.push(format!(
                "encode.video_crf {} is outside the x264 range 0-51",
                self.encode.video_crf
            ));
        }

        warnings
    }
}

/// Binary overrides; unset entries are looked up on `PATH`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub ytdlp_path: Option<PathBuf>,
    /// Per-invocation timeout. Unset means the caller bounds the job.
    pub timeout_secs: Option<u64>,
}

impl ToolsConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Hard limits enforced by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Largest deliverable file.
    pub max_output_bytes: u64,
    /// Largest remote asset the fetcher will transfer.
    pub max_source_bytes: u64,
    /// Longest loop produced when no end time is given.
    pub max_loop_length_secs: u64,
    pub safe_loop_width: u32,
    pub safe_loop_fps: u32,
    /// Frame rate assumed for sources when none was requested.
    pub assumed_source_fps: u32,
    /// Multiplier applied to the overshoot ratio before shrinking.
    pub shrink_safety_margin: f64,
    /// Encode attempts before giving up on the size limit.
    pub max_attempts: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_output_bytes: 10 * MIB,
            max_source_bytes: 1024 * MIB,
            max_loop_length_secs: 30,
            safe_loop_width: 320,
            safe_loop_fps: 15,
            assumed_source_fps: 30,
            shrink_safety_margin: 1.1,
            max_attempts: 5,
        }
    }
}

impl Limits {
    pub fn max_loop_length(&self) -> Duration {
        Duration::from_secs(self.max_loop_length_secs)
    }
}

/// Encoder quality defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    #[serde(default = "default_video_crf")]
    pub video_crf: u32,
    #[serde(default = "default_video_preset")]
    pub video_preset: String,
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

fn default_video_crf() -> u32 {
    23
}
fn default_video_preset() -> String {
    "fast".into()
}
fn default_audio_bitrate() -> String {
    "128k".into()
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            video_crf: default_video_crf(),
            video_preset: default_video_preset(),
            audio_bitrate: default_audio_bitrate(),
        }
    }
}
