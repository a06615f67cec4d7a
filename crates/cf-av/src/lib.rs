//! # cf-av
//!
//! External tool plumbing for the clipforge pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg,
//!   ffprobe and yt-dlp.
//! - **Command execution** ([`ToolCommand`]) -- async builder with optional
//!   timeout and kill-on-drop for running external processes.
//! - **Working directory** ([`Workspace`]) -- job-unique paths, scoped palette
//!   files and stale artifact sweeping.
//! - **Probing** ([`probe::FfprobeProber`]) -- width, height, duration and
//!   audio codec of a local file.
//! - **Fetching** ([`fetch::YtDlpFetcher`], [`fetch::HttpFetcher`]) -- remote
//!   assets under a byte ceiling.
//! - **Encoding** ([`encode::FfmpegEncoder`]) -- runs planned ffmpeg passes.

pub mod command;
pub mod encode;
pub mod fetch;
pub mod probe;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use encode::{EncodePass, Encoder, FfmpegEncoder};
pub use fetch::{FetchResult, Fetcher, HttpFetcher, YtDlpFetcher};
pub use probe::{FfprobeProber, ProbeResult, Prober};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use workspace::Workspace;
