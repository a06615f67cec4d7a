//! Unified error type for clipforge.
//!
//! Every crate funnels its failures into [`Error`], which carries the failure
//! kind plus the underlying diagnostic text so the delivery side can build a
//! user-facing message via [`Error::user_message`].

use std::path::{Path, PathBuf};

/// Unified error type covering all failure modes of a job.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The remote asset is larger than the fetch ceiling.
    #[error("Source too large (limit {limit_bytes} bytes): {detail}")]
    SourceTooLarge {
        /// The configured ceiling.
        limit_bytes: u64,
        /// What the transport reported.
        detail: String,
    },

    /// The remote asset could not be retrieved for any other reason.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// An encode pass exited unsuccessfully.
    #[error("Transcode failed [{pass}]: {diagnostic}")]
    TranscodeFailure {
        /// Which pass failed (e.g. "video", "palettegen").
        pass: String,
        /// Captured diagnostic output of the encoder.
        diagnostic: String,
    },

    /// The convergence loop ran out of attempts.
    #[error("Output too large after {attempts} attempt(s): {size_bytes} bytes > {limit_bytes} bytes")]
    OutputTooLarge {
        /// Size of the last candidate.
        size_bytes: u64,
        /// The configured output ceiling.
        limit_bytes: u64,
        /// Number of encode attempts made.
        attempts: u32,
    },

    /// A filesystem operation failed.
    #[error("IO error at {}: {source}", path.display())]
    FileSystem {
        /// The path being operated on.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An external tool could not be started or did not finish.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Configuration could not be parsed.
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Stable numeric code for the size errors users see in chat.
    pub fn code(&self) -> Option<u16> {
        match self {
            Error::SourceTooLarge { .. } => Some(1001),
            Error::OutputTooLarge { .. } => Some(1002),
            _ => None,
        }
    }

    /// A sentence suitable for relaying to the person who submitted the job.
    pub fn user_message(&self) -> String {
        match self {
            Error::SourceTooLarge { .. } => {
                "Video attempting to download is too big (Error 1001)".to_string()
            }
            Error::OutputTooLarge { limit_bytes, .. } => format!(
                "Video result is above {}MB limit (Error 1002)",
                limit_bytes / (1024 * 1024)
            ),
            Error::SourceUnavailable(detail) => {
                format!("The media could not be downloaded: {detail}")
            }
            Error::TranscodeFailure { pass, .. } => {
                format!("Converting the media failed during the {pass} pass")
            }
            Error::FileSystem { .. } | Error::Tool { .. } | Error::Config(_) => {
                "An internal error occurred while processing the media".to_string()
            }
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::TranscodeFailure`].
    pub fn transcode(pass: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Error::TranscodeFailure {
            pass: pass.into(),
            diagnostic: diagnostic.into(),
        }
    }

    /// Convenience constructor for [`Error::FileSystem`].
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::FileSystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for [`Error::SourceUnavailable`].
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Error::SourceUnavailable(detail.into())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_too_large_display() {
        let err = Error::SourceTooLarge {
            limit_bytes: 1024,
            detail: "content-length 4096".into(),
        };
        assert_eq!(
            err.to_string(),
            "Source too large (limit 1024 bytes): content-length 4096"
        );
        assert_eq!(err.code(), Some(1001));
        assert!(err.user_message().contains("1001"));
    }

    #[test]
    fn output_too_large_display() {
        let err = Error::OutputTooLarge {
            size_bytes: 14 * 1024 * 1024,
            limit_bytes: 10 * 1024 * 1024,
            attempts: 5,
        };
        assert!(err.to_string().starts_with("Output too large after 5 attempt(s)"));
        assert_eq!(err.code(), Some(1002));
        assert_eq!(
            err.user_message(),
            "Video result is above 10MB limit (Error 1002)"
        );
    }

    #[test]
    fn transcode_display() {
        let err = Error::transcode("palettegen", "Invalid data found");
        assert_eq!(
            err.to_string(),
            "Transcode failed [palettegen]: Invalid data found"
        );
        assert_eq!(err.code(), None);
        assert!(err.user_message().contains("palettegen"));
    }

    #[test]
    fn io_display_includes_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::io("/tmp/work/a.mp4", io_err);
        assert_eq!(err.to_string(), "IO error at /tmp/work/a.mp4: denied");
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffmpeg", "failed to spawn: not found");
        assert_eq!(
            err.to_string(),
            "Tool error [ffmpeg]: failed to spawn: not found"
        );
    }

    #[test]
    fn unavailable_display() {
        let err = Error::unavailable("Video unavailable");
        assert_eq!(err.to_string(), "Source unavailable: Video unavailable");
        assert!(err.user_message().contains("Video unavailable"));
    }
}
