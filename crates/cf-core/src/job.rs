//! The job descriptor and its encode parameters.
//!
//! A [`Job`] records what the submitter asked for. The pipeline never mutates
//! it: clamps and shrinks are applied to a separate *effective*
//! [`EncodeParams`] value derived from [`Job::requested`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ---------------------------------------------------------------------------
// OutputKind
// ---------------------------------------------------------------------------

/// The three deliverable output kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Short mp4 clip.
    Video,
    /// Silent looping gif.
    Loop,
    /// mp3 audio extract.
    Audio,
}

impl OutputKind {
    /// File extension of the delivered file.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Video => "mp4",
            Self::Loop => "gif",
            Self::Audio => "mp3",
        }
    }

    /// Whether the output carries a video stream that filters apply to.
    pub fn is_visual(&self) -> bool {
        !matches!(self, Self::Audio)
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Loop => write!(f, "loop"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

impl FromStr for OutputKind {
    type Err = String;

    /// Accepts both the kind names and the file formats users type.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "video" | "mp4" => Ok(Self::Video),
            "loop" | "gif" => Ok(Self::Loop),
            "audio" | "mp3" => Ok(Self::Audio),
            other => Err(format!(
                "unsupported format '{other}' (expected mp4, gif or mp3)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Height
// ---------------------------------------------------------------------------

/// A requested output height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Height {
    /// Compute from the width, preserving aspect ratio.
    Auto,
    /// An explicit pixel height.
    Pixels(u32),
}

impl Height {
    /// The pixel value, if explicit.
    pub fn pixels(&self) -> Option<u32> {
        match self {
            Self::Auto => None,
            Self::Pixels(px) => Some(*px),
        }
    }
}

// ---------------------------------------------------------------------------
// EncodeParams
// ---------------------------------------------------------------------------

/// Clip bounds, dimensions and frame rate for one encode.
///
/// `height == None` means "preserve aspect"; [`Height::Auto`] is the explicit
/// auto sentinel written by the loop safety clamp. Both render as an
/// automatic dimension in the scale filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeParams {
    pub start: Option<Duration>,
    pub end: Option<Duration>,
    pub width: Option<u32>,
    pub height: Option<Height>,
    pub frame_rate: Option<u32>,
}

impl EncodeParams {
    /// Length of the clip if an end bound is set.
    pub fn clip_length(&self) -> Option<Duration> {
        self.end
            .map(|end| end.saturating_sub(self.start.unwrap_or_default()))
    }

    /// Whether any dimension is pinned to a concrete pixel value.
    pub fn has_dimensions(&self) -> bool {
        self.width.is_some() || self.height.and_then(|h| h.pixels()).is_some()
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One request to acquire and transcode one media asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub source_url: String,
    pub output_kind: OutputKind,
    pub requested: EncodeParams,
    pub output_name: String,
}

impl Job {
    /// Create a job with no clip bounds or size overrides and a generated,
    /// collision-free output name.
    pub fn new(source_url: impl Into<String>, output_kind: OutputKind) -> Self {
        Self {
            source_url: source_url.into(),
            output_kind,
            requested: EncodeParams::default(),
            output_name: generate_output_name(),
        }
    }

    /// Builder: set the clip bounds.
    pub fn with_clip(mut self, start: Option<Duration>, end: Option<Duration>) -> Self {
        self.requested.start = start;
        self.requested.end = end;
        self
    }

    /// Builder: set the requested dimensions.
    pub fn with_size(mut self, width: Option<u32>, height: Option<Height>) -> Self {
        self.requested.width = width;
        self.requested.height = height;
        self
    }

    /// Builder: set the requested frame rate.
    pub fn with_frame_rate(mut self, frame_rate: Option<u32>) -> Self {
        self.requested.frame_rate = frame_rate;
        self
    }

    /// Builder: replace the generated output name.
    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = name.into();
        self
    }
}

/// Generate a job-unique base name such as `job_6f1c...`.
pub fn generate_output_name() -> String {
    format!("job_{}", uuid::Uuid::new_v4().simple())
}
