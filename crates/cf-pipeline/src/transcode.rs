//! Encode pass planning and execution.
//!
//! A [`TranscodeAttempt`] describes one attempt at producing a candidate.
//! The `*_pass` functions turn it into ffmpeg argument vectors; the
//! [`TranscodeExecutor`] runs those passes through an [`Encoder`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cf_av::{EncodePass, Encoder, Workspace};
use cf_core::config::EncodeConfig;
use cf_core::{EncodeParams, OutputKind};

use crate::filters::FilterChain;

/// Clip bounds applied as input options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Trim {
    pub start: Option<Duration>,
    pub end: Option<Duration>,
}

impl Trim {
    pub fn from_params(params: &EncodeParams) -> Self {
        Self {
            start: params.start,
            end: params.end,
        }
    }

    /// `-ss <start>` and `-t <end - start>`, each only when bounded.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(start) = self.start {
            args.push("-ss".to_string());
            args.push(seconds(start));
        }
        if let Some(end) = self.end {
            let length = end.saturating_sub(self.start.unwrap_or_default());
            args.push("-t".to_string());
            args.push(seconds(length));
        }
        args
    }
}

fn seconds(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64())
}

/// Everything needed to encode one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeAttempt {
    pub input: PathBuf,
    pub output: PathBuf,
    pub kind: OutputKind,
    pub trim: Trim,
    pub filters: FilterChain,
    /// Codec of the source's first audio stream, from the probe.
    pub source_audio_codec: Option<String>,
}

impl TranscodeAttempt {
    /// Number of encoder invocations this attempt takes.
    pub fn pass_count(&self) -> u32 {
        match self.kind {
            OutputKind::Loop => 2,
            OutputKind::Video | OutputKind::Audio => 1,
        }
    }

    fn source_audio_is(&self, codec: &str) -> bool {
        self.source_audio_codec.as_deref() == Some(codec)
    }

    fn input_args(&self) -> Vec<String> {
        let mut args = self.trim.args();
        args.push("-i".into());
        args.push(path_arg(&self.input));
        args
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Single-pass mp3 extract.
pub fn audio_pass(attempt: &TranscodeAttempt, settings: &EncodeConfig) -> EncodePass {
    let mut args = attempt.input_args();
    args.push("-vn".into());
    if attempt.source_audio_is("mp3") {
        args.extend(["-c:a".into(), "copy".into()]);
    } else {
        args.extend([
            "-c:a".into(),
            "libmp3lame".into(),
            "-b:a".into(),
            settings.audio_bitrate.clone(),
        ]);
    }
    args.push(path_arg(&attempt.output));

    EncodePass {
        label: "audio".into(),
        args,
        output: attempt.output.clone(),
    }
}

/// Single-pass H.264/AAC mp4.
pub fn video_pass(attempt: &TranscodeAttempt, settings: &EncodeConfig) -> EncodePass {
    let mut args = attempt.input_args();
    if !attempt.filters.is_empty() {
        args.push("-vf".into());
        args.push(attempt.filters.to_string());
    }
    args.extend([
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        settings.video_preset.clone(),
        "-crf".into(),
        settings.video_crf.to_string(),
        "-pix_fmt".into(),
        "yuv420p".into(),
    ]);
    if attempt.source_audio_is("aac") {
        args.extend(["-c:a".into(), "copy".into()]);
    } else {
        args.extend([
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            settings.audio_bitrate.clone(),
        ]);
    }
    args.extend(["-movflags".into(), "+faststart".into()]);
    args.push(path_arg(&attempt.output));

    EncodePass {
        label: "video".into(),
        args,
        output: attempt.output.clone(),
    }
}

/// First loop pass: derive a palette from the filtered source.
pub fn palettegen_pass(attempt: &TranscodeAttempt, palette: &Path) -> EncodePass {
    let graph = if attempt.filters.is_empty() {
        "palettegen".to_string()
    } else {
        format!("{},palettegen", attempt.filters)
    };

    let mut args = attempt.input_args();
    args.extend(["-vf".into(), graph, "-frames:v".into(), "1".into()]);
    args.push(path_arg(palette));

    EncodePass {
        label: "palettegen".into(),
        args,
        output: palette.to_path_buf(),
    }
}

/// Second loop pass: map the filtered source onto the palette.
pub fn paletteuse_pass(attempt: &TranscodeAttempt, palette: &Path) -> EncodePass {
    let graph = if attempt.filters.is_empty() {
        "[0:v][1:v] paletteuse".to_string()
    } else {
        format!("{} [x]; [x][1:v] paletteuse", attempt.filters)
    };

    let mut args = attempt.input_args();
    args.extend(["-i".into(), path_arg(palette)]);
    args.extend(["-lavfi".into(), graph, "-loop".into(), "0".into()]);
    args.push(path_arg(&attempt.output));

    EncodePass {
        label: "paletteuse".into(),
        args,
        output: attempt.output.clone(),
    }
}

/// Runs the passes of a [`TranscodeAttempt`].
#[derive(Clone)]
pub struct TranscodeExecutor {
    encoder: Arc<dyn Encoder>,
    workspace: Workspace,
    settings: EncodeConfig,
}

impl TranscodeExecutor {
    pub fn new(encoder: Arc<dyn Encoder>, workspace: Workspace, settings: EncodeConfig) -> Self {
        Self {
            encoder,
            workspace,
            settings,
        }
    }

    /// Encode `attempt`; `name` scopes the loop palette file.
    ///
    /// # Errors
    ///
    /// The first failing pass ends the attempt; nothing is retried.
    pub async fn execute(&self, attempt: &TranscodeAttempt, name: &str) -> cf_core::Result<()> {
        tracing::info!(
            "transcoding {} -> {} ({} pass(es))",
            attempt.input.display(),
            attempt.output.display(),
            attempt.pass_count()
        );
        match attempt.kind {
            OutputKind::Audio => self.run(&audio_pass(attempt, &self.settings)).await,
            OutputKind::Video => self.run(&video_pass(attempt, &self.settings)).await,
            OutputKind::Loop => self.execute_loop(attempt, name).await,
        }
    }

    async fn execute_loop(&self, attempt: &TranscodeAttempt, name: &str) -> cf_core::Result<()> {
        let palette = self.workspace.palette(name)?;
        let result = self.run_palette_passes(attempt, &palette).await;
        if let Err(e) = palette.close() {
            tracing::warn!("could not remove palette for {name}: {e}");
        }
        result
    }

    async fn run_palette_passes(&self, attempt: &TranscodeAttempt, palette: &Path) -> cf_core::Result<()> {
        self.run(&palettegen_pass(attempt, palette)).await?;
        self.run(&paletteuse_pass(attempt, palette)).await
    }

    async fn run(&self, pass: &EncodePass) -> cf_core::Result<()> {
        tracing::debug!("{} pass args: {}", pass.label, pass.args.join(" "));
        self.encoder.run(pass).await
    }
}

impl std::fmt::Debug for TranscodeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscodeExecutor")
            .field("encoder", &self.encoder.name())
            .field("workspace", &self.workspace)
            .finish_non_exhaustive()
    }
}
