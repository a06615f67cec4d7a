//! Bounded shrink-and-retry until the output fits the size limit.
//!
//! Each attempt runs safety (loops only), planning and transcoding against
//! the current *effective* parameters. An oversized candidate shrinks the
//! dimensions by `sqrt(size / limit * margin)` and tries again.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cf_av::{FetchResult, ProbeResult, Prober, Workspace};
use cf_core::config::Limits;
use cf_core::{EncodeParams, Height, Job, OutputKind};

use crate::filters::build_filters;
use crate::safety::apply_loop_safety;
use crate::transcode::{TranscodeAttempt, TranscodeExecutor, Trim};

/// Smallest width or height a shrink may produce.
pub const MIN_DIMENSION: u32 = 2;

/// Drives a fetched source to a candidate within the size limit.
#[derive(Clone)]
pub struct ConvergenceLoop {
    prober: Arc<dyn Prober>,
    executor: TranscodeExecutor,
    workspace: Workspace,
    limits: Limits,
}

impl ConvergenceLoop {
    pub fn new(
        prober: Arc<dyn Prober>,
        executor: TranscodeExecutor,
        workspace: Workspace,
        limits: Limits,
    ) -> Self {
        Self {
            prober,
            executor,
            workspace,
            limits,
        }
    }

    /// Produce `<work_dir>/<output_name>_processed.<ext>` within the limit.
    ///
    /// On every error path, and when the future is dropped mid-run, the
    /// candidate is removed.
    ///
    /// # Errors
    ///
    /// [`cf_core::Error::TranscodeFailure`] when a pass fails or writes an
    /// empty file; [`cf_core::Error::OutputTooLarge`] when the attempts run
    /// out or nothing is left to shrink.
    pub async fn converge(&self, fetched: &FetchResult, job: &Job) -> cf_core::Result<PathBuf> {
        let kind = job.output_kind;
        let limit = self.limits.max_output_bytes;
        let max_attempts = self.limits.max_attempts.max(1);
        let candidate = CandidateGuard::new(self.workspace.output_path(&job.output_name, kind.extension()));
        let output = candidate.path().to_path_buf();

        // The source does not change within a run, so one probe serves all attempts.
        let probe = self.prober.probe(&fetched.local_path).await;

        let mut effective = job.requested.clone();
        let mut attempts = 0;
        loop {
            attempts += 1;
            if kind == OutputKind::Loop {
                effective = apply_loop_safety(&effective, &probe, &self.limits);
            }

            let attempt = TranscodeAttempt {
                input: fetched.local_path.clone(),
                output: output.clone(),
                kind,
                trim: Trim::from_params(&effective),
                filters: build_filters(&effective, kind),
                source_audio_codec: probe.audio_codec.clone(),
            };
            tracing::debug!(
                "attempt {attempts}/{max_attempts} for {}: requested {:?}, effective {:?}",
                job.output_name,
                job.requested,
                effective
            );

            self.executor.execute(&attempt, &job.output_name).await?;
            let size = candidate_size(&output, kind)?;

            if size <= limit {
                tracing::info!(
                    "{} ready after {attempts} attempt(s): {size} bytes",
                    output.display()
                );
                return Ok(candidate.keep());
            }

            tracing::info!("attempt {attempts}: {size} bytes exceeds limit of {limit} bytes");
            let too_large = cf_core::Error::OutputTooLarge {
                size_bytes: size,
                limit_bytes: limit,
                attempts,
            };
            if attempts >= max_attempts {
                return Err(too_large);
            }

            match shrink(
                &effective,
                fetched,
                &probe,
                kind,
                size,
                limit,
                self.limits.shrink_safety_margin,
            ) {
                Some(next) => effective = next,
                None => {
                    tracing::info!("nothing left to shrink for {}", job.output_name);
                    return Err(too_large);
                }
            }
        }
    }
}

impl std::fmt::Debug for ConvergenceLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvergenceLoop")
            .field("prober", &self.prober.name())
            .field("executor", &self.executor)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

/// Scale the dimensions of `effective` down so the next candidate should fit.
///
/// Returns `None` when there is nothing to shrink: audio output, no known
/// width, or a result below [`MIN_DIMENSION`].
pub fn shrink(
    effective: &EncodeParams,
    fetched: &FetchResult,
    probe: &ProbeResult,
    kind: OutputKind,
    size: u64,
    limit: u64,
    margin: f64,
) -> Option<EncodeParams> {
    if !kind.is_visual() {
        return None;
    }

    let ratio = ((size as f64 / limit as f64) * margin).sqrt();
    let scale = |px: u32| -> Option<u32> {
        let shrunk = (f64::from(px) / ratio).floor() as u32;
        (shrunk >= MIN_DIMENSION).then_some(shrunk)
    };

    let width = effective
        .width
        .or_else(|| known(fetched.native_width))
        .or_else(|| known(probe.width))?;

    let height = match effective.height {
        Some(Height::Pixels(px)) => Some(Height::Pixels(scale(px)?)),
        None if effective.width.is_none() => match known(fetched.native_height).or_else(|| known(probe.height)) {
            Some(px) => Some(Height::Pixels(scale(px)?)),
            None => None,
        },
        other => other,
    };

    let next = EncodeParams {
        width: Some(scale(width)?),
        height,
        ..effective.clone()
    };
    tracing::debug!(
        "shrink ratio {ratio:.3}: width {width} -> {:?}, height {:?} -> {:?}",
        next.width,
        effective.height,
        next.height
    );
    Some(next)
}

fn known(px: u32) -> Option<u32> {
    (px > 0).then_some(px)
}

fn final_pass_label(kind: OutputKind) -> &'static str {
    match kind {
        OutputKind::Audio => "audio",
        OutputKind::Video => "video",
        OutputKind::Loop => "paletteuse",
    }
}

fn candidate_size(output: &Path, kind: OutputKind) -> cf_core::Result<u64> {
    let size = match std::fs::metadata(output) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(cf_core::Error::transcode(
                final_pass_label(kind),
                "encoder exited successfully but wrote no output file",
            ));
        }
        Err(e) => return Err(cf_core::Error::io(output, e)),
    };
    if size == 0 {
        return Err(cf_core::Error::transcode(
            final_pass_label(kind),
            "encoder produced an empty file",
        ));
    }
    Ok(size)
}

/// The candidate output of one run; removed on drop unless kept.
#[derive(Debug)]
pub struct CandidateGuard {
    path: PathBuf,
    armed: bool,
}

impl CandidateGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hand the file to the caller.
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for CandidateGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = cf_av::workspace::remove_file(&self.path) {
                tracing::warn!("could not remove candidate: {e}");
            }
        }
    }
}
