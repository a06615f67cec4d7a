//! Pipeline entry point: fetch, converge, clean up.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cf_av::{Encoder, Fetcher, Prober, Workspace};
use cf_core::config::Config;
use cf_core::Job;

use crate::converge::ConvergenceLoop;
use crate::transcode::TranscodeExecutor;

/// Owns a fetched source file until the run ends.
///
/// [`SourceGuard::release`] removes the file and reports failures. A guard
/// dropped without release (panic, cancelled future) removes the file
/// best-effort and logs.
#[derive(Debug)]
pub struct SourceGuard {
    path: Option<PathBuf>,
}

impl SourceGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Remove the source now.
    pub fn release(mut self) -> cf_core::Result<()> {
        match self.path.take() {
            Some(path) => cf_av::workspace::remove_file(&path),
            None => Ok(()),
        }
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = cf_av::workspace::remove_file(&path) {
                tracing::warn!("failed to remove fetched source during unwind: {e}");
            }
        }
    }
}

/// Runs one [`Job`] from URL to deliverable file.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use cf_av::{FfmpegEncoder, FfprobeProber, ToolRegistry, Workspace, YtDlpFetcher};
/// use cf_core::{config::Config, Job, OutputKind};
/// use cf_pipeline::JobPipeline;
///
/// # async fn example() -> cf_core::Result<()> {
/// let config = Config::default();
/// let tools = ToolRegistry::discover(&config.tools);
/// let workspace = Workspace::new(&config.work_dir);
/// let pipeline = JobPipeline::new(
///     Arc::new(YtDlpFetcher::from_registry(&tools, workspace, config.limits.max_source_bytes)?),
///     Arc::new(FfprobeProber::from_registry(&tools)?),
///     Arc::new(FfmpegEncoder::from_registry(&tools)?),
///     &config,
/// );
/// let output = pipeline.run(&Job::new("https://example.com/v/1", OutputKind::Loop)).await?;
/// println!("{}", output.display());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct JobPipeline {
    fetcher: Arc<dyn Fetcher>,
    converger: ConvergenceLoop,
    workspace: Workspace,
}

impl JobPipeline {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        prober: Arc<dyn Prober>,
        encoder: Arc<dyn Encoder>,
        config: &Config,
    ) -> Self {
        let workspace = Workspace::new(&config.work_dir);
        let executor = TranscodeExecutor::new(encoder, workspace.clone(), config.encode.clone());
        let converger = ConvergenceLoop::new(prober, executor, workspace.clone(), config.limits.clone());
        Self {
            fetcher,
            converger,
            workspace,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Run `job` to completion.
    ///
    /// On success the returned file exists, is non-empty and within the size
    /// limit; the caller owns it. On failure no file of this job remains.
    pub async fn run(&self, job: &Job) -> cf_core::Result<PathBuf> {
        self.workspace.ensure()?;
        tracing::info!(
            "job {}: {} -> {}",
            job.output_name,
            job.source_url,
            job.output_kind
        );

        let fetched = self
            .fetcher
            .fetch(&job.source_url, job.output_kind, &job.output_name)
            .await?;
        let source = SourceGuard::new(fetched.local_path.clone());

        let outcome = self.converger.converge(&fetched, job).await;

        match (outcome, source.release()) {
            (Ok(output), Ok(())) => Ok(output),
            (Ok(output), Err(cleanup)) => {
                if let Err(e) = cf_av::workspace::remove_file(&output) {
                    tracing::warn!("could not remove output after source cleanup failed: {e}");
                }
                Err(cleanup)
            }
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup)) => {
                tracing::warn!("source cleanup also failed: {cleanup}");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for JobPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPipeline")
            .field("fetcher", &self.fetcher.name())
            .field("converger", &self.converger)
            .finish()
    }
}
