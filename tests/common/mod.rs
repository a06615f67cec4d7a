//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which owns a temporary working directory and a
//! config pointing at it, plus fakes for the three pipeline seams:
//! [`FakeFetcher`], [`FakeProber`] and [`FakeEncoder`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use cf_av::{EncodePass, Encoder, FetchResult, Fetcher, ProbeResult, Prober, Workspace};
use cf_core::config::Config;
use cf_core::{Error, OutputKind};
use cf_pipeline::JobPipeline;

pub const MIB: u64 = 1024 * 1024;

/// Temporary working directory plus a config that points at it.
pub struct TestHarness {
    pub dir: TempDir,
    pub config: Config,
}

impl TestHarness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let config = Config {
            work_dir: dir.path().join("work"),
            ..Config::default()
        };
        Self { dir, config }
    }

    pub fn workspace(&self) -> Workspace {
        Workspace::new(&self.config.work_dir)
    }

    pub fn pipeline(
        &self,
        fetcher: Arc<dyn Fetcher>,
        prober: Arc<FakeProber>,
        encoder: Arc<FakeEncoder>,
    ) -> JobPipeline {
        JobPipeline::new(fetcher, prober, encoder, &self.config)
    }

    /// Sorted file names currently in the working directory.
    pub fn files(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.config.work_dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

/// Writes a small source file and reports fixed native dimensions.
pub struct FakeFetcher {
    workspace: Workspace,
    native_width: u32,
    native_height: u32,
    pub calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn new(workspace: Workspace, native_width: u32, native_height: u32) -> Self {
        Self {
            workspace,
            native_width,
            native_height,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn fetch(&self, _url: &str, _kind: OutputKind, desired_name: &str) -> cf_core::Result<FetchResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = self.workspace.source_path(desired_name, "mp4");
        std::fs::write(&path, b"source media").map_err(|e| Error::io(&path, e))?;
        Ok(FetchResult {
            local_path: path,
            native_width: self.native_width,
            native_height: self.native_height,
        })
    }
}

/// Returns a fixed probe result and counts calls.
pub struct FakeProber {
    result: ProbeResult,
    pub calls: AtomicUsize,
}

impl FakeProber {
    pub fn new(width: u32, height: u32, duration_secs: u64, audio_codec: Option<&str>) -> Self {
        Self {
            result: ProbeResult {
                width,
                height,
                duration: Duration::from_secs(duration_secs),
                audio_codec: audio_codec.map(String::from),
            },
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Prober for FakeProber {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn probe(&self, _path: &std::path::Path) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

type SizeFn = dyn Fn(Option<u32>) -> u64 + Send + Sync;

/// Writes each pass's output at a size chosen from the planned scale width.
pub struct FakeEncoder {
    size_for_width: Box<SizeFn>,
    fail_on: Option<&'static str>,
    stall: Option<Duration>,
    pub passes: Mutex<Vec<EncodePass>>,
}

impl FakeEncoder {
    /// Every candidate gets the size `size_for_width(planned width)`.
    pub fn sized(size_for_width: impl Fn(Option<u32>) -> u64 + Send + Sync + 'static) -> Self {
        Self {
            size_for_width: Box::new(size_for_width),
            fail_on: None,
            stall: None,
            passes: Mutex::new(Vec::new()),
        }
    }

    /// Every candidate gets `bytes` bytes.
    pub fn fixed(bytes: u64) -> Self {
        Self::sized(move |_| bytes)
    }

    /// Fail the pass with this label after writing a partial output.
    pub fn failing_on(label: &'static str) -> Self {
        Self {
            fail_on: Some(label),
            ..Self::fixed(1024)
        }
    }

    /// Write a partial output, then hang for `stall` before finishing.
    pub fn stalling(stall: Duration) -> Self {
        Self {
            stall: Some(stall),
            ..Self::fixed(1024)
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.passes.lock().unwrap().iter().map(|p| p.label.clone()).collect()
    }

    /// The filter graph argument (`-vf` / `-lavfi`) of each recorded pass.
    pub fn graphs(&self) -> Vec<Option<String>> {
        self.passes
            .lock()
            .unwrap()
            .iter()
            .map(|p| graph_arg(&p.args))
            .collect()
    }
}

fn graph_arg(args: &[String]) -> Option<String> {
    args.iter()
        .position(|a| a == "-vf" || a == "-lavfi")
        .and_then(|i| args.get(i + 1).cloned())
}

/// Width from `scale=W:H` in the graph; `None` when absent or automatic.
pub fn planned_width(args: &[String]) -> Option<u32> {
    let graph = graph_arg(args)?;
    let scale = graph.split(',').find_map(|f| f.trim().strip_prefix("scale="))?;
    let width = scale.split(':').next()?;
    width.parse::<i64>().ok().filter(|w| *w > 0).map(|w| w as u32)
}

#[async_trait]
impl Encoder for FakeEncoder {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn run(&self, pass: &EncodePass) -> cf_core::Result<()> {
        self.passes.lock().unwrap().push(pass.clone());
        let size = if pass.label == "palettegen" {
            768
        } else {
            (self.size_for_width)(planned_width(&pass.args))
        };

        let file = std::fs::File::create(&pass.output).map_err(|e| Error::io(&pass.output, e))?;
        file.set_len(size).map_err(|e| Error::io(&pass.output, e))?;

        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }
        if self.fail_on == Some(pass.label.as_str()) {
            return Err(Error::transcode(&pass.label, "Conversion failed!"));
        }
        Ok(())
    }
}

/// Path of every `-i` input of a pass.
pub fn inputs(pass: &EncodePass) -> Vec<PathBuf> {
    pass.args
        .windows(2)
        .filter(|w| w[0] == "-i")
        .map(|w| PathBuf::from(&w[1]))
        .collect()
}
