mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cf_av::{
    Fetcher, FfmpegEncoder, FfprobeProber, HttpFetcher, Prober, ToolRegistry, Workspace,
    YtDlpFetcher,
};
use cf_core::config::Config;
use cf_core::{Height, Job, OutputKind};
use cf_pipeline::JobPipeline;
use clap::Parser;
use cli::{Cli, Commands, FetcherChoice};

/// Extensions that mark a URL as a direct media link for `--fetcher auto`.
const DIRECT_MEDIA_EXTENSIONS: &[&str] = &[".mp4", ".webm", ".mov", ".mkv", ".m4a", ".mp3", ".gif"];

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "clipforge=debug,cf_pipeline=debug,cf_av=debug,cf_core=debug".to_string()
        } else {
            "clipforge=info,cf_pipeline=info,cf_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run {
            url,
            format,
            start,
            end,
            width,
            height,
            framerate,
            name,
            fetcher,
        } => {
            let mut job = Job::new(url, format)
                .with_clip(start, end)
                .with_size(width, height)
                .with_frame_rate(framerate);
            if let Some(name) = name {
                job = job.with_output_name(name);
            }
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_job(job, fetcher, config_path))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, config_path))
        }
        Commands::CheckTools => check_tools(config_path),
        Commands::Clean => clean(config_path),
        Commands::Validate {
            config: validate_path,
        } => validate_config(validate_path.as_deref().or(config_path)),
        Commands::Version => {
            println!("clipforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn validate_job(job: &Job) -> Result<()> {
    let requested = &job.requested;
    if let (Some(start), Some(end)) = (requested.start, requested.end) {
        if end <= start {
            anyhow::bail!("--end must be after --start");
        }
    }
    if requested.width == Some(0) {
        anyhow::bail!("--width must be positive");
    }
    if requested.frame_rate == Some(0) {
        anyhow::bail!("--framerate must be positive");
    }
    if job.output_kind == OutputKind::Audio
        && (requested.width.is_some() || matches!(requested.height, Some(Height::Pixels(_))))
    {
        tracing::warn!("dimensions are ignored for mp3 output");
    }
    if job.output_name.is_empty() || job.output_name.contains(['/', '\\']) {
        anyhow::bail!("--name must be a plain file name");
    }
    // The transport appends `.<ext>`; a dotted name could shadow another job's files.
    if job.output_name.contains('.') {
        anyhow::bail!("--name must not contain '.'");
    }
    Ok(())
}

fn select_fetcher(
    choice: FetcherChoice,
    url: &str,
    tools: &ToolRegistry,
    config: &Config,
) -> Result<Arc<dyn Fetcher>> {
    let workspace = Workspace::new(&config.work_dir);
    let max_bytes = config.limits.max_source_bytes;

    let use_http = match choice {
        FetcherChoice::Http => true,
        FetcherChoice::Ytdlp => false,
        FetcherChoice::Auto => {
            let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
            DIRECT_MEDIA_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        }
    };

    if use_http {
        Ok(Arc::new(HttpFetcher::new(workspace, max_bytes)?))
    } else {
        Ok(Arc::new(YtDlpFetcher::from_registry(tools, workspace, max_bytes)?))
    }
}

async fn run_job(job: Job, fetcher: FetcherChoice, config_path: Option<&Path>) -> Result<()> {
    validate_job(&job)?;
    let config = Config::load_or_default(config_path);
    for warning in config.validate() {
        tracing::warn!("config: {warning}");
    }

    let tools = ToolRegistry::discover(&config.tools);
    let fetcher = select_fetcher(fetcher, &job.source_url, &tools, &config)?;
    tracing::debug!("using {} fetcher", fetcher.name());

    let pipeline = JobPipeline::new(
        fetcher,
        Arc::new(FfprobeProber::from_registry(&tools)?),
        Arc::new(FfmpegEncoder::from_registry(&tools)?),
        &config,
    );

    match pipeline.run(&job).await {
        Ok(output) => {
            println!("{}", output.display());
            Ok(())
        }
        Err(e) => {
            tracing::error!("job {} failed: {e}", job.output_name);
            anyhow::bail!("{}", e.user_message())
        }
    }
}

async fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("{} does not exist", file.display());
    }

    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools);
    let prober = FfprobeProber::from_registry(&tools)?;
    let result = prober.probe(file).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("File: {}", file.display());
        if result.is_unknown() {
            println!("No media information could be read");
            return Ok(());
        }
        println!("Dimensions: {}x{}", result.width, result.height);
        println!("Duration: {}", format_duration(result.duration));
        println!(
            "Audio: {}",
            result.audio_codec.as_deref().unwrap_or("none")
        );
    }

    Ok(())
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        d.subsec_millis()
    )
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let report = ToolRegistry::discover(&config.tools).check_all();

    for tool in &report {
        let mark = if tool.available { "ok" } else { "missing" };
        let location = tool
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        println!(
            "{:<8} {:<8} {} {}",
            tool.name,
            mark,
            tool.version.as_deref().unwrap_or("-"),
            location
        );
    }

    if report.iter().any(|t| !t.available) {
        println!("\nffmpeg and ffprobe are required; yt-dlp is needed for site URLs.");
    }
    Ok(())
}

fn clean(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let workspace = Workspace::new(&config.work_dir);
    let removed = workspace.sweep_stale()?;
    println!("Removed {} file(s) from {}", removed, workspace.root().display());
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("config: {}", p.display());
            Config::load(p)?
        }
        None => {
            println!("config: built-in defaults");
            Config::default()
        }
    };

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("config ok");
    } else {
        println!("config loaded with {} warning(s):", warnings.len());
        for warning in &warnings {
            println!("  ! {warning}");
        }
    }
    println!("  Work dir: {}", config.work_dir.display());
    println!("  Output limit: {} bytes", config.limits.max_output_bytes);
    println!("  Source limit: {} bytes", config.limits.max_source_bytes);
    println!(
        "  Loop limits: {}s, {}px, {}fps",
        config.limits.max_loop_length_secs,
        config.limits.safe_loop_width,
        config.limits.safe_loop_fps
    );
    println!("  Attempts: {}", config.limits.max_attempts);

    Ok(())
}
