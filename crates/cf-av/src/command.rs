//! Spawning ffmpeg, ffprobe and yt-dlp and capturing what they print.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

/// Exit status and captured streams of one finished run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Stderr if it has content, otherwise stdout. Used as the verbatim
    /// diagnostic attached to failures.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Argument list plus timeout for one tool run.
///
/// The child is spawned with `kill_on_drop`, so a caller that drops the
/// future (timeout, cancellation) also terminates the process.
///
/// # Example
///
/// ```no_run
/// use cf_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> cf_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "error", "-of", "json", "-show_format"])
///     .arg("/path/to/video.mp4")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// `None` lets the tool run until it exits.
    pub fn timeout(&mut self, d: Option<Duration>) -> &mut Self {
        self.timeout = d;
        self
    }

    /// The arguments collected so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// File name of the binary, used to label errors.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Run the command and capture its output whatever the exit status.
    ///
    /// # Errors
    ///
    /// Returns [`cf_core::Error::Tool`] if spawning fails, waiting fails, or
    /// the optional timeout expires.
    pub async fn output(&self) -> cf_core::Result<ToolOutput> {
        let name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!("running {name} {}", self.args.join(" "));

        let child = cmd
            .spawn()
            .map_err(|e| cf_core::Error::tool(&name, format!("failed to spawn: {e}")))?;

        let waited = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| cf_core::Error::tool(&name, format!("timed out after {limit:?}")))?,
            None => child.wait_with_output().await,
        };
        let output =
            waited.map_err(|e| cf_core::Error::tool(&name, format!("wait failed: {e}")))?;

        Ok(ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Run the command and require a successful exit.
    ///
    /// # Errors
    ///
    /// In addition to the errors of [`ToolCommand::output`], returns
    /// [`cf_core::Error::Tool`] with the captured stderr when the process
    /// exits with a non-zero status.
    pub async fn execute(&self) -> cf_core::Result<ToolOutput> {
        let output = self.output().await?;
        if !output.status.success() {
            return Err(cf_core::Error::tool(
                self.program_name(),
                format!("exited with status {}: {}", output.status, output.diagnostic()),
            ));
        }
        Ok(output)
    }
}
