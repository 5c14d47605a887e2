//! Shell command execution, either through `adb shell` or locally via `sh -c`.

use std::process::Stdio;
use std::time::Duration;

use deepfreeze_core::PlatformFut;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time;
use tracing::debug;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(15);
/// `dumpsys` can produce megabytes; nothing we parse needs more than this.
const MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;
const KILL_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("failed to capture output of {program}")]
    Capture { program: String },
    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        source: std::io::Error,
    },
    #[error("`{command}` timed out after {} ms", timeout.as_millis())]
    TimedOut { command: String, timeout: Duration },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub truncated: bool,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            success: true,
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// Failed output with the given stderr.
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(1),
            success: false,
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    /// stdout and stderr together; `am` reports some errors on stdout.
    #[must_use]
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Runs one device shell command line.
pub trait CommandRunner: Send + Sync {
    fn run<'a>(&'a self, command: &'a str) -> PlatformFut<'a, Result<CommandOutput, RunnerError>>;
}

/// `adb [-s serial] shell <command>` on the host.
#[derive(Debug, Clone)]
pub struct AdbRunner {
    adb_bin: String,
    serial: Option<String>,
    timeout: Duration,
}

impl AdbRunner {
    #[must_use]
    pub fn new(serial: Option<String>) -> Self {
        Self {
            adb_bin: if cfg!(windows) { "adb.exe" } else { "adb" }.to_string(),
            serial,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl CommandRunner for AdbRunner {
    fn run<'a>(&'a self, command: &'a str) -> PlatformFut<'a, Result<CommandOutput, RunnerError>> {
        Box::pin(async move {
            let mut args: Vec<&str> = Vec::with_capacity(4);
            if let Some(serial) = &self.serial {
                args.extend(["-s", serial.as_str()]);
            }
            args.extend(["shell", command]);
            run_process(&self.adb_bin, &args, self.timeout).await
        })
    }
}

/// `sh -c <command>` when running on the device itself.
#[derive(Debug, Clone)]
pub struct LocalRunner {
    timeout: Duration,
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl LocalRunner {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl CommandRunner for LocalRunner {
    fn run<'a>(&'a self, command: &'a str) -> PlatformFut<'a, Result<CommandOutput, RunnerError>> {
        Box::pin(async move { run_process("sh", &["-c", command], self.timeout).await })
    }
}

async fn run_process(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandOutput, RunnerError> {
    debug!(program, ?args, "Running device command");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| RunnerError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let stdout = child.stdout.take().ok_or_else(|| RunnerError::Capture {
        program: program.to_string(),
    })?;
    let stderr = child.stderr.take().ok_or_else(|| RunnerError::Capture {
        program: program.to_string(),
    })?;

    let stdout_task = tokio::spawn(read_to_end_limited(stdout, MAX_OUTPUT_BYTES));
    let stderr_task = tokio::spawn(read_to_end_limited(stderr, MAX_OUTPUT_BYTES));

    let status = if let Ok(res) = time::timeout(timeout, child.wait()).await {
        res.map_err(|source| RunnerError::Wait {
            program: program.to_string(),
            source,
        })?
    } else {
        let _ = child.kill().await;
        let _ = time::timeout(KILL_GRACE, child.wait()).await;
        return Err(RunnerError::TimedOut {
            command: args.join(" "),
            timeout,
        });
    };

    let (stdout_bytes, truncated_stdout) =
        stdout_task.await.unwrap_or_else(|_| (Vec::new(), false));
    let (stderr_bytes, truncated_stderr) =
        stderr_task.await.unwrap_or_else(|_| (Vec::new(), false));

    Ok(CommandOutput {
        exit_code: status.code(),
        success: status.success(),
        stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
        truncated: truncated_stdout || truncated_stderr,
    })
}

async fn read_to_end_limited<R: tokio::io::AsyncRead + Unpin + Send + 'static>(
    mut reader: R,
    max_bytes: usize,
) -> (Vec<u8>, bool) {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 8192];
    let mut truncated = false;

    loop {
        let n = match reader.read(&mut tmp).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        let remaining = max_bytes.saturating_sub(buf.len());
        if remaining == 0 {
            truncated = true;
            continue;
        }
        let take = remaining.min(n);
        buf.extend_from_slice(&tmp[..take]);
        if take < n {
            truncated = true;
        }
    }

    (buf, truncated)
}

/// Quote one argument for the device shell.
#[must_use]
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._-/:=@%+,".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
