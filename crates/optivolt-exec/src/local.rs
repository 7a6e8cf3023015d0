//! Local command execution using `tokio::process`

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, error, instrument, warn};

use crate::error::{ExecError, INTERNAL_EXIT_CODE};
use crate::result::ExecutionResult;
use crate::traits::Executor;

/// Local command executor
///
/// Runs each command in a fresh `sh -c` subprocess leading its own process
/// group. stdout and stderr are drained while waiting for exit so a chatty
/// command cannot block on a full pipe. On timeout the whole group is killed
/// and the shell reaped before returning.
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor {
    working_directory: Option<PathBuf>,
}

impl LocalExecutor {
    /// Create an executor running in the current directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an executor running in `dir` (empty means the current directory)
    #[must_use]
    pub fn in_directory(dir: &str) -> Self {
        let working_directory = (!dir.trim().is_empty()).then(|| PathBuf::from(dir));
        Self { working_directory }
    }

    #[instrument(skip(self), level = "debug")]
    async fn execute(
        &self,
        cmd: &str,
        timeout_duration: Duration,
    ) -> Result<ExecutionResult, ExecError> {
        let start = Instant::now();

        debug!(command = %cmd, cwd = ?self.working_directory, "executing local command");

        // Use shell to support pipes, redirections, etc.
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_directory {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        let _ = command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| ExecError::command(cmd, format!("failed to spawn process: {e}")))?;
        let group = child.id();

        let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take())
        else {
            return Err(ExecError::command(cmd, "process pipes unavailable"));
        };

        let run = async {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let (status, read_out, read_err) = tokio::join!(
                child.wait(),
                stdout.read_to_end(&mut out),
                stderr.read_to_end(&mut err),
            );
            read_out?;
            read_err?;
            Ok::<_, std::io::Error>((status?, out, err))
        };

        let outcome = timeout(timeout_duration, run).await;

        match outcome {
            Ok(Ok((status, out, err))) => {
                let duration = start.elapsed();
                let exit_code = status.code().unwrap_or(INTERNAL_EXIT_CODE);
                let stdout = String::from_utf8_lossy(&out);
                let stderr = String::from_utf8_lossy(&err);

                debug!(
                    command = %cmd,
                    status = exit_code,
                    duration = ?duration,
                    "command completed"
                );

                if !status.success() {
                    error!(
                        command = %cmd,
                        status = exit_code,
                        stderr = %stderr,
                        "command failed"
                    );
                }

                Ok(ExecutionResult::from_streams(
                    exit_code, &stdout, &stderr, duration,
                ))
            }
            Ok(Err(e)) => {
                terminate(&mut child, group, cmd).await;
                Err(ExecError::command(cmd, format!("I/O error: {e}")))
            }
            Err(_) => {
                error!(
                    command = %cmd,
                    timeout = ?timeout_duration,
                    elapsed = ?start.elapsed(),
                    "command timed out"
                );
                terminate(&mut child, group, cmd).await;
                Err(ExecError::timeout(cmd, timeout_duration))
            }
        }
    }
}

/// Kill the process group led by `child`, then reap `child`
async fn terminate(child: &mut Child, group: Option<u32>, cmd: &str) {
    kill_group(group, cmd);

    if let Err(kill_err) = child.kill().await {
        warn!(command = %cmd, error = %kill_err, "failed to kill process");
    }
}

#[cfg(unix)]
fn kill_group(group: Option<u32>, cmd: &str) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pgid) = group.and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(errno) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        debug!(command = %cmd, pgid, error = %errno, "process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_group(_group: Option<u32>, _cmd: &str) {}

#[async_trait]
impl Executor for LocalExecutor {
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout_duration: Duration,
    ) -> Result<ExecutionResult, ExecError> {
        self.execute(cmd, timeout_duration).await
    }

    fn executor_type(&self) -> &'static str {
        "local"
    }
}
