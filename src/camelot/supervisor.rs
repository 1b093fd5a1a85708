//! Camelot child process supervisor.
//!
//! Launches the Camelot communicator from a [`LaunchPlan`], hands its stdin
//! and stdout to the Camelot pumps, forwards its stderr into the log, and
//! winds it down on shutdown:
//!
//! 1. stdin is closed so a well-behaved child sees EOF and exits by itself;
//! 2. after the exit grace period a Unix child gets `SIGTERM`;
//! 3. anything still alive after that is killed.

use std::process::ExitStatus;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::camelot::launch::LaunchPlan;
use crate::{AppError, Result};

/// Time a child gets to react to `SIGTERM` before it is killed.
const TERM_GRACE: Duration = Duration::from_secs(1);

/// Launches Camelot children from a fixed plan.
#[derive(Debug, Clone)]
pub struct ChildProcessSupervisor {
    plan: LaunchPlan,
    exit_grace: Duration,
}

impl ChildProcessSupervisor {
    /// Supervisor launching `plan`, allowing `exit_grace` for voluntary exit.
    #[must_use]
    pub fn new(plan: LaunchPlan, exit_grace: Duration) -> Self {
        Self { plan, exit_grace }
    }

    /// Spawn a new child; `generation` counts launches for log correlation.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Spawn`] when the OS refuses to start the process
    /// or one of its stdio pipes cannot be captured.
    pub fn launch(&self, generation: u32) -> Result<CamelotChild> {
        let mut child = self.plan.command().spawn().map_err(|err| {
            AppError::Spawn(format!(
                "failed to launch `{}`: {err}",
                self.plan.display_line()
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::Spawn("failed to capture camelot stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Spawn("failed to capture camelot stdout".into()))?;
        let stderr_task = child.stderr.take().map(|stderr| forward_stderr(stderr, generation));

        let pid = child.id();
        info!(
            generation,
            pid = pid.unwrap_or(0),
            command = %self.plan.display_line(),
            "camelot process launched"
        );

        Ok(CamelotChild {
            generation,
            pid,
            child,
            stdin,
            stdout,
            stderr_task,
            exit_grace: self.exit_grace,
        })
    }
}

/// A running Camelot process with exclusive ownership of its stdio.
#[derive(Debug)]
pub struct CamelotChild {
    generation: u32,
    pid: Option<u32>,
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    stderr_task: Option<JoinHandle<()>>,
    exit_grace: Duration,
}

impl CamelotChild {
    /// Launch counter this child was started with.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// OS process id, if the process is still known to the OS.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Borrow stdout (for the receiver) and stdin (for the sender) together.
    pub fn streams(&mut self) -> (&mut ChildStdout, &mut ChildStdin) {
        (&mut self.stdout, &mut self.stdin)
    }

    /// Close stdin, wait for a voluntary exit, then terminate and reap.
    ///
    /// Returns the exit status when one could be collected.
    pub async fn shutdown(self) -> Option<ExitStatus> {
        let Self {
            generation,
            pid,
            mut child,
            stdin,
            stdout,
            stderr_task,
            exit_grace,
        } = self;

        drop(stdin);
        drop(stdout);

        let status = match tokio::time::timeout(exit_grace, child.wait()).await {
            Ok(result) => result.ok(),
            Err(_elapsed) => {
                debug!(generation, "camelot process ignored stdin close, terminating");
                terminate(&mut child, pid, generation).await
            }
        };

        if let Some(task) = stderr_task {
            task.abort();
        }

        match status {
            Some(status) => info!(generation, %status, "camelot process exited"),
            None => warn!(generation, "camelot process exit status unavailable"),
        }

        status
    }
}

/// Stop a child that outlived its grace period.
async fn terminate(child: &mut Child, pid: Option<u32>, generation: u32) -> Option<ExitStatus> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) {
            match kill(Pid::from_raw(pid), Signal::SIGTERM) {
                Ok(()) => {
                    if let Ok(result) = tokio::time::timeout(TERM_GRACE, child.wait()).await {
                        return result.ok();
                    }
                }
                Err(err) => debug!(generation, %err, "SIGTERM delivery failed"),
            }
        }
    }

    #[cfg(not(unix))]
    let _ = (pid, TERM_GRACE);

    if let Err(err) = child.kill().await {
        warn!(generation, %err, "failed to kill camelot process");
        return None;
    }
    child.wait().await.ok()
}

/// Re-emit every line the child writes to stderr as a `WARN` event.
fn forward_stderr(stderr: ChildStderr, generation: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if !line.trim().is_empty() {
                        warn!(generation, stderr = %line, "camelot stderr");
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    debug!(generation, %err, "camelot stderr read failed");
                    break;
                }
            }
        }
    })
}
