//! Subprocess supervision for lifecycle steps (spec §4.B).
//!
//! `ShellRunner` spawns the host shell for synchronous steps (`install`,
//! `startup`, `shutdown`, `recover`) and for the long-running, backgrounded
//! `run` step whose exit code drives the `Running -> Finished`/`Errored`
//! transition.

use crate::errors::{OrchestratorError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

/// Outcome of a synchronous lifecycle step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Ok,
    Failed,
}

/// A handle to a backgrounded `run` step's child process, used to deliver
/// the shutdown grace-period/kill escalation (spec §5, "Cancellation").
pub struct BackgroundChild {
    child: Arc<AsyncMutex<Child>>,
    pid: Option<u32>,
}

impl BackgroundChild {
    /// Send a terminate signal (SIGTERM on POSIX; best-effort kill on
    /// platforms without signals), grounded on the teacher's preference for
    /// a single `cfg(unix)` escape hatch around process control.
    pub fn terminate(&self) {
        #[cfg(unix)]
        {
            if let Some(pid) = self.pid {
                unsafe {
                    libc::kill(pid as libc::pid_t, libc::SIGTERM);
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = self.pid;
        }
    }

    /// Force-kill the child (escalation after the grace period elapses).
    pub async fn kill(&self) {
        let mut guard = self.child.lock().await;
        let _ = guard.kill().await;
    }

    /// Wait for the child to exit and return its code. Safe to call after
    /// the background wait task spawned in `spawn_background` has already
    /// reaped it — `tokio::process::Child::wait` returns the cached exit
    /// status on subsequent calls rather than erroring.
    pub async fn wait_exit_code(&self) -> Option<i32> {
        let mut guard = self.child.lock().await;
        guard.wait().await.ok().map(|status| status.code().unwrap_or(-1))
    }
}

/// Contract for launching and supervising subprocesses on behalf of
/// lifecycle steps (spec §4.B).
#[async_trait::async_trait]
pub trait ShellRunner: Send + Sync {
    /// Run `command` to completion via the host shell, streaming
    /// stdout/stderr to the log tagged with `owner`/`step_name`. Returns
    /// `Ok` iff the exit code is 0. `env` carries the recipe's `setenv`
    /// entries, added on top of the inherited parent environment
    /// (spec §6, "Shell contract").
    async fn run(
        &self,
        step_name: &str,
        command: &str,
        owner: &str,
        env: &HashMap<String, String>,
    ) -> Result<RunOutcome>;

    /// Spawn `command` in the background; the caller is notified of the
    /// exit code on `completion` as soon as the process exits (spec §9,
    /// "background callback").
    fn spawn_background(
        &self,
        step_name: &str,
        command: &str,
        owner: &str,
        env: &HashMap<String, String>,
        completion: mpsc::Sender<i32>,
    ) -> Result<BackgroundChild>;

    /// Search `PATH` for `cmd`, returning its absolute path if found.
    fn which(&self, cmd: &str) -> Option<PathBuf>;

    /// Spawn `expr` and return `true` iff it exits 0 AND writes nothing to
    /// standard error.
    async fn successful(&self, expr: &str) -> bool;
}

/// `ShellRunner` backed by `/bin/sh -c` on POSIX and `cmd /c` on Windows,
/// grounded on the teacher's `CliDocker` exec abstraction.
#[derive(Debug, Default, Clone)]
pub struct CliShellRunner;

impl CliShellRunner {
    pub fn new() -> Self {
        Self
    }

    fn build_command(command: &str, env: &HashMap<String, String>) -> Command {
        let mut cmd;
        if cfg!(target_os = "windows") {
            cmd = Command::new("cmd");
            cmd.arg("/c").arg(command);
        } else {
            cmd = Command::new("/bin/sh");
            cmd.arg("-c").arg(command);
        }
        cmd.envs(env);
        cmd
    }
}

#[async_trait::async_trait]
impl ShellRunner for CliShellRunner {
    async fn run(
        &self,
        step_name: &str,
        command: &str,
        owner: &str,
        env: &HashMap<String, String>,
    ) -> Result<RunOutcome> {
        let _span = crate::observability::shell_run_span(owner, step_name).entered();
        let mut cmd = Self::build_command(command, env);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = cmd.spawn().map_err(|source| OrchestratorError::Script {
            component: owner.to_string(),
            step: step_name.to_string(),
            message: format!("failed to spawn: {source}"),
        })?;

        stream_output(&mut child, owner, step_name);

        let status = child.wait().await.map_err(|source| OrchestratorError::Script {
            component: owner.to_string(),
            step: step_name.to_string(),
            message: format!("failed waiting for child: {source}"),
        })?;

        if status.success() {
            Ok(RunOutcome::Ok)
        } else {
            Ok(RunOutcome::Failed)
        }
    }

    fn spawn_background(
        &self,
        step_name: &str,
        command: &str,
        owner: &str,
        env: &HashMap<String, String>,
        completion: mpsc::Sender<i32>,
    ) -> Result<BackgroundChild> {
        let mut cmd = Self::build_command(command, env);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = cmd.spawn().map_err(|source| OrchestratorError::Script {
            component: owner.to_string(),
            step: step_name.to_string(),
            message: format!("failed to spawn: {source}"),
        })?;

        stream_output(&mut child, owner, step_name);
        let pid = child.id();

        let child = Arc::new(AsyncMutex::new(child));
        let wait_child = Arc::clone(&child);
        let owner_owned = owner.to_string();
        let step_name_owned = step_name.to_string();
        tokio::spawn(async move {
            let status = {
                let mut guard = wait_child.lock().await;
                guard.wait().await
            };
            match status {
                Ok(status) => {
                    let code = status.code().unwrap_or(-1);
                    debug!(component = %owner_owned, step = %step_name_owned, exit_code = code, "background child exited");
                    let _ = completion.send(code).await;
                }
                Err(source) => {
                    warn!(component = %owner_owned, step = %step_name_owned, error = %source, "failed waiting for background child");
                    let _ = completion.send(-1).await;
                }
            }
        });

        Ok(BackgroundChild { child, pid })
    }

    fn which(&self, cmd: &str) -> Option<PathBuf> {
        let path_var = std::env::var_os("PATH")?;
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(cmd);
            if candidate.is_file() {
                return Some(candidate);
            }
            #[cfg(target_os = "windows")]
            {
                let with_exe = dir.join(format!("{cmd}.exe"));
                if with_exe.is_file() {
                    return Some(with_exe);
                }
            }
        }
        None
    }

    async fn successful(&self, expr: &str) -> bool {
        let mut cmd = Self::build_command(expr, &HashMap::new());
        cmd.stdout(Stdio::null()).stderr(Stdio::piped());
        let output = match cmd.output().await {
            Ok(output) => output,
            Err(_) => return false,
        };
        output.status.success() && output.stderr.is_empty()
    }
}

fn stream_output(child: &mut Child, owner: &str, step_name: &str) {
    if let Some(stdout) = child.stdout.take() {
        let owner = owner.to_string();
        let step = step_name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(component = %owner, step = %step, "{}", line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let owner = owner.to_string();
        let step = step_name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(component = %owner, step = %step, "{}", line);
            }
        });
    }
}
