#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{ffi::OsString, path::Path, process::Stdio, time::Duration};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
    task::JoinHandle,
    time::timeout,
};

use crate::util::bash_path;

/// Kills the wrapped child when dropped before it was reaped, e.g. when a
/// timeout cancels the wait.
struct KillOnDrop {
    /// The running child, `None` once it has exited.
    child: Option<Child>,
}

impl KillOnDrop {
    /// Waits for the child to exit and releases it.
    async fn wait(&mut self) -> Result<std::process::ExitStatus> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| anyhow!("process was already reaped"))?;
        let status = child.wait().await.context("failed to wait on process")?;
        self.child = None;
        Ok(status)
    }
}

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// Drains `pipe` on its own task so a full stderr pipe cannot block stdout.
fn drain<P>(pipe: Option<P>, name: &'static str) -> Result<JoinHandle<Result<String>>>
where
    P: AsyncRead + Unpin + Send + 'static,
{
    let mut pipe = pipe.with_context(|| format!("{name} was not piped"))?;
    Ok(tokio::spawn(async move {
        let mut bytes = Vec::new();
        pipe.read_to_end(&mut bytes)
            .await
            .with_context(|| format!("failed to read {name}"))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }))
}

/// Spawns `cmd` with stdin closed and captures both output streams. The
/// process is killed if it outlives `deadline`.
async fn capture(mut cmd: Command, deadline: Option<Duration>) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().context("failed to spawn process")?;
    let stdout = drain(child.stdout.take(), "stdout")?;
    let stderr = drain(child.stderr.take(), "stderr")?;
    let mut guard = KillOnDrop { child: Some(child) };

    let finish = async move {
        let status = guard.wait().await?;
        Ok::<_, anyhow::Error>(CommandOutput {
            stdout:    stdout.await.context("stdout reader panicked")??,
            stderr:    stderr.await.context("stderr reader panicked")??,
            exit_code: status.code().unwrap_or(-1),
        })
    };

    match deadline {
        Some(limit) => timeout(limit, finish)
            .await
            .map_err(|_| anyhow!("process timed out after {}s", limit.as_secs_f64()))?,
        None => finish.await,
    }
}

/// Text output of a shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Captured stdout, lossily decoded.
    pub stdout:    String,
    /// Captured stderr, lossily decoded.
    pub stderr:    String,
    /// Exit code, `-1` when the process was killed by a signal.
    pub exit_code: i32,
}

impl CommandOutput {
    /// True when the command exited with code zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs shell commands for the grading pipeline.
///
/// A command that runs and fails is reported through
/// [`CommandOutput::exit_code`]; `Err` is reserved for commands that could
/// not be started or did not finish in time.
#[allow(async_fn_in_trait)]
pub trait ProcessRunner {
    /// Runs `command` through a shell, optionally inside `cwd`.
    async fn run(&self, command: &str, cwd: Option<&Path>) -> Result<CommandOutput>;
}

/// [`ProcessRunner`] backed by `bash -c`.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    /// Path to the bash binary.
    shell:    OsString,
    /// Maximum time a single command may run.
    deadline: Option<Duration>,
}

impl ShellRunner {
    /// Locates bash on `PATH`.
    pub fn new(deadline: Option<Duration>) -> Result<Self> {
        Ok(Self {
            shell: bash_path()?,
            deadline,
        })
    }

    /// Returns a copy of this runner with a different deadline.
    pub fn with_deadline(&self, deadline: Option<Duration>) -> Self {
        Self {
            shell: self.shell.clone(),
            deadline,
        }
    }
}

impl ProcessRunner for ShellRunner {
    async fn run(&self, command: &str, cwd: Option<&Path>) -> Result<CommandOutput> {
        tracing::debug!("running `{command}`");
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(command);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        capture(cmd, self.deadline)
            .await
            .with_context(|| format!("Could not run `{command}`"))
    }
}
