use crate::process_group;
use crate::stream::CapturedStream;
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Exit code reported for commands killed by the timeout, following the
/// convention of coreutils `timeout`.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code reported when the process ended without one (killed by a signal).
pub const SIGNALED_EXIT_CODE: i32 = 1;

/// Default per-stream capture limit.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// How long to wait for a killed process and its pipes to wind down.
const KILL_GRACE: Duration = Duration::from_millis(500);

/// Shell family used to execute commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellKind {
    Unix,
    Windows,
}

impl ShellKind {
    /// The shell of the platform this binary was built for.
    pub const fn host() -> Self {
        if cfg!(windows) { Self::Windows } else { Self::Unix }
    }
}

/// Describes a command that will be executed by a [`CommandExecutor`].
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    pub shell: ShellKind,
    pub command: String,
    pub working_dir: PathBuf,
    pub timeout: Duration,
}

impl CommandInvocation {
    pub fn new(shell: ShellKind, command: impl Into<String>, working_dir: PathBuf) -> Self {
        Self {
            shell,
            command: command.into(),
            working_dir,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Describes the exit status of a command execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    success: bool,
    code: Option<i32>,
    timed_out: bool,
}

impl CommandStatus {
    pub fn new(success: bool, code: Option<i32>) -> Self {
        Self {
            success,
            code,
            timed_out: false,
        }
    }

    pub fn timed_out() -> Self {
        Self {
            success: false,
            code: None,
            timed_out: true,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    /// Single integer view of the status for callers that need one.
    pub fn exit_code(&self) -> i32 {
        if self.timed_out {
            TIMEOUT_EXIT_CODE
        } else if self.success {
            0
        } else {
            self.code.unwrap_or(SIGNALED_EXIT_CODE)
        }
    }
}

impl From<std::process::ExitStatus> for CommandStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self::new(status.success(), status.code())
    }
}

/// Output produced by the executor for a command invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: CommandStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::new(true, Some(0)),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Failures of the execution machinery itself, as opposed to the command.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn shell for command")]
    Spawn {
        #[source]
        source: io::Error,
    },
    #[error("failed to wait for command")]
    Wait {
        #[source]
        source: io::Error,
    },
}

/// Trait implemented by concrete command execution strategies.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, invocation: &CommandInvocation) -> Result<CommandOutput, ExecError>;
}

/// Executes commands by delegating to the system shell via [`tokio::process::Command`].
///
/// The child runs in its own process group so a timeout can take down
/// anything it forked, not just the shell.
#[derive(Debug, Clone)]
pub struct ProcessCommandExecutor {
    max_output_bytes: usize,
}

impl ProcessCommandExecutor {
    pub fn new() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn with_max_output_bytes(mut self, limit: usize) -> Self {
        self.max_output_bytes = limit;
        self
    }
}

impl Default for ProcessCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn shell_command(invocation: &CommandInvocation) -> Command {
    match invocation.shell {
        ShellKind::Unix => {
            let mut command = Command::new("sh");
            command.arg("-c").arg(&invocation.command);
            command
        }
        ShellKind::Windows => {
            let mut command = Command::new("cmd");
            command.arg("/C").arg(&invocation.command);
            command
        }
    }
}

#[async_trait]
impl CommandExecutor for ProcessCommandExecutor {
    async fn execute(&self, invocation: &CommandInvocation) -> Result<CommandOutput, ExecError> {
        let mut cmd = shell_command(invocation);
        cmd.current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn { source })?;
        // With `process_group(0)` the group id is the shell's pid. Keep it:
        // `child.id()` is gone once the shell has been reaped.
        let process_group_id = child.id();
        let mut stdout = CapturedStream::spawn(child.stdout.take(), self.max_output_bytes);
        let mut stderr = CapturedStream::spawn(child.stderr.take(), self.max_output_bytes);

        // The deadline covers the pipes too: a background grandchild holding
        // stdout open must not keep the request alive past the timeout.
        let finished = tokio::time::timeout(invocation.timeout, async {
            let status = child.wait().await;
            stdout.finished().await;
            stderr.finished().await;
            status
        })
        .await;

        let status = match finished {
            Ok(status) => CommandStatus::from(status.map_err(|source| ExecError::Wait { source })?),
            Err(_) => {
                warn!(
                    timeout_secs = invocation.timeout.as_secs(),
                    "command exceeded timeout; killing process group"
                );
                if let Some(pgid) = process_group_id
                    && let Err(error) = process_group::kill_process_group(pgid)
                {
                    debug!(%error, pgid, "failed to kill process group");
                }
                if let Err(error) = child.start_kill() {
                    debug!(%error, "failed to kill child");
                }
                let _ = tokio::time::timeout(KILL_GRACE, child.wait()).await;
                let _ = tokio::time::timeout(KILL_GRACE, async {
                    stdout.finished().await;
                    stderr.finished().await;
                })
                .await;
                CommandStatus::timed_out()
            }
        };

        Ok(CommandOutput {
            status,
            stdout: stdout.into_string(),
            stderr: stderr.into_string(),
        })
    }
}
