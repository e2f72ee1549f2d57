//! The command gateway: policy check, then a bounded shell run.

use sandgate_bash_runner::{
    CommandExecutor, CommandInvocation, CommandOutput, CommandPolicy, DenylistPolicy, ExecError,
    PolicyChain, PolicyViolation, ProcessCommandExecutor, SandboxGuardPolicy, ShellKind,
};
use sandgate_commons::ExecOutcome;
use sandgate_config::ExecConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("command rejected by policy")]
    Blocked(#[from] PolicyViolation),
    #[error("command could not be started")]
    Failed(#[from] ExecError),
}

/// Runs commands from the sandbox root after the policy chain approves them.
#[derive(Clone)]
pub struct CommandGateway {
    root: PathBuf,
    timeout: Duration,
    shell: ShellKind,
    policy: PolicyChain,
    executor: Arc<dyn CommandExecutor>,
}

impl CommandGateway {
    pub fn new(root: impl Into<PathBuf>, config: &ExecConfig) -> Result<Self, regex::Error> {
        let root = root.into();
        let denylist =
            DenylistPolicy::builtin().with_extra_patterns(&config.extra_denied_patterns)?;
        let policy = PolicyChain::new()
            .with(SandboxGuardPolicy::new(root.clone()))
            .with(denylist);
        let executor = ProcessCommandExecutor::new().with_max_output_bytes(config.max_output_bytes);
        Ok(Self {
            root,
            timeout: config.timeout(),
            shell: ShellKind::host(),
            policy,
            executor: Arc::new(executor),
        })
    }

    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Non-zero exits, missing binaries and timeouts come back as an
    /// [`ExecOutcome`]; only a policy match or a failure to spawn is an error.
    pub async fn execute(&self, command: &str) -> Result<ExecOutcome, GatewayError> {
        let invocation = CommandInvocation::new(self.shell, command, self.root.clone())
            .with_timeout(self.timeout);
        self.policy.check(&invocation)?;
        let output = self.executor.execute(&invocation).await?;
        Ok(outcome_from(command, output, self.timeout))
    }
}

fn outcome_from(command: &str, output: CommandOutput, timeout: Duration) -> ExecOutcome {
    let CommandOutput {
        status,
        stdout,
        mut stderr,
    } = output;

    let error = if status.is_timed_out() {
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&format!("Command timed out after {}", format_duration(timeout)));
        stderr
    } else if !status.success() && stderr.is_empty() {
        format!("Command failed: {command}")
    } else {
        stderr
    };

    ExecOutcome {
        output: stdout,
        error,
        exit_code: status.exit_code(),
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
