use crate::constants::defaults;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ExecConfig {
    /// Wall-clock limit for a single command.
    #[serde(default = "ExecConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    /// Capture limit applied to stdout and stderr separately.
    #[serde(default = "ExecConfig::default_max_output_bytes")]
    pub max_output_bytes: usize,
    /// Regexes appended to the built-in denylist, matched case-insensitively.
    #[serde(default)]
    pub extra_denied_patterns: Vec<String>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout_secs(),
            max_output_bytes: Self::default_max_output_bytes(),
            extra_denied_patterns: Vec::new(),
        }
    }
}

impl ExecConfig {
    const fn default_timeout_secs() -> u64 {
        defaults::DEFAULT_EXEC_TIMEOUT_SECS
    }

    const fn default_max_output_bytes() -> usize {
        defaults::DEFAULT_EXEC_MAX_OUTPUT_BYTES
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.timeout_secs > 0, "exec.timeout_secs must be at least 1");
        ensure!(
            self.max_output_bytes > 0,
            "exec.max_output_bytes must be greater than zero"
        );
        for pattern in &self.extra_denied_patterns {
            regex::RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("exec.extra_denied_patterns: invalid regex `{pattern}`"))?;
        }
        Ok(())
    }
}
