use crate::constants::defaults;
use crate::exec::ExecConfig;
use crate::rate_limit::RateLimitConfig;
use crate::sandbox::SandboxConfig;
use crate::server::ServerConfig;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// Effective gateway configuration after all layers are merged.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub exec: ExecConfig,
    /// Base tracing level; `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            sandbox: SandboxConfig::default(),
            rate_limit: RateLimitConfig::default(),
            exec: ExecConfig::default(),
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    defaults::DEFAULT_LOG_LEVEL.to_owned()
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        self.server
            .validate()
            .context("Invalid server configuration")?;
        self.sandbox
            .validate()
            .context("Invalid sandbox configuration")?;
        self.rate_limit
            .validate()
            .context("Invalid rate_limit configuration")?;
        self.exec.validate().context("Invalid exec configuration")?;
        ensure!(
            LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()),
            "log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            self.log_level
        );
        Ok(())
    }
}
